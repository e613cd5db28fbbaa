//! `MATH` table validation.

use log::trace;

use crate::binary::read::{ReadCtxt, ReadScope};
use crate::error::ValidateError;
use crate::layout::{self, ValidationLevel, Validator};
use crate::size;

// The constants table holds two percentages, two minimum heights, this
// many value records, and a trailing percentage.
const CONSTANTS_VALUE_RECORD_COUNT: usize = 51;

/// Validate a `MATH` table.
pub fn validate(table: &[u8], glyph_count: u32, level: ValidationLevel) -> Result<(), ValidateError> {
    trace!("validating MATH table");
    let scope = ReadScope::new(table);
    let otvalid = &mut Validator::new(level, glyph_count, &[]);
    let mut ctxt = scope.ctxt();

    if ctxt.read_u16be()? != 1 {
        return Err(ValidateError::InvalidFormat);
    }
    if ctxt.read_u16be()? != 0 {
        return Err(ValidateError::InvalidFormat);
    }
    let constants_offset = ctxt.read_u16be()?;
    let glyph_info_offset = ctxt.read_u16be()?;
    let variants_offset = ctxt.read_u16be()?;

    if constants_offset != 0 {
        validate_constants(scope.offset(usize::from(constants_offset)), otvalid)?;
    }
    if glyph_info_offset != 0 {
        validate_glyph_info(scope.offset(usize::from(glyph_info_offset)), otvalid)?;
    }
    if variants_offset != 0 {
        validate_variants(scope.offset(usize::from(variants_offset)), otvalid)?;
    }
    Ok(())
}

/// A design-unit value with an optional device table, measured from
/// `parent`.
fn validate_math_value_record(
    ctxt: &mut ReadCtxt<'_>,
    parent: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    ctxt.skip(size::I16)?; // value
    let device_offset = ctxt.read_u16be()?;
    if device_offset != 0 {
        layout::validate_device(parent.offset(usize::from(device_offset)), otvalid)?;
    }
    Ok(())
}

fn validate_constants(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    ctxt.check_avail(
        4 * size::U16 + CONSTANTS_VALUE_RECORD_COUNT * 2 * size::U16 + size::I16,
    )?;
    // script percentage scale downs and minimum heights
    ctxt.skip(4 * size::U16)?;
    for _ in 0..CONSTANTS_VALUE_RECORD_COUNT {
        validate_math_value_record(&mut ctxt, table, otvalid)?;
    }
    // radical degree bottom raise percentage
    ctxt.skip(size::I16)?;
    Ok(())
}

fn validate_glyph_info(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let italics_correction_offset = ctxt.read_u16be()?;
    let top_accent_attachment_offset = ctxt.read_u16be()?;
    let extended_shape_coverage_offset = ctxt.read_u16be()?;
    let kern_info_offset = ctxt.read_u16be()?;

    if italics_correction_offset != 0 {
        validate_glyph_value_list(table.offset(usize::from(italics_correction_offset)), otvalid)?;
    }
    if top_accent_attachment_offset != 0 {
        validate_glyph_value_list(
            table.offset(usize::from(top_accent_attachment_offset)),
            otvalid,
        )?;
    }
    if extended_shape_coverage_offset != 0 {
        layout::validate_coverage(
            table.offset(usize::from(extended_shape_coverage_offset)),
            otvalid,
            None,
        )?;
    }
    if kern_info_offset != 0 {
        validate_kern_info(table.offset(usize::from(kern_info_offset)), otvalid)?;
    }
    Ok(())
}

/// Coverage plus one value record per covered glyph: the italics
/// correction and top accent attachment tables share this shape.
fn validate_glyph_value_list(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let coverage_offset = ctxt.read_u16be()?;
    let value_count = ctxt.read_u16be()?;
    layout::validate_coverage(
        table.offset(usize::from(coverage_offset)),
        otvalid,
        Some(u32::from(value_count)),
    )?;
    ctxt.check_avail(usize::from(value_count) * 2 * size::U16)?;
    for _ in 0..value_count {
        validate_math_value_record(&mut ctxt, table, otvalid)?;
    }
    Ok(())
}

fn validate_kern_info(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let coverage_offset = ctxt.read_u16be()?;
    let kern_count = ctxt.read_u16be()?;
    layout::validate_coverage(
        table.offset(usize::from(coverage_offset)),
        otvalid,
        Some(u32::from(kern_count)),
    )?;
    // four corner offsets per covered glyph, each possibly null
    ctxt.check_avail(usize::from(kern_count) * 4 * size::U16)?;
    for _ in 0..usize::from(kern_count) * 4 {
        let offset = ctxt.read_u16be()?;
        if offset != 0 {
            validate_math_kern(table.offset(usize::from(offset)), otvalid)?;
        }
    }
    Ok(())
}

fn validate_math_kern(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let height_count = ctxt.read_u16be()?;
    // height_count correction heights followed by height_count + 1 kern
    // values
    let record_count = 2 * usize::from(height_count) + 1;
    ctxt.check_avail(record_count * 2 * size::U16)?;
    for _ in 0..record_count {
        validate_math_value_record(&mut ctxt, table, otvalid)?;
    }
    Ok(())
}

fn validate_variants(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    ctxt.skip(size::U16)?; // minimum connector overlap
    let vert_coverage_offset = ctxt.read_u16be()?;
    let horiz_coverage_offset = ctxt.read_u16be()?;
    let vert_glyph_count = ctxt.read_u16be()?;
    let horiz_glyph_count = ctxt.read_u16be()?;

    if vert_coverage_offset != 0 {
        layout::validate_coverage(
            table.offset(usize::from(vert_coverage_offset)),
            otvalid,
            Some(u32::from(vert_glyph_count)),
        )?;
    } else if vert_glyph_count != 0 {
        return Err(ValidateError::InvalidData);
    }
    if horiz_coverage_offset != 0 {
        layout::validate_coverage(
            table.offset(usize::from(horiz_coverage_offset)),
            otvalid,
            Some(u32::from(horiz_glyph_count)),
        )?;
    } else if horiz_glyph_count != 0 {
        return Err(ValidateError::InvalidData);
    }

    let construction_count = usize::from(vert_glyph_count) + usize::from(horiz_glyph_count);
    ctxt.check_avail(construction_count * size::U16)?;
    for _ in 0..construction_count {
        let offset = ctxt.read_u16be()?;
        validate_glyph_construction(table.offset(usize::from(offset)), otvalid)?;
    }
    Ok(())
}

fn validate_glyph_construction(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let glyph_assembly_offset = ctxt.read_u16be()?;
    let variant_count = ctxt.read_u16be()?;
    ctxt.check_avail(usize::from(variant_count) * 2 * size::U16)?;
    for _ in 0..variant_count {
        let variant_glyph = ctxt.read_u16be()?;
        if u32::from(variant_glyph) >= otvalid.glyph_count {
            return Err(ValidateError::InvalidData);
        }
        ctxt.skip(size::U16)?; // advance measurement
    }
    if glyph_assembly_offset != 0 {
        validate_glyph_assembly(table.offset(usize::from(glyph_assembly_offset)), otvalid)?;
    }
    Ok(())
}

fn validate_glyph_assembly(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    validate_math_value_record(&mut ctxt, table, otvalid)?; // italics correction
    let part_count = ctxt.read_u16be()?;
    // glyph, two connector lengths, full advance, flags
    ctxt.check_avail(usize::from(part_count) * 5 * size::U16)?;
    for _ in 0..part_count {
        let part_glyph = ctxt.read_u16be()?;
        if u32::from(part_glyph) >= otvalid.glyph_count {
            return Err(ValidateError::InvalidData);
        }
        ctxt.skip(4 * size::U16)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(words: &[u16]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    fn validator(glyph_count: u32) -> Validator {
        Validator::new(ValidationLevel::Default, glyph_count, &[])
    }

    // constants table of the right size with no device tables
    fn zero_constants() -> Vec<u8> {
        vec![0; 4 * 2 + CONSTANTS_VALUE_RECORD_COUNT * 4 + 2]
    }

    #[test]
    fn test_constants() {
        let data = zero_constants();
        let mut v = validator(10);
        assert!(validate_constants(ReadScope::new(&data), &mut v).is_ok());

        let truncated = &data[..data.len() - 1];
        assert_eq!(
            validate_constants(ReadScope::new(truncated), &mut v),
            Err(ValidateError::TooShort)
        );
    }

    #[test]
    fn test_constants_device() {
        let len = zero_constants().len();
        let mut data = zero_constants();
        // point the first value record's device at a table appended after
        // the constants
        data[10..12].copy_from_slice(&(len as u16).to_be_bytes());
        data.extend_from_slice(&words(&[12, 13, 1]));
        let mut v = validator(10);
        assert!(validate_constants(ReadScope::new(&data), &mut v).is_ok());
    }

    #[test]
    fn test_full_table() {
        let mut data = words(&[1, 0, 10, 0, 0]);
        data.extend_from_slice(&zero_constants());
        assert!(validate(&data, 10, ValidationLevel::Default).is_ok());

        let bad_version = words(&[1, 1, 0, 0, 0]);
        assert_eq!(
            validate(&bad_version, 10, ValidationLevel::Default),
            Err(ValidateError::InvalidFormat)
        );
    }

    #[test]
    fn test_glyph_value_list() {
        // coverage at +12 covering two glyphs, two value records
        let mut data = words(&[12, 2, 0, 0, 0, 0]);
        data.extend_from_slice(&words(&[1, 2, 4, 5]));
        let mut v = validator(10);
        assert!(validate_glyph_value_list(ReadScope::new(&data), &mut v).is_ok());

        // count not matching the coverage
        let mut data = words(&[12, 1, 0, 0, 0, 0]);
        data.extend_from_slice(&words(&[1, 2, 4, 5]));
        assert_eq!(
            validate_glyph_value_list(ReadScope::new(&data), &mut v),
            Err(ValidateError::InvalidData)
        );
    }

    #[test]
    fn test_math_kern_extent() {
        // one height: one correction height plus two kern values
        let data = words(&[1, 10, 0, 20, 0, 30, 0]);
        let mut v = validator(10);
        assert!(validate_math_kern(ReadScope::new(&data), &mut v).is_ok());

        let truncated = words(&[1, 10, 0, 20, 0]);
        assert_eq!(
            validate_math_kern(ReadScope::new(&truncated), &mut v),
            Err(ValidateError::TooShort)
        );
    }

    #[test]
    fn test_variants_variant_glyph_bound() {
        // one vertical construction at +12 with one variant
        let mut data = words(&[50, 12, 0, 1, 0, 18]);
        data.extend_from_slice(&words(&[1, 1, 6])); // coverage at 12
        data.extend_from_slice(&words(&[0, 1, 9, 100])); // construction at 18
        let mut v = validator(10);
        assert!(validate_variants(ReadScope::new(&data), &mut v).is_ok());

        let mut data = words(&[50, 12, 0, 1, 0, 18]);
        data.extend_from_slice(&words(&[1, 1, 6]));
        data.extend_from_slice(&words(&[0, 1, 10, 100]));
        assert_eq!(
            validate_variants(ReadScope::new(&data), &mut v),
            Err(ValidateError::InvalidData)
        );
    }

    #[test]
    fn test_glyph_assembly() {
        // one part
        let data = words(&[0, 0, 1, 3, 10, 10, 40, 1]);
        let mut v = validator(10);
        assert!(validate_glyph_assembly(ReadScope::new(&data), &mut v).is_ok());

        let bad_glyph = words(&[0, 0, 1, 12, 10, 10, 40, 1]);
        assert_eq!(
            validate_glyph_assembly(ReadScope::new(&bad_glyph), &mut v),
            Err(ValidateError::InvalidData)
        );
    }
}
