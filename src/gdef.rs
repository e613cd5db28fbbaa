//! `GDEF` table validation.

use log::trace;

use crate::binary::read::ReadScope;
use crate::error::ValidateError;
use crate::layout::{self, ValidationLevel, Validator};
use crate::size;

// Smallest byte size each optional target can occupy, used when policing
// its offset.
const CLASS_DEF_MIN: usize = 2 * size::U16;
const LIST_MIN: usize = 2 * size::U16;
const VAR_STORE_MIN: usize = 2 * size::U16 + size::U32;

/// Validate a `GDEF` table.
///
/// `need_mark_attach_classdef` selects between the two possible version
/// 1.0 header layouts. The caller derives it from the raw lookup flags of
/// the sibling GSUB/GPOS tables (see
/// [`layout::has_mark_attachment_type`]); the field was added without a
/// version bump, so the version alone cannot decide.
pub fn validate(
    table: &[u8],
    need_mark_attach_classdef: bool,
    glyph_count: u32,
    level: ValidationLevel,
) -> Result<(), ValidateError> {
    trace!("validating GDEF table");
    let scope = ReadScope::new(table);
    let otvalid = &mut Validator::new(level, glyph_count, &[]);
    let mut ctxt = scope.ctxt();

    if ctxt.read_u16be()? != 1 {
        return Err(ValidateError::InvalidFormat);
    }
    let minor_version = ctxt.read_u16be()?;

    // version plus the three offsets every layout carries
    let mut header_size = 2 * size::U16 + 3 * size::U16;
    let need_mark_attach_classdef = match minor_version {
        0 => {
            if need_mark_attach_classdef {
                header_size += size::U16;
            }
            need_mark_attach_classdef
        }
        2 => {
            header_size += 2 * size::U16;
            true
        }
        3 => {
            header_size += 2 * size::U16 + size::U32;
            true
        }
        _ => return Err(ValidateError::InvalidFormat),
    };
    ctxt.check_avail(header_size - 2 * size::U16)?;

    let glyph_class_def = ctxt.read_u16be()?;
    let glyph_class_def = layout::check_optional_offset(
        "GlyphClassDef",
        u32::from(glyph_class_def),
        header_size,
        CLASS_DEF_MIN,
        table.len(),
        otvalid,
    )?;
    if glyph_class_def != 0 {
        layout::validate_class_def(scope.offset(glyph_class_def as usize), otvalid)?;
    }

    let attach_list = ctxt.read_u16be()?;
    let attach_list = layout::check_optional_offset(
        "AttachList",
        u32::from(attach_list),
        header_size,
        LIST_MIN,
        table.len(),
        otvalid,
    )?;
    if attach_list != 0 {
        otvalid.nest2(validate_coverage_keyed_list, layout::validate_index_array);
        otvalid.run(scope.offset(attach_list as usize))?;
    }

    let lig_caret_list = ctxt.read_u16be()?;
    let lig_caret_list = layout::check_optional_offset(
        "LigCaretList",
        u32::from(lig_caret_list),
        header_size,
        LIST_MIN,
        table.len(),
        otvalid,
    )?;
    if lig_caret_list != 0 {
        otvalid.nest3(
            validate_coverage_keyed_list,
            layout::validate_offset_array,
            validate_caret_value,
        );
        otvalid.run(scope.offset(lig_caret_list as usize))?;
    }

    if need_mark_attach_classdef {
        let mark_attach_class_def = ctxt.read_u16be()?;
        let mark_attach_class_def = layout::check_optional_offset(
            "MarkAttachClassDef",
            u32::from(mark_attach_class_def),
            header_size,
            CLASS_DEF_MIN,
            table.len(),
            otvalid,
        )?;
        if mark_attach_class_def != 0 {
            layout::validate_class_def(scope.offset(mark_attach_class_def as usize), otvalid)?;
        }
    }

    if minor_version > 0 {
        let mark_glyph_sets_def = ctxt.read_u16be()?;
        let mark_glyph_sets_def = layout::check_optional_offset(
            "MarkGlyphSetsDef",
            u32::from(mark_glyph_sets_def),
            header_size,
            LIST_MIN,
            table.len(),
            otvalid,
        )?;
        if mark_glyph_sets_def != 0 {
            validate_mark_glyph_sets(scope.offset(mark_glyph_sets_def as usize), otvalid)?;
        }
    }

    if minor_version > 2 {
        let item_var_store = ctxt.read_u32be()?;
        // the offset is policed but the variation store itself is outside
        // this validator's remit
        let _ = layout::check_optional_offset(
            "ItemVariationStore",
            item_var_store,
            header_size,
            VAR_STORE_MIN,
            table.len(),
            otvalid,
        )?;
    }

    Ok(())
}

/// Coverage-keyed list of per-glyph sub-tables: the attachment point list
/// and the ligature caret list share this shape.
fn validate_coverage_keyed_list(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let coverage_offset = ctxt.read_u16be()?;
    let glyph_count = ctxt.read_u16be()?;

    let coverage = table.offset(usize::from(coverage_offset));
    layout::validate_coverage(coverage, otvalid, Some(u32::from(glyph_count)))?;
    if u32::from(glyph_count) != layout::coverage_count(coverage)? {
        return Err(ValidateError::InvalidData);
    }

    ctxt.check_avail(usize::from(glyph_count) * size::U16)?;
    let func = otvalid.descend()?;
    otvalid.extra1 = 0;
    for _ in 0..glyph_count {
        let offset = ctxt.read_u16be()?;
        func(table.offset(usize::from(offset)), otvalid)?;
    }
    otvalid.ascend();
    Ok(())
}

fn validate_caret_value(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    ctxt.check_avail(2 * size::U16)?;
    match ctxt.read_u16be()? {
        // design-unit coordinate / contour point index, nothing to check
        1 | 2 => Ok(()),
        3 => {
            ctxt.skip(size::I16)?; // coordinate
            let device_offset = ctxt.read_u16be()?;
            layout::validate_device(table.offset(usize::from(device_offset)), otvalid)
        }
        _ => Err(ValidateError::InvalidFormat),
    }
}

fn validate_mark_glyph_sets(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    ctxt.skip(size::U16)?; // format
    let mark_glyph_set_count = ctxt.read_u16be()?;
    ctxt.check_avail(usize::from(mark_glyph_set_count) * size::U32)?;
    for _ in 0..mark_glyph_set_count {
        let offset = ctxt.read_u32be()?;
        layout::validate_coverage(table.offset(offset as usize), otvalid, None)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(words: &[u16]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    // version 1.0 header (narrow layout) with a GlyphClassDef mapping
    // glyphs 3..=5 to class 2
    fn gdef_with_class_def(class_def_offset: u16) -> Vec<u8> {
        let mut data = words(&[1, 0, class_def_offset, 0, 0]);
        data.extend_from_slice(&words(&[1, 3, 3, 2, 2, 2]));
        data
    }

    #[test]
    fn test_glyph_class_def_present() {
        let data = gdef_with_class_def(10);
        assert!(validate(&data, false, 10, ValidationLevel::Default).is_ok());
        assert!(validate(&data, false, 10, ValidationLevel::Paranoid).is_ok());
    }

    #[test]
    fn test_glyph_class_def_undersized_offset() {
        // offset leaves two bytes, not enough for even the format field:
        // disabled when lenient, rejected when paranoid
        let data = gdef_with_class_def(20);
        assert_eq!(data.len(), 22);
        assert!(validate(&data, false, 10, ValidationLevel::Default).is_ok());
        assert_eq!(
            validate(&data, false, 10, ValidationLevel::Paranoid),
            Err(ValidateError::InvalidOffset)
        );
    }

    #[test]
    fn test_glyph_class_def_offset_into_header() {
        let data = gdef_with_class_def(8);
        assert!(validate(&data, false, 10, ValidationLevel::Default).is_ok());
        assert_eq!(
            validate(&data, false, 10, ValidationLevel::Paranoid),
            Err(ValidateError::InvalidOffset)
        );
    }

    #[test]
    fn test_glyph_class_def_offset_past_end() {
        // hard failure at either level
        let data = gdef_with_class_def(1000);
        assert_eq!(
            validate(&data, false, 10, ValidationLevel::Default),
            Err(ValidateError::TooShort)
        );
        assert_eq!(
            validate(&data, false, 10, ValidationLevel::Paranoid),
            Err(ValidateError::TooShort)
        );
    }

    #[test]
    fn test_bad_versions() {
        let bad_major = words(&[2, 0, 0, 0, 0]);
        assert_eq!(
            validate(&bad_major, false, 10, ValidationLevel::Default),
            Err(ValidateError::InvalidFormat)
        );
        let bad_minor = words(&[1, 1, 0, 0, 0]);
        assert_eq!(
            validate(&bad_minor, false, 10, ValidationLevel::Default),
            Err(ValidateError::InvalidFormat)
        );
    }

    #[test]
    fn test_narrow_header_with_mark_attach_required() {
        // the heuristic widens the 1.0 header; a narrow table is too short
        let data = words(&[1, 0, 0, 0, 0]);
        assert!(validate(&data, false, 10, ValidationLevel::Default).is_ok());
        assert_eq!(
            validate(&data, true, 10, ValidationLevel::Default),
            Err(ValidateError::TooShort)
        );
    }

    #[test]
    fn test_wide_header_mark_attach_class_def() {
        let mut data = words(&[1, 0, 0, 0, 0, 12]);
        data.extend_from_slice(&words(&[1, 3, 3, 2, 2, 2]));
        assert!(validate(&data, true, 10, ValidationLevel::Default).is_ok());

        // same bytes parsed narrow: the class def is unreachable but the
        // table is still well formed
        assert!(validate(&data, false, 10, ValidationLevel::Default).is_ok());
    }

    #[test]
    fn test_attach_list() {
        // AttachList at 10: coverage at +8 covering glyphs 4 and 7, then
        // two AttachPoint offsets (+16, +20)
        let mut data = words(&[1, 0, 0, 10, 0]);
        data.extend_from_slice(&words(&[8, 2, 16, 20]));
        data.extend_from_slice(&words(&[1, 2, 4, 7]));
        data.extend_from_slice(&words(&[1, 9]));
        data.extend_from_slice(&words(&[2, 0, 3]));
        assert!(validate(&data, false, 10, ValidationLevel::Default).is_ok());
    }

    #[test]
    fn test_attach_list_count_mismatch() {
        // coverage covers two glyphs but the list declares three
        let mut data = words(&[1, 0, 0, 10, 0]);
        data.extend_from_slice(&words(&[10, 3, 18, 22, 22]));
        data.extend_from_slice(&words(&[1, 2, 4, 7]));
        data.extend_from_slice(&words(&[1, 9]));
        data.extend_from_slice(&words(&[0]));
        assert_eq!(
            validate(&data, false, 10, ValidationLevel::Default),
            Err(ValidateError::InvalidData)
        );
    }

    #[test]
    fn test_lig_caret_list() {
        // LigCaretList at 10: coverage at +6 covering glyph 6, one
        // LigGlyph at +12 holding two caret values
        let mut data = words(&[1, 0, 0, 0, 10]);
        data.extend_from_slice(&words(&[6, 1, 12])); // list header
        data.extend_from_slice(&words(&[1, 1, 6])); // coverage
        data.extend_from_slice(&words(&[2, 6, 10])); // lig glyph
        data.extend_from_slice(&words(&[1, 120])); // caret format 1
        data.extend_from_slice(&words(&[2, 3])); // caret format 2
        assert!(validate(&data, false, 10, ValidationLevel::Default).is_ok());
    }

    #[test]
    fn test_lig_caret_device() {
        let mut data = words(&[1, 0, 0, 0, 10]);
        data.extend_from_slice(&words(&[6, 1, 12])); // list header
        data.extend_from_slice(&words(&[1, 1, 6])); // coverage
        data.extend_from_slice(&words(&[1, 4])); // lig glyph, one caret
        data.extend_from_slice(&words(&[3, 50, 6])); // caret format 3
        data.extend_from_slice(&words(&[12, 13, 1])); // device
        assert!(validate(&data, false, 10, ValidationLevel::Default).is_ok());

        // unknown caret format
        let mut data = words(&[1, 0, 0, 0, 10]);
        data.extend_from_slice(&words(&[6, 1, 12]));
        data.extend_from_slice(&words(&[1, 1, 6]));
        data.extend_from_slice(&words(&[1, 4]));
        data.extend_from_slice(&words(&[4, 50]));
        assert_eq!(
            validate(&data, false, 10, ValidationLevel::Default),
            Err(ValidateError::InvalidFormat)
        );
    }

    #[test]
    fn test_mark_glyph_sets() {
        // version 1.2 header; MarkGlyphSetsDef at 14 with one 32-bit
        // coverage offset
        let mut data = words(&[1, 2, 0, 0, 0, 0, 14]);
        data.extend_from_slice(&words(&[1, 1])); // format, count
        data.extend_from_slice(&0x00000008u32.to_be_bytes()); // offset 8
        data.extend_from_slice(&words(&[1, 1, 5])); // coverage
        assert!(validate(&data, false, 10, ValidationLevel::Default).is_ok());
    }

    #[test]
    fn test_item_variation_store_offset_policed() {
        // version 1.3 header only; a nonzero store offset pointing into
        // the header is repaired or rejected by level
        let data = words(&[1, 3, 0, 0, 0, 0, 0, 0, 4]);
        assert!(validate(&data, false, 10, ValidationLevel::Default).is_ok());
        assert_eq!(
            validate(&data, false, 10, ValidationLevel::Paranoid),
            Err(ValidateError::InvalidOffset)
        );
    }
}
