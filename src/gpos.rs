//! `GPOS` table validation.

use log::trace;

use crate::binary::read::{ReadCtxt, ReadScope};
use crate::error::ValidateError;
use crate::layout::{self, ValidateFunc, ValidationLevel, Validator};
use crate::size;

/// Subtable validators indexed by lookup type minus one.
pub(crate) static VALIDATE_FUNCS: [ValidateFunc; 9] = [
    validate_single_pos,
    validate_pair_pos,
    validate_cursive_pos,
    validate_mark_base_pos,
    validate_mark_lig_pos,
    validate_mark_mark_pos,
    layout::validate_context,
    layout::validate_chain_context,
    validate_extension_pos,
];

const EXTENSION_TYPE: u16 = 9;

// ValueRecord format bits; the high byte is reserved.
const X_PLACEMENT: u16 = 0x0001;
const Y_PLACEMENT: u16 = 0x0002;
const X_ADVANCE: u16 = 0x0004;
const Y_ADVANCE: u16 = 0x0008;
const X_PLACEMENT_DEVICE: u16 = 0x0010;
const Y_PLACEMENT_DEVICE: u16 = 0x0020;
const X_ADVANCE_DEVICE: u16 = 0x0040;
const Y_ADVANCE_DEVICE: u16 = 0x0080;
const VALUE_FORMAT_RESERVED: u16 = 0xFF00;

/// Validate a `GPOS` table.
pub fn validate(table: &[u8], glyph_count: u32, level: ValidationLevel) -> Result<(), ValidateError> {
    trace!("validating GPOS table");
    let scope = ReadScope::new(table);
    let otvalid = &mut Validator::new(level, glyph_count, &VALIDATE_FUNCS);
    let mut ctxt = scope.ctxt();

    ctxt.check_avail(5 * size::U16)?;
    let major_version = ctxt.read_u16be()?;
    let minor_version = ctxt.read_u16be()?;
    if major_version != 1 || minor_version > 1 {
        return Err(ValidateError::InvalidFormat);
    }
    let script_list_offset = ctxt.read_u16be()?;
    let feature_list_offset = ctxt.read_u16be()?;
    let lookup_list_offset = ctxt.read_u16be()?;
    if minor_version == 1 {
        // FeatureVariations: read but not walked
        ctxt.read_u32be()?;
    }

    let lookups = scope.offset(usize::from(lookup_list_offset));
    let features = scope.offset(usize::from(feature_list_offset));
    layout::validate_lookup_list(lookups, otvalid)?;
    layout::validate_feature_list(features, lookups, otvalid)?;
    layout::validate_script_list(scope.offset(usize::from(script_list_offset)), features, otvalid)?;
    Ok(())
}

fn check_value_format(value_format: u16) -> Result<(), ValidateError> {
    if value_format & VALUE_FORMAT_RESERVED != 0 {
        return Err(ValidateError::InvalidFormat);
    }
    Ok(())
}

fn value_record_size(value_format: u16) -> usize {
    value_format.count_ones() as usize * size::U16
}

/// Walk one ValueRecord at the cursor. `base` is the positioning subtable
/// its device offsets are measured from.
fn validate_value_record(
    ctxt: &mut ReadCtxt<'_>,
    base: ReadScope<'_>,
    value_format: u16,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    for bit in [X_PLACEMENT, Y_PLACEMENT, X_ADVANCE, Y_ADVANCE] {
        if value_format & bit != 0 {
            ctxt.skip(size::I16)?;
        }
    }
    for bit in [
        X_PLACEMENT_DEVICE,
        Y_PLACEMENT_DEVICE,
        X_ADVANCE_DEVICE,
        Y_ADVANCE_DEVICE,
    ] {
        if value_format & bit != 0 {
            let offset = ctxt.read_u16be()?;
            if offset != 0 {
                layout::validate_device(base.offset(usize::from(offset)), otvalid)?;
            }
        }
    }
    Ok(())
}

fn validate_anchor(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    match ctxt.read_u16be()? {
        1 => ctxt.check_avail(2 * size::I16).map_err(Into::into),
        2 => ctxt.check_avail(2 * size::I16 + size::U16).map_err(Into::into),
        3 => {
            ctxt.skip(2 * size::I16)?;
            let x_device = ctxt.read_u16be()?;
            if x_device != 0 {
                layout::validate_device(table.offset(usize::from(x_device)), otvalid)?;
            }
            let y_device = ctxt.read_u16be()?;
            if y_device != 0 {
                layout::validate_device(table.offset(usize::from(y_device)), otvalid)?;
            }
            Ok(())
        }
        _ => Err(ValidateError::InvalidFormat),
    }
}

/// Counted array of `(class, anchor offset)` records. Every class must
/// fall inside the attachment subtable's class range.
fn validate_mark_array(
    table: ReadScope<'_>,
    class_count: u16,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let mark_count = ctxt.read_u16be()?;
    ctxt.check_avail(usize::from(mark_count) * 2 * size::U16)?;
    for _ in 0..mark_count {
        let class = ctxt.read_u16be()?;
        if class >= class_count {
            return Err(ValidateError::InvalidData);
        }
        let anchor_offset = ctxt.read_u16be()?;
        validate_anchor(table.offset(usize::from(anchor_offset)), otvalid)?;
    }
    Ok(())
}

fn validate_single_pos(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    match ctxt.read_u16be()? {
        1 => {
            let coverage_offset = ctxt.read_u16be()?;
            let value_format = ctxt.read_u16be()?;
            check_value_format(value_format)?;
            layout::validate_coverage(table.offset(usize::from(coverage_offset)), otvalid, None)?;
            validate_value_record(&mut ctxt, table, value_format, otvalid)
        }
        2 => {
            let coverage_offset = ctxt.read_u16be()?;
            let value_format = ctxt.read_u16be()?;
            check_value_format(value_format)?;
            let value_count = ctxt.read_u16be()?;
            layout::validate_coverage(
                table.offset(usize::from(coverage_offset)),
                otvalid,
                Some(u32::from(value_count)),
            )?;
            ctxt.check_avail(usize::from(value_count) * value_record_size(value_format))?;
            for _ in 0..value_count {
                validate_value_record(&mut ctxt, table, value_format, otvalid)?;
            }
            Ok(())
        }
        _ => Err(ValidateError::InvalidFormat),
    }
}

fn validate_pair_pos(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    match ctxt.read_u16be()? {
        1 => {
            let coverage_offset = ctxt.read_u16be()?;
            let value_format1 = ctxt.read_u16be()?;
            let value_format2 = ctxt.read_u16be()?;
            check_value_format(value_format1)?;
            check_value_format(value_format2)?;
            let pair_set_count = ctxt.read_u16be()?;
            layout::validate_coverage(
                table.offset(usize::from(coverage_offset)),
                otvalid,
                Some(u32::from(pair_set_count)),
            )?;
            ctxt.check_avail(usize::from(pair_set_count) * size::U16)?;
            for _ in 0..pair_set_count {
                let offset = ctxt.read_u16be()?;
                validate_pair_set(
                    table.offset(usize::from(offset)),
                    value_format1,
                    value_format2,
                    otvalid,
                )?;
            }
            Ok(())
        }
        2 => {
            let coverage_offset = ctxt.read_u16be()?;
            let value_format1 = ctxt.read_u16be()?;
            let value_format2 = ctxt.read_u16be()?;
            check_value_format(value_format1)?;
            check_value_format(value_format2)?;
            let class_def1_offset = ctxt.read_u16be()?;
            let class_def2_offset = ctxt.read_u16be()?;
            let class1_count = ctxt.read_u16be()?;
            let class2_count = ctxt.read_u16be()?;

            layout::validate_coverage(table.offset(usize::from(coverage_offset)), otvalid, None)?;
            layout::validate_class_def(table.offset(usize::from(class_def1_offset)), otvalid)?;
            layout::validate_class_def(table.offset(usize::from(class_def2_offset)), otvalid)?;

            let record_size = value_record_size(value_format1) + value_record_size(value_format2);
            let cell_count = usize::from(class1_count) * usize::from(class2_count);
            ctxt.check_avail(cell_count * record_size)?;
            for _ in 0..cell_count {
                validate_value_record(&mut ctxt, table, value_format1, otvalid)?;
                validate_value_record(&mut ctxt, table, value_format2, otvalid)?;
            }
            Ok(())
        }
        _ => Err(ValidateError::InvalidFormat),
    }
}

fn validate_pair_set(
    table: ReadScope<'_>,
    value_format1: u16,
    value_format2: u16,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let pair_value_count = ctxt.read_u16be()?;
    let record_size =
        size::U16 + value_record_size(value_format1) + value_record_size(value_format2);
    ctxt.check_avail(usize::from(pair_value_count) * record_size)?;
    for _ in 0..pair_value_count {
        let second_glyph = ctxt.read_u16be()?;
        if u32::from(second_glyph) >= otvalid.glyph_count {
            return Err(ValidateError::InvalidData);
        }
        validate_value_record(&mut ctxt, table, value_format1, otvalid)?;
        validate_value_record(&mut ctxt, table, value_format2, otvalid)?;
    }
    Ok(())
}

fn validate_cursive_pos(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    if ctxt.read_u16be()? != 1 {
        return Err(ValidateError::InvalidFormat);
    }
    let coverage_offset = ctxt.read_u16be()?;
    let entry_exit_count = ctxt.read_u16be()?;
    layout::validate_coverage(
        table.offset(usize::from(coverage_offset)),
        otvalid,
        Some(u32::from(entry_exit_count)),
    )?;
    ctxt.check_avail(usize::from(entry_exit_count) * 2 * size::U16)?;
    for _ in 0..entry_exit_count {
        let entry_anchor = ctxt.read_u16be()?;
        if entry_anchor != 0 {
            validate_anchor(table.offset(usize::from(entry_anchor)), otvalid)?;
        }
        let exit_anchor = ctxt.read_u16be()?;
        if exit_anchor != 0 {
            validate_anchor(table.offset(usize::from(exit_anchor)), otvalid)?;
        }
    }
    Ok(())
}

fn validate_mark_base_pos(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    if ctxt.read_u16be()? != 1 {
        return Err(ValidateError::InvalidFormat);
    }
    let mark_coverage = ctxt.read_u16be()?;
    let base_coverage = ctxt.read_u16be()?;
    let class_count = ctxt.read_u16be()?;
    let mark_array_offset = ctxt.read_u16be()?;
    let base_array_offset = ctxt.read_u16be()?;

    layout::validate_coverage(table.offset(usize::from(mark_coverage)), otvalid, None)?;
    layout::validate_coverage(table.offset(usize::from(base_coverage)), otvalid, None)?;
    validate_mark_array(table.offset(usize::from(mark_array_offset)), class_count, otvalid)?;

    // base array: one anchor per class for every base glyph
    let base_array = table.offset(usize::from(base_array_offset));
    let mut bctxt = base_array.ctxt();
    let base_count = bctxt.read_u16be()?;
    let anchor_count = usize::from(base_count) * usize::from(class_count);
    bctxt.check_avail(anchor_count * size::U16)?;
    for _ in 0..anchor_count {
        let anchor_offset = bctxt.read_u16be()?;
        if anchor_offset != 0 {
            validate_anchor(base_array.offset(usize::from(anchor_offset)), otvalid)?;
        }
    }
    Ok(())
}

fn validate_mark_lig_pos(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    if ctxt.read_u16be()? != 1 {
        return Err(ValidateError::InvalidFormat);
    }
    let mark_coverage = ctxt.read_u16be()?;
    let ligature_coverage = ctxt.read_u16be()?;
    let class_count = ctxt.read_u16be()?;
    let mark_array_offset = ctxt.read_u16be()?;
    let ligature_array_offset = ctxt.read_u16be()?;

    layout::validate_coverage(table.offset(usize::from(mark_coverage)), otvalid, None)?;
    layout::validate_coverage(table.offset(usize::from(ligature_coverage)), otvalid, None)?;
    validate_mark_array(table.offset(usize::from(mark_array_offset)), class_count, otvalid)?;

    let ligature_array = table.offset(usize::from(ligature_array_offset));
    let mut lctxt = ligature_array.ctxt();
    let ligature_count = lctxt.read_u16be()?;
    lctxt.check_avail(usize::from(ligature_count) * size::U16)?;
    for _ in 0..ligature_count {
        let offset = lctxt.read_u16be()?;
        validate_ligature_attach(ligature_array.offset(usize::from(offset)), class_count, otvalid)?;
    }
    Ok(())
}

fn validate_ligature_attach(
    table: ReadScope<'_>,
    class_count: u16,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let component_count = ctxt.read_u16be()?;
    let anchor_count = usize::from(component_count) * usize::from(class_count);
    ctxt.check_avail(anchor_count * size::U16)?;
    for _ in 0..anchor_count {
        let anchor_offset = ctxt.read_u16be()?;
        if anchor_offset != 0 {
            validate_anchor(table.offset(usize::from(anchor_offset)), otvalid)?;
        }
    }
    Ok(())
}

fn validate_mark_mark_pos(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    // identical in shape to mark-to-base attachment
    validate_mark_base_pos(table, otvalid)
}

fn validate_extension_pos(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    layout::validate_extension(table, otvalid, EXTENSION_TYPE)
}
