//! `BASE` table validation.

use log::trace;

use crate::binary::read::ReadScope;
use crate::error::ValidateError;
use crate::layout::{self, ValidationLevel, Validator};
use crate::size;

/// Validate a `BASE` table.
pub fn validate(table: &[u8], glyph_count: u32, level: ValidationLevel) -> Result<(), ValidateError> {
    trace!("validating BASE table");
    let scope = ReadScope::new(table);
    let otvalid = &mut Validator::new(level, glyph_count, &[]);
    let mut ctxt = scope.ctxt();

    let major_version = ctxt.read_u16be()?;
    let minor_version = ctxt.read_u16be()?;
    if major_version != 1 || minor_version > 1 {
        return Err(ValidateError::InvalidFormat);
    }
    let horiz_axis_offset = ctxt.read_u16be()?;
    let vert_axis_offset = ctxt.read_u16be()?;
    if minor_version == 1 {
        // ItemVariationStore: read but not walked
        ctxt.read_u32be()?;
    }

    if horiz_axis_offset != 0 {
        validate_axis(scope.offset(usize::from(horiz_axis_offset)), otvalid)?;
    }
    if vert_axis_offset != 0 {
        validate_axis(scope.offset(usize::from(vert_axis_offset)), otvalid)?;
    }
    Ok(())
}

fn validate_axis(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let base_tag_list_offset = ctxt.read_u16be()?;
    let base_script_list_offset = ctxt.read_u16be()?;

    if base_tag_list_offset != 0 {
        validate_base_tag_list(table.offset(usize::from(base_tag_list_offset)), otvalid)?;
    }
    if base_script_list_offset != 0 {
        validate_base_script_list(table.offset(usize::from(base_script_list_offset)), otvalid)?;
    }
    Ok(())
}

fn validate_base_tag_list(
    table: ReadScope<'_>,
    _otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let base_tag_count = ctxt.read_u16be()?;
    ctxt.check_avail(usize::from(base_tag_count) * size::U32)?;
    Ok(())
}

fn validate_base_script_list(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let base_script_count = ctxt.read_u16be()?;
    ctxt.check_avail(usize::from(base_script_count) * (size::U32 + size::U16))?;
    for _ in 0..base_script_count {
        ctxt.skip(size::U32)?; // script tag
        let offset = ctxt.read_u16be()?;
        validate_base_script(table.offset(usize::from(offset)), otvalid)?;
    }
    Ok(())
}

fn validate_base_script(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let base_values_offset = ctxt.read_u16be()?;
    let default_min_max_offset = ctxt.read_u16be()?;
    let base_lang_sys_count = ctxt.read_u16be()?;

    if base_values_offset != 0 {
        validate_base_values(table.offset(usize::from(base_values_offset)), otvalid)?;
    }
    if default_min_max_offset != 0 {
        validate_min_max(table.offset(usize::from(default_min_max_offset)), otvalid)?;
    }
    ctxt.check_avail(usize::from(base_lang_sys_count) * (size::U32 + size::U16))?;
    for _ in 0..base_lang_sys_count {
        ctxt.skip(size::U32)?; // language system tag
        let offset = ctxt.read_u16be()?;
        validate_min_max(table.offset(usize::from(offset)), otvalid)?;
    }
    Ok(())
}

fn validate_base_values(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let default_baseline_index = ctxt.read_u16be()?;
    let base_coord_count = ctxt.read_u16be()?;
    if default_baseline_index >= base_coord_count {
        return Err(ValidateError::InvalidData);
    }
    ctxt.check_avail(usize::from(base_coord_count) * size::U16)?;
    for _ in 0..base_coord_count {
        let offset = ctxt.read_u16be()?;
        validate_base_coord(table.offset(usize::from(offset)), otvalid)?;
    }
    Ok(())
}

fn validate_min_max(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let min_coord_offset = ctxt.read_u16be()?;
    let max_coord_offset = ctxt.read_u16be()?;
    let feat_min_max_count = ctxt.read_u16be()?;

    if min_coord_offset != 0 {
        validate_base_coord(table.offset(usize::from(min_coord_offset)), otvalid)?;
    }
    if max_coord_offset != 0 {
        validate_base_coord(table.offset(usize::from(max_coord_offset)), otvalid)?;
    }
    // FeatMinMaxRecord: feature tag plus min/max coordinate offsets
    ctxt.check_avail(usize::from(feat_min_max_count) * (size::U32 + 2 * size::U16))?;
    for _ in 0..feat_min_max_count {
        ctxt.skip(size::U32)?;
        let min_offset = ctxt.read_u16be()?;
        if min_offset != 0 {
            validate_base_coord(table.offset(usize::from(min_offset)), otvalid)?;
        }
        let max_offset = ctxt.read_u16be()?;
        if max_offset != 0 {
            validate_base_coord(table.offset(usize::from(max_offset)), otvalid)?;
        }
    }
    Ok(())
}

fn validate_base_coord(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    match ctxt.read_u16be()? {
        1 => ctxt.check_avail(size::I16).map_err(Into::into),
        2 => {
            ctxt.skip(size::I16)?; // coordinate
            let reference_glyph = ctxt.read_u16be()?;
            if u32::from(reference_glyph) >= otvalid.glyph_count {
                return Err(ValidateError::InvalidData);
            }
            ctxt.check_avail(size::U16)?; // contour point
            Ok(())
        }
        3 => {
            ctxt.skip(size::I16)?; // coordinate
            let device_offset = ctxt.read_u16be()?;
            layout::validate_device(table.offset(usize::from(device_offset)), otvalid)
        }
        _ => Err(ValidateError::InvalidFormat),
    }
}
