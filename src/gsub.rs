//! `GSUB` table validation.

use log::trace;

use crate::binary::read::ReadScope;
use crate::error::ValidateError;
use crate::layout::{self, ValidateFunc, ValidationLevel, Validator};
use crate::size;

/// Subtable validators indexed by lookup type minus one.
pub(crate) static VALIDATE_FUNCS: [ValidateFunc; 8] = [
    validate_single_subst,
    validate_multiple_subst,
    validate_alternate_subst,
    validate_ligature_subst,
    layout::validate_context,
    layout::validate_chain_context,
    validate_extension_subst,
    validate_reverse_chain_single_subst,
];

const EXTENSION_TYPE: u16 = 7;

/// Validate a `GSUB` table.
pub fn validate(table: &[u8], glyph_count: u32, level: ValidationLevel) -> Result<(), ValidateError> {
    trace!("validating GSUB table");
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
        // FeatureVariations: the offset is read but its target is not
        // walked, like the GDEF item variation store
        ctxt.read_u32be()?;
    }

    let lookups = scope.offset(usize::from(lookup_list_offset));
    let features = scope.offset(usize::from(feature_list_offset));
    layout::validate_lookup_list(lookups, otvalid)?;
    layout::validate_feature_list(features, lookups, otvalid)?;
    layout::validate_script_list(scope.offset(usize::from(script_list_offset)), features, otvalid)?;
    Ok(())
}

// Single substitution: format 1 applies a delta to every covered glyph,
// so only the coverage endpoints need testing; format 2 pairs the
// coverage with an explicit substitute array.
fn validate_single_subst(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    match ctxt.read_u16be()? {
        1 => {
            let coverage_offset = ctxt.read_u16be()?;
            let delta_glyph_id = ctxt.read_i16be()?;
            let coverage = table.offset(usize::from(coverage_offset));
            layout::validate_coverage(coverage, otvalid, None)?;

            let first = i32::from(layout::coverage_first(coverage)?) + i32::from(delta_glyph_id);
            if first < 0 {
                return Err(ValidateError::InvalidData);
            }
            let last = i32::from(layout::coverage_last(coverage)?) + i32::from(delta_glyph_id);
            if last < 0 || last as u32 >= otvalid.glyph_count {
                return Err(ValidateError::InvalidData);
            }
            Ok(())
        }
        2 => {
            let coverage_offset = ctxt.read_u16be()?;
            let glyph_count = ctxt.read_u16be()?;
            layout::validate_coverage(
                table.offset(usize::from(coverage_offset)),
                otvalid,
                Some(u32::from(glyph_count)),
            )?;
            ctxt.check_avail(usize::from(glyph_count) * size::U16)?;
            for _ in 0..glyph_count {
                if u32::from(ctxt.read_u16be()?) >= otvalid.glyph_count {
                    return Err(ValidateError::InvalidData);
                }
            }
            Ok(())
        }
        _ => Err(ValidateError::InvalidFormat),
    }
}

fn validate_multiple_subst(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    if table.ctxt().read_u16be()? != 1 {
        return Err(ValidateError::InvalidFormat);
    }
    // the sequences hold substitute glyphs
    otvalid.extra1 = otvalid.glyph_count;
    otvalid.nest2(
        layout::validate_coverage_offset_array,
        layout::validate_index_array,
    );
    otvalid.run(table)
}

fn validate_alternate_subst(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    if table.ctxt().read_u16be()? != 1 {
        return Err(ValidateError::InvalidFormat);
    }
    // the alternate sets hold substitute glyphs
    otvalid.extra1 = otvalid.glyph_count;
    otvalid.nest2(
        layout::validate_coverage_offset_array,
        layout::validate_index_array,
    );
    otvalid.run(table)
}

fn validate_ligature_subst(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    if table.ctxt().read_u16be()? != 1 {
        return Err(ValidateError::InvalidFormat);
    }
    otvalid.nest3(
        layout::validate_coverage_offset_array,
        layout::validate_offset_array,
        validate_ligature,
    );
    otvalid.run(table)
}

fn validate_ligature(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let ligature_glyph = ctxt.read_u16be()?;
    if u32::from(ligature_glyph) >= otvalid.glyph_count {
        return Err(ValidateError::InvalidData);
    }
    let component_count = ctxt.read_u16be()?;
    if component_count == 0 {
        return Err(ValidateError::InvalidData);
    }
    ctxt.check_avail(usize::from(component_count - 1) * size::U16)?;
    Ok(())
}

fn validate_extension_subst(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    layout::validate_extension(table, otvalid, EXTENSION_TYPE)
}

fn validate_reverse_chain_single_subst(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    if ctxt.read_u16be()? != 1 {
        return Err(ValidateError::InvalidFormat);
    }
    let coverage_offset = ctxt.read_u16be()?;
    let coverage = table.offset(usize::from(coverage_offset));
    layout::validate_coverage(coverage, otvalid, None)?;

    let backtrack_count = ctxt.read_u16be()?;
    ctxt.check_avail(usize::from(backtrack_count) * size::U16 + size::U16)?;
    for _ in 0..backtrack_count {
        let offset = ctxt.read_u16be()?;
        layout::validate_coverage(table.offset(usize::from(offset)), otvalid, None)?;
    }

    let lookahead_count = ctxt.read_u16be()?;
    ctxt.check_avail(usize::from(lookahead_count) * size::U16 + size::U16)?;
    for _ in 0..lookahead_count {
        let offset = ctxt.read_u16be()?;
        layout::validate_coverage(table.offset(usize::from(offset)), otvalid, None)?;
    }

    let glyph_count = ctxt.read_u16be()?;
    if u32::from(glyph_count) != layout::coverage_count(coverage)? {
        return Err(ValidateError::InvalidData);
    }
    ctxt.check_avail(usize::from(glyph_count) * size::U16)?;
    for _ in 0..glyph_count {
        if u32::from(ctxt.read_u16be()?) >= otvalid.glyph_count {
            return Err(ValidateError::InvalidData);
        }
    }
    Ok(())
}
