//! `JSTF` table validation.
//!
//! A justification table references its sibling GSUB and GPOS tables in
//! two ways: the enable/disable modification lists hold lookup indices
//! into those tables, and the justification maximum tables embed whole
//! positioning lookups. The caller supplies the sibling bytes so the
//! bounds can be derived here.

use log::trace;

use crate::binary::read::ReadScope;
use crate::error::ValidateError;
use crate::gpos;
use crate::layout::{self, ValidationLevel, Validator};
use crate::size;

const PRIORITY_HEADER_SIZE: usize = 10 * size::U16;
const MOD_LIST_MIN: usize = size::U16;

/// Validate a `JSTF` table. `gsub` and `gpos` are the raw bytes of the
/// sibling tables when present; they must already have been validated.
pub fn validate(
    table: &[u8],
    gsub: Option<&[u8]>,
    gpos: Option<&[u8]>,
    glyph_count: u32,
    level: ValidationLevel,
) -> Result<(), ValidateError> {
    trace!("validating JSTF table");
    let scope = ReadScope::new(table);
    // the justification maximum tables hold positioning lookups
    let otvalid = &mut Validator::new(level, glyph_count, &gpos::VALIDATE_FUNCS);
    otvalid.extra1 = match gsub {
        Some(data) => u32::from(layout::layout_table_lookup_count(ReadScope::new(data))?),
        None => 0,
    };
    otvalid.extra2 = match gpos {
        Some(data) => u32::from(layout::layout_table_lookup_count(ReadScope::new(data))?),
        None => 0,
    };

    let mut ctxt = scope.ctxt();
    if ctxt.read_u16be()? != 1 {
        return Err(ValidateError::InvalidFormat);
    }
    if ctxt.read_u16be()? != 0 {
        return Err(ValidateError::InvalidFormat);
    }
    let jstf_script_count = ctxt.read_u16be()?;
    ctxt.check_avail(usize::from(jstf_script_count) * (size::U32 + size::U16))?;
    for _ in 0..jstf_script_count {
        ctxt.skip(size::U32)?; // script tag
        let offset = ctxt.read_u16be()?;
        validate_jstf_script(scope.offset(usize::from(offset)), otvalid)?;
    }
    Ok(())
}

fn validate_jstf_script(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let extender_glyph_offset = ctxt.read_u16be()?;
    let def_jstf_lang_sys_offset = ctxt.read_u16be()?;
    let jstf_lang_sys_count = ctxt.read_u16be()?;

    if extender_glyph_offset != 0 {
        validate_extender_glyphs(table.offset(usize::from(extender_glyph_offset)), otvalid)?;
    }
    if def_jstf_lang_sys_offset != 0 {
        validate_jstf_lang_sys(table.offset(usize::from(def_jstf_lang_sys_offset)), otvalid)?;
    }
    ctxt.check_avail(usize::from(jstf_lang_sys_count) * (size::U32 + size::U16))?;
    for _ in 0..jstf_lang_sys_count {
        ctxt.skip(size::U32)?; // language system tag
        let offset = ctxt.read_u16be()?;
        validate_jstf_lang_sys(table.offset(usize::from(offset)), otvalid)?;
    }
    Ok(())
}

fn validate_extender_glyphs(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let glyph_count = ctxt.read_u16be()?;
    ctxt.check_avail(usize::from(glyph_count) * size::U16)?;
    for _ in 0..glyph_count {
        if u32::from(ctxt.read_u16be()?) >= otvalid.glyph_count {
            return Err(ValidateError::InvalidData);
        }
    }
    Ok(())
}

fn validate_jstf_lang_sys(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    otvalid.nest2(layout::validate_offset_array, validate_jstf_priority);
    otvalid.run(table)
}

fn validate_jstf_priority(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    ctxt.check_avail(PRIORITY_HEADER_SIZE)?;
    let gsub_lookup_count = otvalid.extra1;
    let gpos_lookup_count = otvalid.extra2;

    // shrinkage
    let gsub_enable = ctxt.read_u16be()?;
    validate_mod_list(table, gsub_enable, gsub_lookup_count, otvalid)?;
    let gsub_disable = ctxt.read_u16be()?;
    validate_mod_list(table, gsub_disable, gsub_lookup_count, otvalid)?;
    let gpos_enable = ctxt.read_u16be()?;
    validate_mod_list(table, gpos_enable, gpos_lookup_count, otvalid)?;
    let gpos_disable = ctxt.read_u16be()?;
    validate_mod_list(table, gpos_disable, gpos_lookup_count, otvalid)?;
    let shrinkage_jstf_max = ctxt.read_u16be()?;
    validate_jstf_max(table, shrinkage_jstf_max, gpos_lookup_count, otvalid)?;

    // extension
    let gsub_enable = ctxt.read_u16be()?;
    validate_mod_list(table, gsub_enable, gsub_lookup_count, otvalid)?;
    let gsub_disable = ctxt.read_u16be()?;
    validate_mod_list(table, gsub_disable, gsub_lookup_count, otvalid)?;
    let gpos_enable = ctxt.read_u16be()?;
    validate_mod_list(table, gpos_enable, gpos_lookup_count, otvalid)?;
    let gpos_disable = ctxt.read_u16be()?;
    validate_mod_list(table, gpos_disable, gpos_lookup_count, otvalid)?;
    let extension_jstf_max = ctxt.read_u16be()?;
    validate_jstf_max(table, extension_jstf_max, gpos_lookup_count, otvalid)?;

    // the sibling lookup counts travel in the scratch slots; later
    // priorities read them again
    otvalid.extra1 = gsub_lookup_count;
    otvalid.extra2 = gpos_lookup_count;
    Ok(())
}

/// A lookup index list bounded by one sibling table's lookup count.
fn validate_mod_list(
    table: ReadScope<'_>,
    offset: u16,
    lookup_count: u32,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let offset = layout::check_optional_offset(
        "JstfModList",
        u32::from(offset),
        PRIORITY_HEADER_SIZE,
        MOD_LIST_MIN,
        table.data().len(),
        otvalid,
    )?;
    if offset != 0 {
        otvalid.extra1 = lookup_count;
        layout::validate_index_array(table.offset(offset as usize), otvalid)?;
    }
    Ok(())
}

/// A counted array of positioning lookups giving the justification
/// maximum adjustments.
fn validate_jstf_max(
    table: ReadScope<'_>,
    offset: u16,
    gpos_lookup_count: u32,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let offset = layout::check_optional_offset(
        "JstfMax",
        u32::from(offset),
        PRIORITY_HEADER_SIZE,
        MOD_LIST_MIN,
        table.data().len(),
        otvalid,
    )?;
    if offset != 0 {
        // rule lookup indices inside the embedded lookups reference the
        // sibling GPOS lookup list
        otvalid.lookup_count = gpos_lookup_count;
        otvalid.nest2(layout::validate_offset_array, layout::validate_lookup);
        otvalid.run(table.offset(offset as usize))?;
    }
    Ok(())
}
