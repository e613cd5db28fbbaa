//! Top-level validation of a font's layout tables.
//!
//! Tables are validated in a fixed order so that cross-table inputs exist
//! by the time they are needed: BASE, GPOS and GSUB stand alone, GDEF
//! reads the raw GSUB/GPOS lookup flags to resolve its version 1.0 header
//! layout, and JSTF derives its lookup index bounds from the validated
//! GSUB/GPOS tables. The first failing table aborts the whole call.

use bitflags::bitflags;

use crate::error::ValidationError;
use crate::layout::{self, ValidationLevel};
use crate::{base, gdef, gpos, gsub, jstf, math, tag};

bitflags! {
    /// The set of layout tables a [`validate`] call should check.
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct TableFlags: u32 {
        const BASE = 0x0001;
        const GDEF = 0x0002;
        const GPOS = 0x0004;
        const GSUB = 0x0008;
        const JSTF = 0x0010;
        const MATH = 0x0020;
        const ALL = Self::BASE.bits()
            | Self::GDEF.bits()
            | Self::GPOS.bits()
            | Self::GSUB.bits()
            | Self::JSTF.bits()
            | Self::MATH.bits();
    }
}

/// Source of raw table bytes, implemented by the font container.
pub trait FontSource {
    /// The raw bytes of a named top-level table, or `None` if the font
    /// does not carry it. An absent table is skipped, not an error. The
    /// returned buffer must hold the complete table.
    fn load_table(&self, tag: u32) -> Option<Vec<u8>>;

    /// Total number of glyphs in the font.
    fn glyph_count(&self) -> u32;
}

/// The raw bytes of every requested table that was present, returned once
/// all of them validated.
pub struct ValidatedTables {
    pub base: Option<Vec<u8>>,
    pub gdef: Option<Vec<u8>>,
    pub gpos: Option<Vec<u8>>,
    pub gsub: Option<Vec<u8>>,
    pub jstf: Option<Vec<u8>>,
    pub math: Option<Vec<u8>>,
}

/// Validate the requested layout tables of `font`.
///
/// Returns the raw bytes of every requested table that was present, for
/// reuse by consumers that can then skip per-access bounds checks. If any
/// requested table fails, the whole call fails and nothing is returned;
/// callers must not trust any of the font's layout data in that case.
pub fn validate(
    font: &impl FontSource,
    requested: TableFlags,
    level: ValidationLevel,
) -> Result<ValidatedTables, ValidationError> {
    // layout tables cannot address glyphs beyond a 16-bit index
    let glyph_count = font.glyph_count().min(u32::from(u16::MAX));
    let load = |flag: TableFlags, table_tag: u32| -> Option<Vec<u8>> {
        if requested.contains(flag) {
            font.load_table(table_tag)
        } else {
            None
        }
    };

    let base_data = load(TableFlags::BASE, tag::BASE);
    let gdef_data = load(TableFlags::GDEF, tag::GDEF);
    let gpos_data = load(TableFlags::GPOS, tag::GPOS);
    let gsub_data = load(TableFlags::GSUB, tag::GSUB);
    let jstf_data = load(TableFlags::JSTF, tag::JSTF);
    let math_data = load(TableFlags::MATH, tag::MATH);

    if let Some(data) = &base_data {
        base::validate(data, glyph_count, level)
            .map_err(|err| ValidationError::new(tag::BASE, err))?;
    }
    if let Some(data) = &gpos_data {
        gpos::validate(data, glyph_count, level)
            .map_err(|err| ValidationError::new(tag::GPOS, err))?;
    }
    if let Some(data) = &gsub_data {
        gsub::validate(data, glyph_count, level)
            .map_err(|err| ValidationError::new(tag::GSUB, err))?;
    }
    if let Some(data) = &gdef_data {
        // the wide version 1.0 header cannot be recognized from the GDEF
        // bytes alone; the raw (not necessarily validated) sibling lookup
        // flags decide
        let need_mark_attach_classdef = gsub_data
            .as_deref()
            .map_or(false, layout::has_mark_attachment_type)
            || gpos_data
                .as_deref()
                .map_or(false, layout::has_mark_attachment_type);
        gdef::validate(data, need_mark_attach_classdef, glyph_count, level)
            .map_err(|err| ValidationError::new(tag::GDEF, err))?;
    }
    if let Some(data) = &jstf_data {
        jstf::validate(
            data,
            gsub_data.as_deref(),
            gpos_data.as_deref(),
            glyph_count,
            level,
        )
        .map_err(|err| ValidationError::new(tag::JSTF, err))?;
    }
    if let Some(data) = &math_data {
        math::validate(data, glyph_count, level)
            .map_err(|err| ValidationError::new(tag::MATH, err))?;
    }

    Ok(ValidatedTables {
        base: base_data,
        gdef: gdef_data,
        gpos: gpos_data,
        gsub: gsub_data,
        jstf: jstf_data,
        math: math_data,
    })
}
