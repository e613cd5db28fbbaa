//! Validation of the structures shared by every OpenType layout table:
//! Coverage, ClassDef and Device tables, the Lookup/Feature/Script
//! subsystem, and the generic offset-array walkers the per-table
//! validators are assembled from.
//!
//! Every validator takes the scope of one sub-table plus the per-table
//! [`Validator`] state and returns `Ok(())` or the first error found.
//! Errors propagate straight out of the recursion via `?`; nothing is
//! retried and no partial result is kept.

use bitflags::bitflags;
use log::debug;

use crate::binary::read::ReadScope;
use crate::error::ValidateError;
use crate::size;

/// How strictly optional sub-table offsets are policed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ValidationLevel {
    /// An optional sub-table whose offset cannot hold the sub-table is
    /// treated as absent and validation continues.
    Default,
    /// The same condition is a hard `InvalidOffset` failure.
    Paranoid,
}

/// A validation routine for one sub-table shape.
pub type ValidateFunc = fn(ReadScope<'_>, &mut Validator) -> Result<(), ValidateError>;

/// Offset arrays nest at most this deep below a registration point.
const MAX_NESTING: usize = 3;

bitflags! {
    /// The flag word of a Lookup table.
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct LookupFlag: u16 {
        const RIGHT_TO_LEFT = 0x0001;
        const IGNORE_BASE_GLYPHS = 0x0002;
        const IGNORE_LIGATURES = 0x0004;
        const IGNORE_MARKS = 0x0008;
        const USE_MARK_FILTERING_SET = 0x0010;
        const MARK_ATTACHMENT_TYPE_MASK = 0xFF00;
    }
}

/// Per-table validation state.
///
/// Created fresh for each top-level table validation and discarded when it
/// returns; nothing is shared between tables except the read-only values
/// copied in by the caller.
pub struct Validator {
    pub level: ValidationLevel,
    /// Upper bound for every glyph index read during validation.
    pub glyph_count: u32,
    /// Size of the most recently validated LookupList; the bound for every
    /// lookup index reference.
    pub lookup_count: u32,
    /// Scratch bound handed down one recursion level: a feature count, a
    /// class-set lookup limit, or a sibling table's lookup count.
    pub extra1: u32,
    /// Second scratch bound, for validators that need two sibling counts.
    pub extra2: u32,
    type_funcs: &'static [ValidateFunc],
    nesting_level: usize,
    func: [Option<ValidateFunc>; MAX_NESTING],
}

impl Validator {
    /// `type_funcs` registers the per-lookup-type subtable validators for
    /// the table being validated; tables without lookups pass `&[]`.
    pub fn new(
        level: ValidationLevel,
        glyph_count: u32,
        type_funcs: &'static [ValidateFunc],
    ) -> Validator {
        Validator {
            level,
            glyph_count,
            lookup_count: 0,
            extra1: 0,
            extra2: 0,
            type_funcs,
            nesting_level: 0,
            func: [None; MAX_NESTING],
        }
    }

    /// Register the validator for the next offset level.
    pub fn nest1(&mut self, f0: ValidateFunc) {
        self.set_nesting(&[f0]);
    }

    /// Register validators for the next two offset levels.
    pub fn nest2(&mut self, f0: ValidateFunc, f1: ValidateFunc) {
        self.set_nesting(&[f0, f1]);
    }

    /// Register validators for the next three offset levels.
    pub fn nest3(&mut self, f0: ValidateFunc, f1: ValidateFunc, f2: ValidateFunc) {
        self.set_nesting(&[f0, f1, f2]);
    }

    fn set_nesting(&mut self, funcs: &[ValidateFunc]) {
        self.nesting_level = 0;
        self.func = [None; MAX_NESTING];
        for (slot, func) in self.func.iter_mut().zip(funcs) {
            *slot = Some(*func);
        }
    }

    /// Run the validator registered at the top of the dispatch stack.
    pub fn run(&mut self, table: ReadScope<'_>) -> Result<(), ValidateError> {
        let func = self.func[0].ok_or(ValidateError::InvalidData)?;
        func(table, self)
    }

    pub(crate) fn descend(&mut self) -> Result<ValidateFunc, ValidateError> {
        let level = self.nesting_level + 1;
        let func = self
            .func
            .get(level)
            .copied()
            .flatten()
            .ok_or(ValidateError::InvalidData)?;
        self.nesting_level = level;
        Ok(func)
    }

    pub(crate) fn ascend(&mut self) {
        // a validator dispatched mid-walk may re-register the stack, which
        // resets the level; never underflow
        self.nesting_level = self.nesting_level.saturating_sub(1);
    }

    pub(crate) fn type_func(&self, lookup_type: u16) -> Result<ValidateFunc, ValidateError> {
        if lookup_type == 0 || usize::from(lookup_type) > self.type_funcs.len() {
            return Err(ValidateError::InvalidData);
        }
        Ok(self.type_funcs[usize::from(lookup_type) - 1])
    }
}

/// Police an optional sub-table offset.
///
/// An offset that points into the header, or leaves fewer than `min_size`
/// bytes before the end of the table, cannot hold its target. Under
/// `Paranoid` that is an error; otherwise the sub-table is treated as
/// absent (returned as 0) and validation continues. Offsets past the end
/// of the table are passed through so the sub-table validator reports
/// `TooShort` at either level.
pub(crate) fn check_optional_offset(
    name: &'static str,
    offset: u32,
    header_size: usize,
    min_size: usize,
    table_len: usize,
    otvalid: &Validator,
) -> Result<u32, ValidateError> {
    let off = offset as usize;
    let corrupt = off != 0 && (off < header_size || (off < table_len && off + min_size > table_len));
    if !corrupt {
        return Ok(offset);
    }
    match otvalid.level {
        ValidationLevel::Paranoid => Err(ValidateError::InvalidOffset),
        ValidationLevel::Default => {
            debug!("invalid offset to optional {} table treated as absent", name);
            Ok(0)
        }
    }
}

/// Validate a Coverage table.
///
/// When `expected_count` is supplied, the total number of covered glyphs
/// must match it exactly (a coverage table usually pairs with an array
/// holding one entry per covered glyph).
pub fn validate_coverage(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
    expected_count: Option<u32>,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let format = ctxt.read_u16be()?;
    let total = match format {
        1 => {
            let glyph_count = ctxt.read_u16be()?;
            ctxt.check_avail(usize::from(glyph_count) * size::U16)?;
            for _ in 0..glyph_count {
                let glyph = ctxt.read_u16be()?;
                if u32::from(glyph) >= otvalid.glyph_count {
                    return Err(ValidateError::InvalidData);
                }
            }
            u32::from(glyph_count)
        }
        2 => {
            let range_count = ctxt.read_u16be()?;
            ctxt.check_avail(usize::from(range_count) * 3 * size::U16)?;
            let mut total = 0u32;
            let mut last = 0u16;
            for n in 0..range_count {
                let start = ctxt.read_u16be()?;
                let end = ctxt.read_u16be()?;
                let start_coverage_index = ctxt.read_u16be()?;
                if start > end || u32::from(start_coverage_index) != total {
                    return Err(ValidateError::InvalidData);
                }
                if u32::from(end) >= otvalid.glyph_count {
                    return Err(ValidateError::InvalidData);
                }
                if n > 0 && start <= last {
                    return Err(ValidateError::InvalidData);
                }
                total += u32::from(end - start) + 1;
                last = end;
            }
            total
        }
        _ => return Err(ValidateError::InvalidFormat),
    };
    match expected_count {
        Some(expected) if expected != total => Err(ValidateError::InvalidData),
        _ => Ok(()),
    }
}

/// First glyph covered by an already validated, non-empty Coverage table.
pub fn coverage_first(table: ReadScope<'_>) -> Result<u16, ValidateError> {
    // the first glyph/range start follows the format and count fields in
    // both formats
    Ok(table.offset(2 * size::U16).ctxt().read_u16be()?)
}

/// Last glyph covered by an already validated Coverage table, or 0 when it
/// covers nothing.
pub fn coverage_last(table: ReadScope<'_>) -> Result<u16, ValidateError> {
    let mut ctxt = table.ctxt();
    let format = ctxt.read_u16be()?;
    let count = usize::from(ctxt.read_u16be()?);
    if count == 0 {
        return Ok(0);
    }
    let offset = match format {
        1 => 2 * size::U16 + (count - 1) * size::U16,
        2 => 2 * size::U16 + (count - 1) * 3 * size::U16 + size::U16,
        _ => return Ok(0),
    };
    Ok(table.offset(offset).ctxt().read_u16be()?)
}

/// Total number of glyphs covered by an already validated Coverage table.
pub fn coverage_count(table: ReadScope<'_>) -> Result<u32, ValidateError> {
    let mut ctxt = table.ctxt();
    let format = ctxt.read_u16be()?;
    let count = ctxt.read_u16be()?;
    match format {
        1 => Ok(u32::from(count)),
        2 => {
            let mut total = 0u32;
            for _ in 0..count {
                let start = ctxt.read_u16be()?;
                let end = ctxt.read_u16be()?;
                ctxt.skip(size::U16)?;
                total += u32::from(end).saturating_sub(u32::from(start)) + 1;
            }
            Ok(total)
        }
        _ => Ok(0),
    }
}

/// Validate a ClassDef table.
///
/// Glyph indices used as input to a class lookup need no bound check:
/// any glyph outside the table simply maps to class 0.
pub fn validate_class_def(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let format = ctxt.read_u16be()?;
    match format {
        1 => {
            let start_glyph = ctxt.read_u16be()?;
            let glyph_count = ctxt.read_u16be()?;
            ctxt.check_avail(usize::from(glyph_count) * size::U16)?;
            // wrapping subtraction: an empty array starting at glyph 0
            // wraps around and is rejected
            let last = (u32::from(start_glyph) + u32::from(glyph_count)).wrapping_sub(1);
            if last >= otvalid.glyph_count {
                return Err(ValidateError::InvalidData);
            }
            Ok(())
        }
        2 => {
            let range_count = ctxt.read_u16be()?;
            ctxt.check_avail(usize::from(range_count) * 3 * size::U16)?;
            let mut last = 0u16;
            for n in 0..range_count {
                let start = ctxt.read_u16be()?;
                let end = ctxt.read_u16be()?;
                ctxt.skip(size::U16)?; // class value
                if start > end || (n > 0 && start <= last) {
                    return Err(ValidateError::InvalidData);
                }
                if u32::from(end) >= otvalid.glyph_count {
                    return Err(ValidateError::InvalidData);
                }
                last = end;
            }
            Ok(())
        }
        _ => Err(ValidateError::InvalidFormat),
    }
}

/// Validate a Device table or variation index record.
pub fn validate_device(table: ReadScope<'_>, _otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let start_size = ctxt.read_u16be()?;
    let end_size = ctxt.read_u16be()?;
    let delta_format = ctxt.read_u16be()?;

    if delta_format == 0x8000 {
        // variation index record, nothing further to check here
        return Ok(());
    }
    if !(1..=3).contains(&delta_format) {
        return Err(ValidateError::InvalidFormat);
    }
    if end_size < start_size {
        return Err(ValidateError::InvalidData);
    }
    let count = usize::from(end_size - start_size) + 1;
    ctxt.check_avail(((1usize << delta_format) * count) / 8)?;
    Ok(())
}

/// Validate a Lookup table, dispatching each subtable to the validator
/// registered for its lookup type.
pub fn validate_lookup(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let lookup_type = ctxt.read_u16be()?;
    let lookup_flag = ctxt.read_u16be()?;
    let subtable_count = ctxt.read_u16be()?;

    let func = otvalid.type_func(lookup_type)?;

    ctxt.check_avail(usize::from(subtable_count) * size::U16)?;
    for _ in 0..subtable_count {
        let offset = ctxt.read_u16be()?;
        func(table.offset(usize::from(offset)), otvalid)?;
    }

    if LookupFlag::from_bits_retain(lookup_flag).contains(LookupFlag::USE_MARK_FILTERING_SET) {
        ctxt.check_avail(size::U16)?; // MarkFilteringSet
    }
    Ok(())
}

/// Validate a LookupList and record its size as the bound for every later
/// lookup index reference.
pub fn validate_lookup_list(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let lookup_count = ctxt.read_u16be()?;
    ctxt.check_avail(usize::from(lookup_count) * size::U16)?;
    otvalid.lookup_count = u32::from(lookup_count);
    for _ in 0..lookup_count {
        let offset = ctxt.read_u16be()?;
        validate_lookup(table.offset(usize::from(offset)), otvalid)?;
    }
    Ok(())
}

/// LookupCount field of a LookupList.
pub fn lookup_list_count(table: ReadScope<'_>) -> Result<u16, ValidateError> {
    Ok(table.ctxt().read_u16be()?)
}

/// FeatureCount field of a FeatureList.
pub fn feature_list_count(table: ReadScope<'_>) -> Result<u16, ValidateError> {
    Ok(table.ctxt().read_u16be()?)
}

/// LookupCount of the LookupList linked from a GSUB or GPOS table.
pub fn layout_table_lookup_count(table: ReadScope<'_>) -> Result<u16, ValidateError> {
    let offset = table.offset(4 * size::U16).ctxt().read_u16be()?;
    lookup_list_count(table.offset(usize::from(offset)))
}

/// Scan the raw lookup headers of a GSUB or GPOS table for a nonzero mark
/// attachment type in any lookup flag.
///
/// This runs over unvalidated sibling bytes, so any short read simply ends
/// the scan with a negative answer.
pub fn has_mark_attachment_type(table: &[u8]) -> bool {
    fn scan(table: &[u8]) -> Option<bool> {
        let scope = ReadScope::new(table);
        let lookup_list_offset = scope.offset(4 * size::U16).ctxt().read_u16be().ok()?;
        let lookup_list = scope.offset(usize::from(lookup_list_offset));
        let mut ctxt = lookup_list.ctxt();
        let lookup_count = ctxt.read_u16be().ok()?;
        for _ in 0..lookup_count {
            let lookup_offset = ctxt.read_u16be().ok()?;
            let mut lookup = lookup_list.offset(usize::from(lookup_offset)).ctxt();
            lookup.skip(size::U16).ok()?; // lookup type
            let lookup_flag = lookup.read_u16be().ok()?;
            if lookup_flag & LookupFlag::MARK_ATTACHMENT_TYPE_MASK.bits() != 0 {
                return Some(true);
            }
        }
        Some(false)
    }
    scan(table).unwrap_or(false)
}

/// Validate a Feature table: every lookup index must fall inside the
/// already validated LookupList.
pub fn validate_feature(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    ctxt.skip(size::U16)?; // FeatureParams (unused)
    let lookup_index_count = ctxt.read_u16be()?;
    ctxt.check_avail(usize::from(lookup_index_count) * size::U16)?;
    for _ in 0..lookup_index_count {
        if u32::from(ctxt.read_u16be()?) >= otvalid.lookup_count {
            return Err(ValidateError::InvalidData);
        }
    }
    Ok(())
}

/// Validate a FeatureList. `lookups` is the sibling LookupList, which must
/// already have been validated; its size bounds the feature lookup indices.
pub fn validate_feature_list(
    table: ReadScope<'_>,
    lookups: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let feature_count = ctxt.read_u16be()?;
    ctxt.check_avail(usize::from(feature_count) * (size::U32 + size::U16))?;
    otvalid.lookup_count = u32::from(lookup_list_count(lookups)?);
    for _ in 0..feature_count {
        ctxt.skip(size::U32)?; // feature tag
        let offset = ctxt.read_u16be()?;
        validate_feature(table.offset(usize::from(offset)), otvalid)?;
    }
    Ok(())
}

/// Validate a LangSys table against the feature count in `extra1`.
pub fn validate_lang_sys(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    ctxt.skip(size::U16)?; // LookupOrder (reserved)
    let required_feature_index = ctxt.read_u16be()?;
    let feature_index_count = ctxt.read_u16be()?;

    if required_feature_index != 0xFFFF && u32::from(required_feature_index) >= otvalid.extra1 {
        return Err(ValidateError::InvalidData);
    }
    ctxt.check_avail(usize::from(feature_index_count) * size::U16)?;
    for _ in 0..feature_index_count {
        if u32::from(ctxt.read_u16be()?) >= otvalid.extra1 {
            return Err(ValidateError::InvalidData);
        }
    }
    Ok(())
}

pub fn validate_script(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let default_lang_sys = ctxt.read_u16be()?;
    let lang_sys_count = ctxt.read_u16be()?;

    if default_lang_sys != 0 {
        validate_lang_sys(table.offset(usize::from(default_lang_sys)), otvalid)?;
    }
    ctxt.check_avail(usize::from(lang_sys_count) * (size::U32 + size::U16))?;
    for _ in 0..lang_sys_count {
        ctxt.skip(size::U32)?; // langsys tag
        let offset = ctxt.read_u16be()?;
        validate_lang_sys(table.offset(usize::from(offset)), otvalid)?;
    }
    Ok(())
}

/// Validate a ScriptList. `features` is the sibling FeatureList, which must
/// already have been validated; its size bounds the LangSys feature indices.
pub fn validate_script_list(
    table: ReadScope<'_>,
    features: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let script_count = ctxt.read_u16be()?;
    ctxt.check_avail(usize::from(script_count) * (size::U32 + size::U16))?;
    otvalid.extra1 = u32::from(feature_list_count(features)?);
    for _ in 0..script_count {
        ctxt.skip(size::U32)?; // script tag
        let offset = ctxt.read_u16be()?;
        validate_script(table.offset(usize::from(offset)), otvalid)?;
    }
    Ok(())
}

/// Counted array of offsets, each dispatched one nesting level deeper.
pub fn validate_offset_array(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let count = ctxt.read_u16be()?;
    ctxt.check_avail(usize::from(count) * size::U16)?;
    let func = otvalid.descend()?;
    for _ in 0..count {
        let offset = ctxt.read_u16be()?;
        func(table.offset(usize::from(offset)), otvalid)?;
    }
    otvalid.ascend();
    Ok(())
}

/// Format-prefixed Coverage plus a counted offset array; the coverage must
/// cover exactly one glyph per array entry. Each offset is dispatched one
/// nesting level deeper.
pub fn validate_coverage_offset_array(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    ctxt.skip(size::U16)?; // format, checked by the dispatching validator
    let coverage_offset = ctxt.read_u16be()?;
    let count = ctxt.read_u16be()?;

    validate_coverage(
        table.offset(usize::from(coverage_offset)),
        otvalid,
        Some(u32::from(count)),
    )?;

    ctxt.check_avail(usize::from(count) * size::U16)?;
    let func = otvalid.descend()?;
    for _ in 0..count {
        let offset = ctxt.read_u16be()?;
        func(table.offset(usize::from(offset)), otvalid)?;
    }
    otvalid.ascend();
    Ok(())
}

/// Counted array of indices bounded by `extra1`; a zero bound disables the
/// value checks but the array extent is still verified.
pub fn validate_index_array(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let count = ctxt.read_u16be()?;
    ctxt.check_avail(usize::from(count) * size::U16)?;
    if otvalid.extra1 != 0 {
        for _ in 0..count {
            if u32::from(ctxt.read_u16be()?) >= otvalid.extra1 {
                return Err(ValidateError::InvalidData);
            }
        }
    }
    Ok(())
}

/// Contextual rule: an input glyph/class sequence followed by records of
/// `(sequence index, lookup index)` pairs. The lookup bound rides in
/// `extra1`.
pub fn validate_rule(table: ReadScope<'_>, otvalid: &mut Validator) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let input_count = ctxt.read_u16be()?;
    let record_count = ctxt.read_u16be()?;

    if input_count == 0 {
        return Err(ValidateError::InvalidData);
    }
    ctxt.check_avail(usize::from(input_count - 1) * size::U16 + usize::from(record_count) * size::U32)?;
    ctxt.skip(usize::from(input_count - 1) * size::U16)?;

    for _ in 0..record_count {
        if ctxt.read_u16be()? >= input_count {
            return Err(ValidateError::InvalidData);
        }
        if u32::from(ctxt.read_u16be()?) >= otvalid.extra1 {
            return Err(ValidateError::InvalidData);
        }
    }
    Ok(())
}

/// Chaining contextual rule: backtrack, input and lookahead glyph/class
/// sequences followed by `(sequence index, lookup index)` records. The
/// lookup bound rides in `extra1`.
pub fn validate_chain_rule(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    let backtrack_count = ctxt.read_u16be()?;
    ctxt.check_avail(usize::from(backtrack_count) * size::U16 + size::U16)?;
    ctxt.skip(usize::from(backtrack_count) * size::U16)?;

    let input_count = ctxt.read_u16be()?;
    if input_count == 0 {
        return Err(ValidateError::InvalidData);
    }
    ctxt.check_avail(usize::from(input_count) * size::U16)?;
    ctxt.skip(usize::from(input_count - 1) * size::U16)?;

    let lookahead_count = ctxt.read_u16be()?;
    ctxt.check_avail(usize::from(lookahead_count) * size::U16 + size::U16)?;
    ctxt.skip(usize::from(lookahead_count) * size::U16)?;

    let record_count = ctxt.read_u16be()?;
    ctxt.check_avail(usize::from(record_count) * size::U32)?;
    for _ in 0..record_count {
        if ctxt.read_u16be()? >= input_count {
            return Err(ValidateError::InvalidData);
        }
        if u32::from(ctxt.read_u16be()?) >= otvalid.extra1 {
            return Err(ValidateError::InvalidData);
        }
    }
    Ok(())
}

/// Format-prefixed Coverage and ClassDef followed by a counted array of
/// possibly-null class-set offsets. Non-null entries are dispatched one
/// nesting level deeper with the lookup count in `extra1`.
pub fn validate_class_set_array(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    ctxt.skip(size::U16)?; // format, checked by the dispatching validator
    let coverage_offset = ctxt.read_u16be()?;
    let class_def_offset = ctxt.read_u16be()?;
    let class_set_count = ctxt.read_u16be()?;

    validate_coverage(table.offset(usize::from(coverage_offset)), otvalid, None)?;
    validate_class_def(table.offset(usize::from(class_def_offset)), otvalid)?;

    ctxt.check_avail(usize::from(class_set_count) * size::U16)?;
    let func = otvalid.descend()?;
    otvalid.extra1 = otvalid.lookup_count;
    for _ in 0..class_set_count {
        let offset = ctxt.read_u16be()?;
        if offset != 0 {
            func(table.offset(usize::from(offset)), otvalid)?;
        }
    }
    otvalid.ascend();
    Ok(())
}

/// Format-prefixed per-position Coverage offsets followed by
/// `(sequence index, lookup index)` records.
pub fn validate_coverage_rule(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    ctxt.skip(size::U16)?; // format, checked by the dispatching validator
    let glyph_count = ctxt.read_u16be()?;
    let record_count = ctxt.read_u16be()?;

    ctxt.check_avail(usize::from(glyph_count) * size::U16 + usize::from(record_count) * size::U32)?;
    for _ in 0..glyph_count {
        let offset = ctxt.read_u16be()?;
        validate_coverage(table.offset(usize::from(offset)), otvalid, None)?;
    }
    for _ in 0..record_count {
        if ctxt.read_u16be()? >= glyph_count {
            return Err(ValidateError::InvalidData);
        }
        if u32::from(ctxt.read_u16be()?) >= otvalid.lookup_count {
            return Err(ValidateError::InvalidData);
        }
    }
    Ok(())
}

/// Format-prefixed Coverage plus backtrack/input/lookahead ClassDefs and a
/// counted array of possibly-null chain-class-set offsets.
pub fn validate_chain_class_set_array(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    ctxt.skip(size::U16)?; // format, checked by the dispatching validator
    let coverage_offset = ctxt.read_u16be()?;
    let backtrack_class_def = ctxt.read_u16be()?;
    let input_class_def = ctxt.read_u16be()?;
    let lookahead_class_def = ctxt.read_u16be()?;
    let chain_class_set_count = ctxt.read_u16be()?;

    validate_coverage(table.offset(usize::from(coverage_offset)), otvalid, None)?;
    validate_class_def(table.offset(usize::from(backtrack_class_def)), otvalid)?;
    validate_class_def(table.offset(usize::from(input_class_def)), otvalid)?;
    validate_class_def(table.offset(usize::from(lookahead_class_def)), otvalid)?;

    ctxt.check_avail(usize::from(chain_class_set_count) * size::U16)?;
    let func = otvalid.descend()?;
    otvalid.extra1 = otvalid.lookup_count;
    for _ in 0..chain_class_set_count {
        let offset = ctxt.read_u16be()?;
        if offset != 0 {
            func(table.offset(usize::from(offset)), otvalid)?;
        }
    }
    otvalid.ascend();
    Ok(())
}

/// Format-prefixed backtrack/input/lookahead Coverage offset arrays
/// followed by `(sequence index, lookup index)` records.
pub fn validate_chain_coverage_rule(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    ctxt.skip(size::U16)?; // format, checked by the dispatching validator

    let backtrack_count = ctxt.read_u16be()?;
    ctxt.check_avail(usize::from(backtrack_count) * size::U16 + size::U16)?;
    for _ in 0..backtrack_count {
        let offset = ctxt.read_u16be()?;
        validate_coverage(table.offset(usize::from(offset)), otvalid, None)?;
    }

    let input_count = ctxt.read_u16be()?;
    ctxt.check_avail(usize::from(input_count) * size::U16 + size::U16)?;
    for _ in 0..input_count {
        let offset = ctxt.read_u16be()?;
        validate_coverage(table.offset(usize::from(offset)), otvalid, None)?;
    }

    let lookahead_count = ctxt.read_u16be()?;
    ctxt.check_avail(usize::from(lookahead_count) * size::U16 + size::U16)?;
    for _ in 0..lookahead_count {
        let offset = ctxt.read_u16be()?;
        validate_coverage(table.offset(usize::from(offset)), otvalid, None)?;
    }

    let record_count = ctxt.read_u16be()?;
    ctxt.check_avail(usize::from(record_count) * size::U32)?;
    for _ in 0..record_count {
        if ctxt.read_u16be()? >= input_count {
            return Err(ValidateError::InvalidData);
        }
        if u32::from(ctxt.read_u16be()?) >= otvalid.lookup_count {
            return Err(ValidateError::InvalidData);
        }
    }
    Ok(())
}

/// Contextual subtable dispatcher shared by GSUB type 5 and GPOS type 7.
pub(crate) fn validate_context(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    match table.ctxt().read_u16be()? {
        1 => {
            otvalid.extra1 = otvalid.lookup_count;
            otvalid.nest3(
                validate_coverage_offset_array,
                validate_offset_array,
                validate_rule,
            );
            otvalid.run(table)
        }
        2 => {
            otvalid.nest3(validate_class_set_array, validate_offset_array, validate_rule);
            otvalid.run(table)
        }
        3 => {
            otvalid.nest1(validate_coverage_rule);
            otvalid.run(table)
        }
        _ => Err(ValidateError::InvalidFormat),
    }
}

/// Chaining contextual subtable dispatcher shared by GSUB type 6 and GPOS
/// type 8.
pub(crate) fn validate_chain_context(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
) -> Result<(), ValidateError> {
    match table.ctxt().read_u16be()? {
        1 => {
            otvalid.extra1 = otvalid.lookup_count;
            otvalid.nest3(
                validate_coverage_offset_array,
                validate_offset_array,
                validate_chain_rule,
            );
            otvalid.run(table)
        }
        2 => {
            otvalid.nest3(
                validate_chain_class_set_array,
                validate_offset_array,
                validate_chain_rule,
            );
            otvalid.run(table)
        }
        3 => {
            otvalid.nest1(validate_chain_coverage_rule);
            otvalid.run(table)
        }
        _ => Err(ValidateError::InvalidFormat),
    }
}

/// Extension subtable: a 32-bit offset to a subtable of another lookup
/// type. `extension_type` is the type number of the extension lookup
/// itself, which must not recurse.
pub(crate) fn validate_extension(
    table: ReadScope<'_>,
    otvalid: &mut Validator,
    extension_type: u16,
) -> Result<(), ValidateError> {
    let mut ctxt = table.ctxt();
    if ctxt.read_u16be()? != 1 {
        return Err(ValidateError::InvalidFormat);
    }
    let lookup_type = ctxt.read_u16be()?;
    if lookup_type == extension_type {
        return Err(ValidateError::InvalidData);
    }
    let func = otvalid.type_func(lookup_type)?;
    let extension_offset = ctxt.read_u32be()?;
    func(table.offset(extension_offset as usize), otvalid)
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

    fn ok_subtable(_table: ReadScope<'_>, _otvalid: &mut Validator) -> Result<(), ValidateError> {
        Ok(())
    }

    static ONE_TYPE: [ValidateFunc; 1] = [ok_subtable];

    #[test]
    fn test_coverage_format1() {
        let data = words(&[1, 3, 2, 5, 9]);
        let mut v = validator(10);
        assert!(validate_coverage(ReadScope::new(&data), &mut v, Some(3)).is_ok());
        assert_eq!(
            validate_coverage(ReadScope::new(&data), &mut v, Some(4)),
            Err(ValidateError::InvalidData)
        );
    }

    #[test]
    fn test_coverage_format1_glyph_bound() {
        // glyph id equal to the glyph count must be rejected
        let data = words(&[1, 1, 10]);
        let mut v = validator(10);
        assert_eq!(
            validate_coverage(ReadScope::new(&data), &mut v, None),
            Err(ValidateError::InvalidData)
        );
        let mut v = validator(11);
        assert!(validate_coverage(ReadScope::new(&data), &mut v, None).is_ok());
    }

    #[test]
    fn test_coverage_format2_queries() {
        let data = words(&[2, 2, 2, 4, 0, 6, 9, 3]);
        let mut v = validator(10);
        let scope = ReadScope::new(&data);
        assert!(validate_coverage(scope, &mut v, Some(7)).is_ok());
        let first = coverage_first(scope).unwrap();
        let last = coverage_last(scope).unwrap();
        let count = coverage_count(scope).unwrap();
        assert_eq!(first, 2);
        assert_eq!(last, 9);
        assert_eq!(count, 7);
        // the covered span can only be as dense as the glyph id space
        assert!(u32::from(last - first) + 1 >= count);
    }

    #[test]
    fn test_coverage_format2_overlap() {
        // ranges must be disjoint and ascending
        let data = words(&[2, 2, 2, 4, 0, 4, 6, 3]);
        let mut v = validator(10);
        assert_eq!(
            validate_coverage(ReadScope::new(&data), &mut v, None),
            Err(ValidateError::InvalidData)
        );
    }

    #[test]
    fn test_coverage_format2_bad_running_index() {
        let data = words(&[2, 1, 2, 4, 1]);
        let mut v = validator(10);
        assert_eq!(
            validate_coverage(ReadScope::new(&data), &mut v, None),
            Err(ValidateError::InvalidData)
        );
    }

    #[test]
    fn test_coverage_format2_start_after_end() {
        let data = words(&[2, 1, 4, 2, 0]);
        let mut v = validator(10);
        assert_eq!(
            validate_coverage(ReadScope::new(&data), &mut v, None),
            Err(ValidateError::InvalidData)
        );
    }

    #[test]
    fn test_coverage_bad_format() {
        let data = words(&[3, 0]);
        let mut v = validator(10);
        assert_eq!(
            validate_coverage(ReadScope::new(&data), &mut v, None),
            Err(ValidateError::InvalidFormat)
        );
    }

    #[test]
    fn test_coverage_truncated() {
        // declares three glyphs, holds two
        let data = words(&[1, 3, 1, 2]);
        let mut v = validator(10);
        assert_eq!(
            validate_coverage(ReadScope::new(&data), &mut v, None),
            Err(ValidateError::TooShort)
        );
    }

    #[test]
    fn test_class_def_format1() {
        let data = words(&[1, 3, 3, 2, 2, 2]);
        let mut v = validator(10);
        assert!(validate_class_def(ReadScope::new(&data), &mut v).is_ok());
        // covers glyphs 3..=5; a font with only five glyphs has no glyph 5
        let mut v = validator(5);
        assert_eq!(
            validate_class_def(ReadScope::new(&data), &mut v),
            Err(ValidateError::InvalidData)
        );
    }

    #[test]
    fn test_class_def_format1_empty_wraps() {
        let data = words(&[1, 0, 0]);
        let mut v = validator(10);
        assert_eq!(
            validate_class_def(ReadScope::new(&data), &mut v),
            Err(ValidateError::InvalidData)
        );
    }

    #[test]
    fn test_class_def_format2() {
        let data = words(&[2, 2, 1, 3, 7, 4, 6, 2]);
        let mut v = validator(10);
        assert!(validate_class_def(ReadScope::new(&data), &mut v).is_ok());

        let overlapping = words(&[2, 2, 1, 3, 7, 3, 6, 2]);
        assert_eq!(
            validate_class_def(ReadScope::new(&overlapping), &mut v),
            Err(ValidateError::InvalidData)
        );
    }

    #[test]
    fn test_device() {
        // sizes 12..=15 at two bits each: four bytes of deltas
        let mut data = words(&[12, 15, 2]);
        data.extend_from_slice(&[0xAA, 0xBB]);
        let mut v = validator(10);
        assert!(validate_device(ReadScope::new(&data), &mut v).is_ok());

        let truncated = words(&[12, 15, 2]);
        assert_eq!(
            validate_device(ReadScope::new(&truncated), &mut v),
            Err(ValidateError::TooShort)
        );

        let bad_format = words(&[12, 15, 4]);
        assert_eq!(
            validate_device(ReadScope::new(&bad_format), &mut v),
            Err(ValidateError::InvalidFormat)
        );

        let bad_range = words(&[15, 12, 2]);
        assert_eq!(
            validate_device(ReadScope::new(&bad_range), &mut v),
            Err(ValidateError::InvalidData)
        );

        let variation_index = words(&[1, 2, 0x8000]);
        assert!(validate_device(ReadScope::new(&variation_index), &mut v).is_ok());
    }

    #[test]
    fn test_lookup_type_bounds() {
        let mut v = Validator::new(ValidationLevel::Default, 10, &ONE_TYPE);
        let type_zero = words(&[0, 0, 0]);
        assert_eq!(
            validate_lookup(ReadScope::new(&type_zero), &mut v),
            Err(ValidateError::InvalidData)
        );
        let type_two = words(&[2, 0, 0]);
        assert_eq!(
            validate_lookup(ReadScope::new(&type_two), &mut v),
            Err(ValidateError::InvalidData)
        );
        let type_one = words(&[1, 0, 0]);
        assert!(validate_lookup(ReadScope::new(&type_one), &mut v).is_ok());
    }

    #[test]
    fn test_lookup_mark_filtering_set() {
        let mut v = Validator::new(ValidationLevel::Default, 10, &ONE_TYPE);
        // flag 0x0010 requires a trailing mark filtering set field
        let missing = words(&[1, 0x0010, 0]);
        assert_eq!(
            validate_lookup(ReadScope::new(&missing), &mut v),
            Err(ValidateError::TooShort)
        );
        let present = words(&[1, 0x0010, 0, 7]);
        assert!(validate_lookup(ReadScope::new(&present), &mut v).is_ok());
    }

    #[test]
    fn test_lookup_list_sets_lookup_count() {
        // two empty lookups of the registered type
        let data = words(&[2, 6, 12, 1, 0, 0, 1, 0, 0]);
        let mut v = Validator::new(ValidationLevel::Default, 10, &ONE_TYPE);
        assert!(validate_lookup_list(ReadScope::new(&data), &mut v).is_ok());
        assert_eq!(v.lookup_count, 2);
    }

    #[test]
    fn test_feature_lookup_index_bound() {
        let mut v = validator(10);
        v.lookup_count = 2;
        let in_bounds = words(&[0, 2, 0, 1]);
        assert!(validate_feature(ReadScope::new(&in_bounds), &mut v).is_ok());
        let out_of_bounds = words(&[0, 2, 0, 2]);
        assert_eq!(
            validate_feature(ReadScope::new(&out_of_bounds), &mut v),
            Err(ValidateError::InvalidData)
        );
    }

    #[test]
    fn test_feature_list_rederives_lookup_count() {
        // feature list with a single feature record pointing at offset 8
        let list = words(&[1, 0, 0, 8, 0, 1, 0]);
        let lookups = words(&[1, 0]);
        let mut v = validator(10);
        assert!(
            validate_feature_list(ReadScope::new(&list), ReadScope::new(&lookups), &mut v).is_ok()
        );
        assert_eq!(v.lookup_count, 1);
    }

    #[test]
    fn test_lang_sys_bounds() {
        let mut v = validator(10);
        v.extra1 = 3; // feature count
        let ok = words(&[0, 0xFFFF, 2, 0, 2]);
        assert!(validate_lang_sys(ReadScope::new(&ok), &mut v).is_ok());
        let bad_required = words(&[0, 3, 0]);
        assert_eq!(
            validate_lang_sys(ReadScope::new(&bad_required), &mut v),
            Err(ValidateError::InvalidData)
        );
        let bad_index = words(&[0, 0xFFFF, 1, 3]);
        assert_eq!(
            validate_lang_sys(ReadScope::new(&bad_index), &mut v),
            Err(ValidateError::InvalidData)
        );
    }

    #[test]
    fn test_script_list() {
        // one script with a default langsys and one tagged langsys, both
        // at script-relative offset 10
        let script = words(&[10, 1, 0x6C61, 0x746E, 10, 0, 0xFFFF, 1, 0]);
        let mut list = words(&[1, 0x7363, 0x7270, 8]);
        list.extend_from_slice(&script);
        let features = words(&[1]);
        let mut v = validator(10);
        assert!(
            validate_script_list(ReadScope::new(&list), ReadScope::new(&features), &mut v).is_ok()
        );
    }

    #[test]
    fn test_offset_array_dispatch() {
        let data = words(&[2, 6, 8, 0, 0]);
        let mut v = validator(10);
        v.nest2(validate_offset_array, ok_subtable);
        assert!(v.run(ReadScope::new(&data)).is_ok());

        let truncated = words(&[2, 6]);
        v.nest2(validate_offset_array, ok_subtable);
        assert_eq!(v.run(ReadScope::new(&truncated)), Err(ValidateError::TooShort));
    }

    #[test]
    fn test_index_array_bound() {
        let data = words(&[2, 0, 4]);
        let mut v = validator(10);
        v.extra1 = 5;
        assert!(validate_index_array(ReadScope::new(&data), &mut v).is_ok());
        v.extra1 = 4;
        assert_eq!(
            validate_index_array(ReadScope::new(&data), &mut v),
            Err(ValidateError::InvalidData)
        );
        // a zero bound disables the value checks entirely
        v.extra1 = 0;
        assert!(validate_index_array(ReadScope::new(&data), &mut v).is_ok());
    }

    #[test]
    fn test_rule_bounds() {
        let mut v = validator(10);
        v.extra1 = 2; // lookup bound

        // two-glyph input, one record referencing position 1, lookup 1
        let ok = words(&[2, 1, 7, 1, 1]);
        assert!(validate_rule(ReadScope::new(&ok), &mut v).is_ok());

        let empty_input = words(&[0, 0]);
        assert_eq!(
            validate_rule(ReadScope::new(&empty_input), &mut v),
            Err(ValidateError::InvalidData)
        );

        let bad_sequence_index = words(&[2, 1, 7, 2, 1]);
        assert_eq!(
            validate_rule(ReadScope::new(&bad_sequence_index), &mut v),
            Err(ValidateError::InvalidData)
        );

        let bad_lookup_index = words(&[2, 1, 7, 1, 2]);
        assert_eq!(
            validate_rule(ReadScope::new(&bad_lookup_index), &mut v),
            Err(ValidateError::InvalidData)
        );
    }

    #[test]
    fn test_chain_rule_bounds() {
        let mut v = validator(10);
        v.extra1 = 3;
        // one backtrack glyph, two input glyphs, one lookahead glyph,
        // one record
        let ok = words(&[1, 9, 2, 8, 1, 7, 1, 0, 2]);
        assert!(validate_chain_rule(ReadScope::new(&ok), &mut v).is_ok());

        let bad_lookup = words(&[1, 9, 2, 8, 1, 7, 1, 0, 3]);
        assert_eq!(
            validate_chain_rule(ReadScope::new(&bad_lookup), &mut v),
            Err(ValidateError::InvalidData)
        );
    }

    #[test]
    fn test_has_mark_attachment_type() {
        // header, lookup list at 10 with one lookup whose flag has a mark
        // attachment type in the top byte
        let flagged = words(&[1, 0, 0, 0, 10, 1, 4, 1, 0x0100, 0]);
        assert!(has_mark_attachment_type(&flagged));

        let unflagged = words(&[1, 0, 0, 0, 10, 1, 4, 1, 0x0010, 0]);
        assert!(!has_mark_attachment_type(&unflagged));

        // garbage input must answer without reading out of bounds
        assert!(!has_mark_attachment_type(&[0xFF; 3]));
        assert!(!has_mark_attachment_type(&[]));
    }

    #[test]
    fn test_layout_table_lookup_count() {
        let data = words(&[1, 0, 0, 0, 10, 3, 0, 0, 0]);
        assert_eq!(layout_table_lookup_count(ReadScope::new(&data)).unwrap(), 3);
    }

    #[test]
    fn test_check_optional_offset() {
        let v = validator(10);
        // an offset into the 10-byte header is repaired at default level
        assert_eq!(check_optional_offset("t", 8, 10, 4, 40, &v).unwrap(), 0);
        // an offset leaving fewer than min_size bytes is repaired too
        assert_eq!(check_optional_offset("t", 38, 10, 4, 40, &v).unwrap(), 0);
        // a healthy offset passes through
        assert_eq!(check_optional_offset("t", 12, 10, 4, 40, &v).unwrap(), 12);
        // zero means absent
        assert_eq!(check_optional_offset("t", 0, 10, 4, 40, &v).unwrap(), 0);
        // past the end: left for the sub-table validator to reject
        assert_eq!(check_optional_offset("t", 64, 10, 4, 40, &v).unwrap(), 64);

        let paranoid = Validator::new(ValidationLevel::Paranoid, 10, &[]);
        assert_eq!(
            check_optional_offset("t", 8, 10, 4, 40, &paranoid),
            Err(ValidateError::InvalidOffset)
        );
    }
}
