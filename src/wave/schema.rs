// src/wave/schema.rs

//! The chunk registry for `RIFF:WAVE` files.
//!
//! Registered kinds: `fmt `, `fact`, `data`, `cue `, `plst`, `LIST:INFO`
//! (text tags) and `LIST:adtl` (cue labels and notes). Anything else found in
//! a WAVE file is skipped on read.

use crate::riff::component::{Component, RiffTree, ValidationContext};
use crate::riff::fourcc::FourCC;
use crate::riff::leaf::{Leaf, LeafKind};
use crate::riff::procedures::{ListSchema, ProcedureSet};
use crate::riff::stream::{ReadSeek, WriteSeek};
use crate::utils::error::{Result, RiffError};
use crate::utils::tree::NodeId;
use crate::utils::validation::ValidationResult;
use crate::wave::cue::{CuePoint, PlaylistSegment};
use crate::wave::format::{FormatTag, WaveFormat};
use std::collections::HashSet;

pub const WAVE: FourCC = FourCC::from_bytes(*b"WAVE");
pub const FMT: FourCC = FourCC::from_bytes(*b"fmt ");
pub const FACT: FourCC = FourCC::from_bytes(*b"fact");
pub const DATA: FourCC = FourCC::from_bytes(*b"data");
pub const CUE: FourCC = FourCC::from_bytes(*b"cue ");
pub const PLST: FourCC = FourCC::from_bytes(*b"plst");
pub const INFO: FourCC = FourCC::from_bytes(*b"INFO");
pub const ADTL: FourCC = FourCC::from_bytes(*b"adtl");
pub const LABL: FourCC = FourCC::from_bytes(*b"labl");
pub const NOTE: FourCC = FourCC::from_bytes(*b"note");
pub const LTXT: FourCC = FourCC::from_bytes(*b"ltxt");

/// Text tags recognised inside `LIST:INFO`.
pub const INFO_TAGS: [&[u8; 4]; 23] = [
    b"IARL", b"IART", b"ICMS", b"ICMT", b"ICOP", b"ICRD", b"ICRP", b"IDIM", b"IDPI", b"IENG",
    b"IGNR", b"IKEY", b"ILGT", b"IMED", b"INAM", b"IPLT", b"IPRD", b"ISBJ", b"ISFT", b"ISRC",
    b"ISRF", b"ITCH", b"ITRK",
];

/// Fixed part of an `ltxt` payload: cue ID, sample length, purpose and four
/// 16-bit locale fields.
const LTXT_HEADER_SIZE: u64 = 20;

/// The `RIFF:WAVE` schema.
pub fn wave_schema() -> ListSchema {
    ListSchema::new(FourCC::RIFF, WAVE)
        .with_procedures(ProcedureSet::new().with_validate(validate_wave))
        .with_chunk(
            FMT,
            ProcedureSet::new()
                .with_read(read_format)
                .with_write(check_format)
                .with_validate(validate_format),
        )
        .with_chunk(
            FACT,
            ProcedureSet::new()
                .with_read(read_fact)
                .with_validate(validate_fact),
        )
        .with_chunk(DATA, ProcedureSet::new())
        .with_chunk(
            CUE,
            ProcedureSet::new()
                .with_read(|tree, node, stream| read_counted(tree, node, stream, LeafKind::CuePoint))
                .with_write(|tree, node, _| {
                    check_counted(tree, node, is_cue_point).map_err(RiffError::RiffFormat)
                })
                .with_validate(validate_cue_points),
        )
        .with_chunk(
            PLST,
            ProcedureSet::new()
                .with_read(|tree, node, stream| {
                    read_counted(tree, node, stream, LeafKind::PlaylistSegment)
                })
                .with_write(|tree, node, _| {
                    check_counted(tree, node, is_playlist_segment).map_err(RiffError::RiffFormat)
                })
                .with_validate(|tree, node, _| {
                    let mut result = ValidationResult::valid();
                    if let Err(reason) = check_counted(tree, node, is_playlist_segment) {
                        result.fail(reason);
                    }
                    result
                }),
        )
        .with_list(info_schema())
        .with_list(adtl_schema())
}

/// `LIST:INFO`: one zero-terminated text per tag chunk.
pub fn info_schema() -> ListSchema {
    INFO_TAGS
        .iter()
        .fold(ListSchema::new(FourCC::LIST, INFO), |schema, tag| {
            schema.with_chunk(FourCC::from_bytes(**tag), ProcedureSet::new().with_read(read_text))
        })
}

/// `LIST:adtl`: labels, notes and labelled text attached to cue points.
pub fn adtl_schema() -> ListSchema {
    ListSchema::new(FourCC::LIST, ADTL)
        .with_chunk(LABL, ProcedureSet::new().with_read(read_label))
        .with_chunk(NOTE, ProcedureSet::new().with_read(read_label))
        .with_chunk(LTXT, ProcedureSet::new().with_read(read_labelled_text))
}

fn declared(tree: &RiffTree, node: NodeId) -> Result<u64> {
    tree.declared_size(node).map(u64::from).ok_or_else(|| {
        RiffError::InvalidOperation("chunk length has not been read".to_string())
    })
}

fn append(tree: &mut RiffTree, node: NodeId, leaf: Leaf) -> Result<()> {
    tree.append(node, Component::Value(leaf))?;
    Ok(())
}

/// The only value of `node`, if it has exactly one child and that child is a value.
fn only_value(tree: &RiffTree, node: NodeId) -> Option<&Leaf> {
    match tree.children(node) {
        [child] => tree.leaf(*child),
        _ => None,
    }
}

fn read_format(tree: &mut RiffTree, node: NodeId, stream: &mut dyn ReadSeek) -> Result<()> {
    let size = declared(tree, node)?;
    let format = WaveFormat::read(stream, size)?;
    append(tree, node, Leaf::WaveFormat(format))
}

fn check_format(tree: &RiffTree, node: NodeId, _: &mut dyn WriteSeek) -> Result<()> {
    match only_value(tree, node) {
        Some(Leaf::WaveFormat(_)) => Ok(()),
        _ => Err(RiffError::RiffFormat(
            "'fmt ' chunk must hold exactly one format record".to_string(),
        )),
    }
}

fn validate_format(tree: &RiffTree, node: NodeId, _: &ValidationContext) -> ValidationResult {
    let mut result = ValidationResult::valid();
    result.require(
        matches!(only_value(tree, node), Some(Leaf::WaveFormat(_))),
        || "'fmt ' chunk must hold exactly one format record".to_string(),
    );
    result
}

fn read_fact(tree: &mut RiffTree, node: NodeId, stream: &mut dyn ReadSeek) -> Result<()> {
    let frames = Leaf::read(LeafKind::U32, stream)?;
    append(tree, node, frames)
}

fn validate_fact(tree: &RiffTree, node: NodeId, _: &ValidationContext) -> ValidationResult {
    let mut result = ValidationResult::valid();
    result.require(matches!(only_value(tree, node), Some(Leaf::U32(_))), || {
        "'fact' chunk must hold exactly one sample count".to_string()
    });
    result
}

/// Reads a 32-bit record count followed by that many fixed-size records.
fn read_counted(
    tree: &mut RiffTree,
    node: NodeId,
    stream: &mut dyn ReadSeek,
    kind: LeafKind,
) -> Result<()> {
    let size = declared(tree, node)?;
    let record_size = match kind {
        LeafKind::CuePoint => CuePoint::SIZE,
        _ => PlaylistSegment::SIZE,
    };
    let count = Leaf::read(LeafKind::U32, stream)?;
    let n = u64::from(count.as_u32().unwrap_or(0));
    let room = size.saturating_sub(4) / record_size;
    if n > room {
        return Err(RiffError::RiffFormat(format!(
            "chunk lists {} records but only has room for {}",
            n, room
        )));
    }
    append(tree, node, count)?;
    for _ in 0..n {
        let record = Leaf::read(kind, stream)?;
        append(tree, node, record)?;
    }
    Ok(())
}

fn is_cue_point(leaf: &Leaf) -> bool {
    matches!(leaf, Leaf::CuePoint(_))
}

fn is_playlist_segment(leaf: &Leaf) -> bool {
    matches!(leaf, Leaf::PlaylistSegment(_))
}

/// Checks that the first value is a count matching the number of records after it.
fn check_counted(
    tree: &RiffTree,
    node: NodeId,
    is_record: fn(&Leaf) -> bool,
) -> std::result::Result<(), String> {
    let mut values = tree.values(node);
    let count = values
        .next()
        .and_then(Leaf::as_u32)
        .ok_or_else(|| "record list does not start with a count".to_string())?;
    let mut records = 0u64;
    for value in values {
        if !is_record(value) {
            return Err(format!("unexpected value {:?} in record list", value));
        }
        records += 1;
    }
    if u64::from(count) != records {
        return Err(format!(
            "count {} does not match {} records",
            count, records
        ));
    }
    Ok(())
}

fn validate_cue_points(tree: &RiffTree, node: NodeId, _: &ValidationContext) -> ValidationResult {
    let mut result = ValidationResult::valid();
    if let Err(reason) = check_counted(tree, node, is_cue_point) {
        result.fail(reason);
    }
    let mut seen = HashSet::new();
    for cue in tree.values(node).filter_map(Leaf::as_cue_point) {
        result.require(seen.insert(cue.cue_id), || {
            format!("cue ID {} is used more than once", cue.cue_id)
        });
    }
    result
}

fn read_text(tree: &mut RiffTree, node: NodeId, stream: &mut dyn ReadSeek) -> Result<()> {
    let size = declared(tree, node)?;
    if size == 0 {
        return Ok(());
    }
    let text = Leaf::read_text(stream, size)?;
    append(tree, node, text)
}

/// `labl` and `note`: a cue ID followed by text.
fn read_label(tree: &mut RiffTree, node: NodeId, stream: &mut dyn ReadSeek) -> Result<()> {
    let size = declared(tree, node)?;
    if size < 4 {
        return Err(RiffError::RiffFormat(format!(
            "label of {} bytes has no room for a cue ID",
            size
        )));
    }
    let cue_id = Leaf::read(LeafKind::U32, stream)?;
    append(tree, node, cue_id)?;
    if size > 4 {
        let text = Leaf::read_text(stream, size - 4)?;
        append(tree, node, text)?;
    }
    Ok(())
}

fn read_labelled_text(tree: &mut RiffTree, node: NodeId, stream: &mut dyn ReadSeek) -> Result<()> {
    let size = declared(tree, node)?;
    if size < LTXT_HEADER_SIZE {
        return Err(RiffError::RiffFormat(format!(
            "'ltxt' chunk needs {} bytes, chunk declares {}",
            LTXT_HEADER_SIZE, size
        )));
    }
    for kind in [
        LeafKind::U32,
        LeafKind::U32,
        LeafKind::FourCC,
        LeafKind::U16,
        LeafKind::U16,
        LeafKind::U16,
        LeafKind::U16,
    ] {
        let field = Leaf::read(kind, stream)?;
        append(tree, node, field)?;
    }
    if size > LTXT_HEADER_SIZE {
        let text = Leaf::read_text(stream, size - LTXT_HEADER_SIZE)?;
        append(tree, node, text)?;
    }
    Ok(())
}

/// The format record of the `RIFF:WAVE` list at `riff`.
pub fn wave_format(tree: &RiffTree, riff: NodeId) -> Option<&WaveFormat> {
    let fmt = child(tree, riff, FMT)?;
    tree.values(fmt).find_map(Leaf::as_wave_format)
}

fn child(tree: &RiffTree, parent: NodeId, id: FourCC) -> Option<NodeId> {
    tree.children(parent)
        .iter()
        .copied()
        .find(|&node| tree.chunk_id(node) == Some(id))
}

/// Cross-chunk rules: a single `fmt ` ahead of `data`, a `fact` chunk for
/// compressed formats, whole sample frames in `data`, and cue references
/// that resolve.
fn validate_wave(tree: &RiffTree, riff: NodeId, _: &ValidationContext) -> ValidationResult {
    let mut result = ValidationResult::valid();
    let ids: Vec<FourCC> = tree
        .children(riff)
        .iter()
        .filter_map(|&node| tree.chunk_id(node))
        .collect();
    let position = |id: FourCC| ids.iter().position(|&other| other == id);

    let formats = ids.iter().filter(|&&id| id == FMT).count();
    result.require(formats == 1, || {
        format!("expected exactly one 'fmt ' chunk, found {}", formats)
    });
    match (position(FMT), position(DATA)) {
        (Some(fmt), Some(data)) => {
            result.require(fmt < data, || {
                "'fmt ' chunk must precede the 'data' chunk".to_string()
            });
        }
        (_, None) => result.fail("missing 'data' chunk"),
        _ => {}
    }

    if let Some(format) = wave_format(tree, riff) {
        let tag = format.effective_tag();
        if tag != FormatTag::Pcm {
            result.require(position(FACT).is_some(), || {
                format!("{:?} format requires a 'fact' chunk", tag)
            });
        }
        let data_len = child(tree, riff, DATA)
            .and_then(|data| tree.values(data).find_map(Leaf::as_bytes))
            .map(|bytes| bytes.len() as u64);
        if let Some(len) = data_len {
            let align = u64::from(format.block_align);
            result.require(align == 0 || len % align == 0, || {
                format!(
                    "'data' length {} is not a whole number of {}-byte frames",
                    len, align
                )
            });
        }
    }

    let cue_ids: HashSet<u32> = child(tree, riff, CUE)
        .map(|cue| {
            tree.values(cue)
                .filter_map(Leaf::as_cue_point)
                .map(|cue| cue.cue_id)
                .collect()
        })
        .unwrap_or_default();
    if let Some(plst) = child(tree, riff, PLST) {
        for segment in tree.values(plst).filter_map(Leaf::as_playlist_segment) {
            result.require(cue_ids.contains(&segment.cue_id), || {
                format!("playlist segment refers to unknown cue ID {}", segment.cue_id)
            });
        }
    }
    for &list in tree.children(riff) {
        let is_adtl = tree
            .get(list)
            .and_then(Component::as_list)
            .is_some_and(|list| list.type_id() == ADTL);
        if !is_adtl {
            continue;
        }
        for &label in tree.children(list) {
            let Some(cue_id) = tree.values(label).next().and_then(Leaf::as_u32) else {
                continue;
            };
            result.require(cue_ids.contains(&cue_id), || {
                format!("label refers to unknown cue ID {}", cue_id)
            });
        }
    }
    result
}
