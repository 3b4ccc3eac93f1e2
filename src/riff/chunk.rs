// src/riff/chunk.rs

//! The chunk engine: reading, writing and validating one chunk (or list) node
//! and, recursively, everything below it.

use crate::riff::component::{Component, RiffTree, ValidationContext};
use crate::riff::fourcc::FourCC;
use crate::riff::leaf::Leaf;
use crate::riff::list;
use crate::riff::stream::{
    ChunkHeader, ReadSeek, RiffReadExt, RiffWriteExt, WriteSeek, padded,
};
use crate::utils::error::{Result, RiffError};
use crate::utils::tree::NodeId;
use crate::utils::validation::ValidationResult;
use log::{debug, info};
use std::io::SeekFrom;
use std::sync::Arc;

fn node_id(tree: &RiffTree, node: NodeId) -> Result<FourCC> {
    tree.chunk_id(node).ok_or_else(|| {
        RiffError::InvalidOperation("node is not a chunk or list".to_string())
    })
}

/// Reads the chunk at `node`. The caller has already consumed the 4-byte ID
/// and created `node`; the stream is positioned at the length field.
///
/// After the payload is parsed, the stream is reconciled with the declared
/// length: unread payload bytes are skipped, over-reads and payloads cut
/// short by the end of the stream are errors, and an odd length must be
/// followed by a zero pad byte.
pub fn read_chunk(tree: &mut RiffTree, node: NodeId, stream: &mut dyn ReadSeek) -> Result<()> {
    let id = node_id(tree, node)?;
    read_chunk_body(tree, node, id, stream).map_err(|err| RiffError::read_failure(id, err))
}

fn read_chunk_body(
    tree: &mut RiffTree,
    node: NodeId,
    id: FourCC,
    stream: &mut dyn ReadSeek,
) -> Result<()> {
    let declared = stream.read_chunk_size()?;
    let start = stream.stream_position()?;

    #[cfg(feature = "debug-logging")]
    log::trace!(
        "chunk header: id='{}', len={}, offset={}",
        id,
        declared,
        start - crate::riff::stream::CHUNK_HEADER_SIZE
    );

    if let Some(component) = tree.get_mut(node) {
        component.set_declared_size(declared);
    }

    let list_schema = tree
        .get(node)
        .and_then(Component::as_list)
        .map(|list| Arc::clone(list.schema()));
    let missing_slack = match list_schema {
        Some(schema) => list::read_list_body(tree, node, &schema, declared as u64, stream)?,
        None => {
            let procedures = tree
                .get(node)
                .and_then(Component::as_chunk)
                .map(|chunk| Arc::clone(chunk.procedures()))
                .ok_or_else(|| {
                    RiffError::InvalidOperation(format!("'{}' is not a chunk node", id))
                })?;
            match procedures.read() {
                Some(read) => read(tree, node, stream)?,
                None => {
                    let data = Leaf::read_bytes(stream, declared as u64)?;
                    tree.append(node, Component::Value(data))?;
                }
            }
            0
        }
    };

    let consumed = stream.stream_position()?.saturating_sub(start);
    let declared = declared as u64;
    if consumed > declared {
        return Err(RiffError::MalformedStream(format!(
            "payload read consumed {} bytes, chunk declares {}",
            consumed, declared
        )));
    }
    if missing_slack > 0 {
        // The list ran into the end of the stream; there is no pad to read.
        return Ok(());
    }
    if consumed < declared {
        let unread = declared - consumed;
        let left = stream.bytes_left()?;
        if left < unread {
            return Err(RiffError::MalformedStream(format!(
                "chunk is truncated: {} of {} payload bytes present",
                consumed + left,
                declared
            )));
        }
        debug!("skipping {} unread bytes at the end of '{}'", unread, id);
        stream.skip_bytes(unread)?;
    }

    if declared & 1 == 1 {
        stream.read_pad_byte()?;
    }
    Ok(())
}

/// Skips a chunk nobody registered. The ID has been consumed; returns the
/// number of bytes consumed after it.
pub fn skip_unknown_chunk(stream: &mut dyn ReadSeek, id: FourCC) -> Result<u64> {
    let header = ChunkHeader {
        id,
        size: stream.read_chunk_size()?,
    };
    info!("ignoring unknown chunk: id='{}', len={}", header.id, header.size);

    let size = header.size as u64;
    stream.skip_bytes(padded(size))?;
    Ok(4 + padded(size))
}

/// Writes `node` and its subtree. Chunks are placed at their computed
/// offset relative to `origin`, the stream position of the root's header.
pub fn write_component(
    tree: &RiffTree,
    node: NodeId,
    stream: &mut dyn WriteSeek,
    origin: u64,
) -> Result<()> {
    match tree.get(node) {
        Some(Component::Value(leaf)) => leaf.write(stream),
        Some(_) => write_chunk(tree, node, stream, origin),
        None => Err(RiffError::InvalidOperation(
            "cannot write a removed node".to_string(),
        )),
    }
}

pub fn write_chunk(
    tree: &RiffTree,
    node: NodeId,
    stream: &mut dyn WriteSeek,
    origin: u64,
) -> Result<()> {
    let id = node_id(tree, node)?;
    write_chunk_body(tree, node, id, stream, origin)
        .map_err(|err| RiffError::write_failure(id, err))
}

fn write_chunk_body(
    tree: &RiffTree,
    node: NodeId,
    id: FourCC,
    stream: &mut dyn WriteSeek,
    origin: u64,
) -> Result<()> {
    let size = tree.size(node);
    let size = u32::try_from(size).map_err(|_| {
        RiffError::RiffFormat(format!("payload of {} bytes does not fit a chunk", size))
    })?;

    stream.seek(SeekFrom::Start(origin + tree.offset(node)))?;
    stream.write_chunk_header(ChunkHeader { id, size })?;

    match tree.get(node) {
        Some(Component::List(list)) => {
            stream.write_fourcc(list.type_id())?;
            if let Some(write) = list.schema().procedures().write() {
                write(tree, node, stream)?;
            }
        }
        Some(Component::Chunk(chunk)) => {
            if let Some(write) = chunk.procedures().write() {
                write(tree, node, stream)?;
            }
        }
        _ => {}
    }

    for &child in tree.children(node) {
        write_component(tree, child, stream, origin)?;
    }

    if size & 1 == 1 {
        stream.write_pad_byte()?;
    }
    Ok(())
}

/// Validates `node` and its subtree. Reasons reported by children are
/// prefixed with the chunk ID of the node that contains them.
pub fn validate_component(
    tree: &RiffTree,
    node: NodeId,
    context: &ValidationContext,
) -> ValidationResult {
    let mut result = ValidationResult::valid();
    let (id, procedures) = match tree.get(node) {
        Some(Component::Value(leaf)) => return leaf.validate(context),
        Some(Component::Chunk(chunk)) => (chunk.id(), Arc::clone(chunk.procedures())),
        Some(Component::List(list)) => {
            result.require(!list.type_id().is_zero(), || {
                format!("list '{}' has no TypeId", list.id())
            });
            result.require(list.type_id() == list.schema().type_id(), || {
                format!(
                    "list TypeId '{}' does not match expected '{}'",
                    list.type_id(),
                    list.schema().type_id()
                )
            });
            (list.id(), Arc::clone(list.schema().procedures()))
        }
        None => return ValidationResult::invalid("node has been removed"),
    };

    result.require(!id.is_zero(), || "chunk has no ChunkId".to_string());
    if let Some(validate) = procedures.validate() {
        result.merge(validate(tree, node, context));
    }

    let label = id.to_string();
    for &child in tree.children(node) {
        result.merge_with_context(&label, validate_component(tree, child, context));
    }
    result
}
