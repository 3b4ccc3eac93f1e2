// src/riff/list.rs

//! The list engine: parsing the body of a `RIFF` or `LIST` chunk.

use crate::riff::chunk::{read_chunk, skip_unknown_chunk};
use crate::riff::component::{Component, ListChunk, RiffChunk, RiffTree};
use crate::riff::procedures::{Dispatch, ListSchema};
use crate::riff::stream::{CHUNK_HEADER_SIZE, ReadSeek, RiffReadExt};
use crate::utils::error::{Result, RiffError};
use crate::utils::tree::NodeId;
use log::{debug, warn};

/// Reads the type ID and children of the list at `node`. The stream is
/// positioned just past the length field; `declared` is that length.
///
/// Children are read while the declared length has room left and the stream
/// holds at least two more bytes. Each child, known or not, is charged its
/// full footprint (header, payload and pad byte) against the declared length.
///
/// A tail too short to hold a chunk header is slack: whatever part of it the
/// stream holds is consumed, and the number of slack bytes missing from the
/// stream is returned. A longer tail missing from the stream is an error.
pub(crate) fn read_list_body(
    tree: &mut RiffTree,
    node: NodeId,
    schema: &ListSchema,
    declared: u64,
    stream: &mut dyn ReadSeek,
) -> Result<u64> {
    let start = stream.stream_position()?;
    if declared < 4 {
        return Err(RiffError::RiffFormat(format!(
            "list '{}' of {} bytes is too short for a type ID",
            schema.id(),
            declared
        )));
    }

    let type_id = stream.read_fourcc()?;
    if let Some(Component::List(list)) = tree.get_mut(node) {
        list.set_type_id(type_id);
    }
    if type_id != schema.type_id() {
        return Err(RiffError::RiffFormat(format!(
            "expected list type '{}', found '{}'",
            schema.type_id(),
            type_id
        )));
    }

    if let Some(read) = schema.procedures().read() {
        read(tree, node, stream)?;
    }

    if schema.children().is_empty() {
        return Err(RiffError::RiffFormat(format!(
            "list '{}:{}' has no registered chunk kinds",
            schema.id(),
            schema.type_id()
        )));
    }

    let consumed = stream.stream_position()?.saturating_sub(start);
    let mut remaining = declared.checked_sub(consumed).ok_or_else(|| {
        RiffError::MalformedStream(format!(
            "list header consumed {} bytes, list declares {}",
            consumed, declared
        ))
    })?;

    while remaining > 0 && stream.bytes_left()? >= 2 {
        let child_start = stream.stream_position()?;
        let id = stream.peek_fourcc()?;

        match schema.children().resolve(stream, id)? {
            Dispatch::Unknown => {
                stream.read_fourcc()?;
                skip_unknown_chunk(stream, id)?;
            }
            Dispatch::Chunk(procedures) => {
                stream.read_fourcc()?;
                let child = tree.append(node, Component::Chunk(RiffChunk::new(id, procedures)))?;
                read_chunk(tree, child, stream)?;
            }
            Dispatch::List(child_schema) => {
                stream.read_fourcc()?;
                let child = tree.append(node, Component::List(ListChunk::new(child_schema)))?;
                read_chunk(tree, child, stream)?;
            }
        }

        let footprint = stream.stream_position()?.saturating_sub(child_start);
        if footprint > remaining {
            return Err(RiffError::MalformedStream(format!(
                "chunk '{}' overruns its list by {} bytes",
                id,
                footprint - remaining
            )));
        }
        remaining -= footprint;
    }

    if remaining == 0 {
        return Ok(0);
    }
    let present = remaining.min(stream.bytes_left()?);
    if remaining >= CHUNK_HEADER_SIZE && present < remaining {
        return Err(RiffError::MalformedStream(format!(
            "list '{}:{}' is truncated: {} of its last {} bytes present",
            schema.id(),
            type_id,
            present,
            remaining
        )));
    }
    stream.skip_bytes(present)?;
    if present < remaining {
        warn!(
            "list '{}:{}' ends {} bytes short of its declared length",
            schema.id(),
            type_id,
            remaining - present
        );
    } else {
        debug!("list '{}:{}' ends with {} bytes of slack", schema.id(), type_id, remaining);
    }
    Ok(remaining - present)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::riff::fourcc::FourCC;
    use crate::riff::leaf::Leaf;
    use crate::riff::procedures::ProcedureSet;
    use std::io::Cursor;
    use std::sync::Arc;

    fn id(s: &str) -> FourCC {
        s.parse().unwrap()
    }

    fn read_root(schema: ListSchema, bytes: &[u8]) -> Result<(RiffTree, NodeId, u64)> {
        let schema = Arc::new(schema);
        let mut tree = RiffTree::new();
        let root = tree.insert(Component::List(ListChunk::new(schema)));
        let mut cursor = Cursor::new(bytes.to_vec());
        cursor.read_fourcc()?;
        read_chunk(&mut tree, root, &mut cursor)?;
        Ok((tree, root, cursor.position()))
    }

    #[test]
    fn test_type_mismatch() {
        let schema = ListSchema::new(FourCC::RIFF, id("WAVE"))
            .with_chunk(id("data"), ProcedureSet::new());
        let err = read_root(schema, b"RIFF\x04\x00\x00\x00AVI ").unwrap_err();
        assert!(matches!(err.root_cause(), RiffError::RiffFormat(_)));
        assert_eq!(err.chunk_path(), vec![FourCC::RIFF]);
    }

    #[test]
    fn test_empty_registry_is_rejected() {
        let schema = ListSchema::new(FourCC::RIFF, id("TEST"));
        let err = read_root(schema, b"RIFF\x04\x00\x00\x00TEST").unwrap_err();
        assert!(err.to_string().contains("no registered chunk kinds"));
    }

    #[test]
    fn test_nested_list_accounting() {
        // RIFF:TEST { LIST:INNR { abcd(2) } efgh(1) + pad } followed by bytes outside the root.
        let inner = ListSchema::new(FourCC::LIST, id("INNR"))
            .with_chunk(id("abcd"), ProcedureSet::new());
        let schema = ListSchema::new(FourCC::RIFF, id("TEST"))
            .with_chunk(id("efgh"), ProcedureSet::new())
            .with_list(inner);

        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF\x24\x00\x00\x00TEST");
        bytes.extend_from_slice(b"LIST\x0e\x00\x00\x00INNR");
        bytes.extend_from_slice(b"abcd\x02\x00\x00\x00hi");
        bytes.extend_from_slice(b"efgh\x01\x00\x00\x00!\x00");
        bytes.extend_from_slice(b"efgh\x02\x00\x00\x00no");

        let (tree, root, position) = read_root(schema, &bytes).unwrap();
        assert_eq!(position, 44);
        let children: Vec<_> = tree.children(root).to_vec();
        assert_eq!(children.len(), 2);
        assert_eq!(tree.chunk_id(children[0]), Some(FourCC::LIST));
        assert_eq!(tree.chunk_id(children[1]), Some(id("efgh")));
        assert_eq!(tree.size(root), 0x24);

        let inner_chunk = tree.children(children[0])[0];
        assert_eq!(
            tree.values(inner_chunk).next(),
            Some(&Leaf::Bytes(b"hi".to_vec()))
        );
    }

    #[test]
    fn test_unknown_chunks_are_skipped() {
        let schema =
            ListSchema::new(FourCC::RIFF, id("TEST")).with_chunk(id("keep"), ProcedureSet::new());
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF\x1a\x00\x00\x00TEST");
        bytes.extend_from_slice(b"junk\x03\x00\x00\x00xyz\x00");
        bytes.extend_from_slice(b"keep\x02\x00\x00\x00ok");

        let (tree, root, position) = read_root(schema, &bytes).unwrap();
        assert_eq!(position, bytes.len() as u64);
        assert_eq!(tree.children(root).len(), 1);
        assert_eq!(tree.chunk_id(tree.children(root)[0]), Some(id("keep")));
    }

    #[test]
    fn test_truncated_list_is_malformed() {
        let schema =
            ListSchema::new(FourCC::RIFF, id("TEST")).with_chunk(id("keep"), ProcedureSet::new());
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF\x20\x00\x00\x00TEST");
        bytes.extend_from_slice(b"keep\x02\x00\x00\x00ok");
        let err = read_root(schema, &bytes).unwrap_err();
        assert_eq!(err.chunk_path(), vec![FourCC::RIFF]);
        assert!(matches!(err.root_cause(), RiffError::MalformedStream(_)));
    }

    #[test]
    fn test_short_tail_is_slack() {
        let schema =
            ListSchema::new(FourCC::RIFF, id("TEST")).with_chunk(id("keep"), ProcedureSet::new());
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF\x14\x00\x00\x00TEST");
        bytes.extend_from_slice(b"keep\x02\x00\x00\x00ok");
        bytes.push(0);

        let (tree, root, position) = read_root(schema, &bytes).unwrap();
        assert_eq!(position, bytes.len() as u64);
        assert_eq!(tree.children(root).len(), 1);
        assert_eq!(tree.declared_size(root), Some(0x14));
        assert_eq!(tree.size(root), 0x0e);
    }

    #[test]
    fn test_child_overrunning_list_is_malformed() {
        let schema =
            ListSchema::new(FourCC::RIFF, id("TEST")).with_chunk(id("keep"), ProcedureSet::new());
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF\x08\x00\x00\x00TEST");
        bytes.extend_from_slice(b"keep\x02\x00\x00\x00ok");
        let err = read_root(schema, &bytes).unwrap_err();
        assert!(matches!(err.root_cause(), RiffError::MalformedStream(_)));
    }
}
