// src/riff/document.rs

//! An in-memory RIFF document: a tree of components rooted at a `RIFF`
//! list, which can be loaded from a stream, edited and saved back.

use crate::riff::chunk;
use crate::riff::component::{Component, ListChunk, RiffChunk, RiffTree, ValidationContext};
use crate::riff::fourcc::FourCC;
use crate::riff::leaf::Leaf;
use crate::riff::procedures::ListSchema;
use crate::riff::stream::RiffReadExt;
use crate::utils::error::{Result, RiffError};
use crate::utils::tree::{Direction, NodeId};
use crate::utils::validation::ValidationResult;
use log::debug;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RiffDocument {
    tree: RiffTree,
    root: NodeId,
}

impl RiffDocument {
    /// Creates an empty document whose root list follows `schema`.
    pub fn new(schema: impl Into<Arc<ListSchema>>) -> Self {
        let mut tree = RiffTree::new();
        let root = tree.insert(Component::List(ListChunk::new(schema.into())));
        RiffDocument { tree, root }
    }

    /// Parses a document from the current position of `reader`.
    pub fn from_reader<R: Read + Seek>(
        mut reader: R,
        schema: impl Into<Arc<ListSchema>>,
    ) -> Result<Self> {
        let schema = schema.into();
        let id = reader.read_fourcc()?;
        if id != schema.id() {
            return Err(RiffError::RiffFormat(format!(
                "expected root chunk '{}', found '{}'",
                schema.id(),
                id
            )));
        }

        let mut document = RiffDocument::new(schema);
        chunk::read_chunk(&mut document.tree, document.root, &mut reader)?;
        debug!(
            "read '{}' document with {} nodes",
            document.root_type_id(),
            document.tree.len()
        );
        Ok(document)
    }

    pub fn from_bytes(bytes: &[u8], schema: impl Into<Arc<ListSchema>>) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes), schema)
    }

    /// Writes the document starting at the current position of `writer`,
    /// leaving the writer just past the last byte written.
    pub fn write<W: Write + Seek>(&self, mut writer: W) -> Result<()> {
        let origin = writer.stream_position()?;
        chunk::write_chunk(&self.tree, self.root, &mut writer, origin)?;
        writer.seek(SeekFrom::Start(origin + self.size()))?;
        writer.flush()?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(self.size() as usize));
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    pub fn validate(&self, context: &ValidationContext) -> ValidationResult {
        chunk::validate_component(&self.tree, self.root, context)
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn tree(&self) -> &RiffTree {
        &self.tree
    }

    /// Mutable access to the tree. Removing the root through it leaves the
    /// document unusable.
    #[inline]
    pub fn tree_mut(&mut self) -> &mut RiffTree {
        &mut self.tree
    }

    /// Total encoded length, root header included.
    pub fn size(&self) -> u64 {
        self.tree.actual_size(self.root)
    }

    pub fn root_type_id(&self) -> FourCC {
        self.tree
            .get(self.root)
            .and_then(Component::as_list)
            .map_or(FourCC::ZERO, ListChunk::type_id)
    }

    fn list_schema(&self, parent: NodeId) -> Result<Arc<ListSchema>> {
        self.tree
            .get(parent)
            .and_then(Component::as_list)
            .map(|list| Arc::clone(list.schema()))
            .ok_or_else(|| {
                RiffError::InvalidOperation("chunks can only be added to a list".to_string())
            })
    }

    /// Appends a chunk to the list `parent`, using the procedures registered
    /// for `id` in that list, or none if `id` is not registered.
    pub fn append_chunk(&mut self, parent: NodeId, id: FourCC) -> Result<NodeId> {
        let schema = self.list_schema(parent)?;
        let chunk = match schema.children().chunk(id) {
            Some(procedures) => RiffChunk::new(id, Arc::clone(procedures)),
            None => RiffChunk::bare(id),
        };
        self.tree.append(parent, Component::Chunk(chunk))
    }

    /// Appends a list registered as (`id`, `type_id`) in the list `parent`.
    pub fn append_list(&mut self, parent: NodeId, id: FourCC, type_id: FourCC) -> Result<NodeId> {
        let schema = self.list_schema(parent)?;
        let child = schema.children().list(id, type_id).ok_or_else(|| {
            RiffError::RiffFormat(format!(
                "list '{}:{}' is not registered under '{}'",
                id,
                type_id,
                schema.type_id()
            ))
        })?;
        let list = ListChunk::new(Arc::clone(child));
        self.tree.append(parent, Component::List(list))
    }

    /// Appends a leaf value to the chunk `parent`.
    pub fn append_value(&mut self, parent: NodeId, value: Leaf) -> Result<NodeId> {
        match self.tree.get(parent) {
            Some(Component::Chunk(_)) | Some(Component::List(_)) => {
                self.tree.append(parent, Component::Value(value))
            }
            Some(Component::Value(_)) => Err(RiffError::InvalidOperation(
                "values cannot contain other values".to_string(),
            )),
            None => Err(RiffError::InvalidOperation(
                "parent node has been removed".to_string(),
            )),
        }
    }

    /// Detaches and drops `node` with its subtree. The root cannot be removed.
    pub fn remove(&mut self, node: NodeId) -> Result<Component> {
        if node == self.root {
            return Err(RiffError::InvalidOperation(
                "cannot remove the document root".to_string(),
            ));
        }
        self.tree.remove(node)
    }

    /// Removes `node` if it lies below the root; returns whether it did.
    pub fn remove_chunk(&mut self, node: NodeId) -> bool {
        node != self.root && self.tree.deep_remove(self.root, node)
    }

    /// First chunk or list with `id`, in depth-first order.
    pub fn find(&self, id: FourCC) -> Option<NodeId> {
        self.tree
            .depth_first(self.root, Direction::TopDown)
            .find(|&node| self.tree.chunk_id(node) == Some(id))
    }

    pub fn find_all(&self, id: FourCC) -> Vec<NodeId> {
        self.tree
            .depth_first(self.root, Direction::TopDown)
            .filter(|&node| self.tree.chunk_id(node) == Some(id))
            .collect()
    }

    /// First list with the given type ID, in depth-first order.
    pub fn find_list(&self, type_id: FourCC) -> Option<NodeId> {
        self.tree
            .depth_first(self.root, Direction::TopDown)
            .find(|&node| {
                self.tree
                    .get(node)
                    .and_then(Component::as_list)
                    .is_some_and(|list| list.type_id() == type_id)
            })
    }

    /// First direct child of `parent` with chunk ID `id`.
    pub fn child(&self, parent: NodeId, id: FourCC) -> Option<NodeId> {
        self.tree
            .children(parent)
            .iter()
            .copied()
            .find(|&child| self.tree.chunk_id(child) == Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::riff::procedures::ProcedureSet;

    fn id(s: &str) -> FourCC {
        s.parse().unwrap()
    }

    fn schema() -> ListSchema {
        ListSchema::new(FourCC::RIFF, id("TEST"))
            .with_chunk(id("abcd"), ProcedureSet::new())
            .with_list(
                ListSchema::new(FourCC::LIST, id("INNR"))
                    .with_chunk(id("efgh"), ProcedureSet::new()),
            )
    }

    #[test]
    fn test_build_write_read() {
        let mut doc = RiffDocument::new(schema());
        let root = doc.root();
        let chunk = doc.append_chunk(root, id("abcd")).unwrap();
        doc.append_value(chunk, Leaf::Bytes(vec![1, 2, 3])).unwrap();
        let inner = doc.append_list(root, FourCC::LIST, id("INNR")).unwrap();
        let leaf_chunk = doc.append_chunk(inner, id("efgh")).unwrap();
        doc.append_value(leaf_chunk, Leaf::Bytes(vec![9; 4])).unwrap();

        let bytes = doc.to_bytes().unwrap();
        assert_eq!(bytes.len() as u64, doc.size());
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"TEST");
        // abcd has an odd payload, so a pad byte precedes the LIST.
        assert_eq!(bytes[23], 0);
        assert_eq!(&bytes[24..28], b"LIST");

        let parsed = RiffDocument::from_bytes(&bytes, schema()).unwrap();
        assert_eq!(parsed.to_bytes().unwrap(), bytes);
        assert_eq!(parsed.find_all(id("efgh")).len(), 1);
        assert!(parsed.find_list(id("INNR")).is_some());
        assert!(parsed.validate(&ValidationContext::default()).is_valid());
    }

    #[test]
    fn test_wrong_root_id() {
        let err = RiffDocument::from_bytes(b"RIFX\x04\x00\x00\x00TEST", schema()).unwrap_err();
        assert!(matches!(err, RiffError::RiffFormat(_)));
    }

    #[test]
    fn test_structural_edits() {
        let mut doc = RiffDocument::new(schema());
        let root = doc.root();
        assert!(doc.append_list(root, FourCC::LIST, id("nope")).is_err());
        let chunk = doc.append_chunk(root, id("abcd")).unwrap();
        let value = doc.append_value(chunk, Leaf::U8(1)).unwrap();
        assert!(doc.append_value(value, Leaf::U8(2)).is_err());
        assert!(doc.append_chunk(chunk, id("abcd")).is_err());

        assert!(doc.remove(root).is_err());
        assert_eq!(doc.child(root, id("abcd")), Some(chunk));
        assert!(doc.remove_chunk(chunk));
        assert!(!doc.remove_chunk(chunk));
        assert_eq!(doc.find(id("abcd")), None);
        assert_eq!(doc.size(), 12);
    }

    #[test]
    fn test_write_at_offset() {
        let mut doc = RiffDocument::new(schema());
        let root = doc.root();
        let chunk = doc.append_chunk(root, id("abcd")).unwrap();
        doc.append_value(chunk, Leaf::U16(0xBEEF)).unwrap();

        let mut cursor = Cursor::new(vec![0xAA; 3]);
        cursor.seek(SeekFrom::End(0)).unwrap();
        doc.write(&mut cursor).unwrap();
        assert_eq!(cursor.position(), 3 + doc.size());
        let bytes = cursor.into_inner();
        assert_eq!(&bytes[3..7], b"RIFF");
        assert_eq!(&bytes[23..25], &[0xEF, 0xBE]);
    }
}
