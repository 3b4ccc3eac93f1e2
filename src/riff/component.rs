// src/riff/component.rs

//! The node types of a RIFF document tree and the size and offset arithmetic
//! over them.
//!
//! Every node is a `Component`: a chunk, a list, or a leaf value. Chunks and
//! lists carry an 8-byte header and are padded to an even length inside their
//! parent; leaf values are packed with no header and no padding. Sizes and
//! offsets are always computed from the tree, never cached.

use crate::riff::fourcc::FourCC;
use crate::riff::leaf::Leaf;
use crate::riff::procedures::{ListSchema, ProcedureSet};
use crate::riff::stream::{CHUNK_HEADER_SIZE, padded};
use crate::utils::tree::{NodeId, Tree};
use crate::wave::guid::SubFormatRegistry;
use std::sync::Arc;

/// A document tree of RIFF components.
pub type RiffTree = Tree<Component>;

/// Read-only inputs to validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    /// Sub-formats accepted for extensible WAVE formats.
    pub sub_formats: SubFormatRegistry,
}

/// A chunk whose payload is its child values.
#[derive(Debug, Clone)]
pub struct RiffChunk {
    id: FourCC,
    procedures: Arc<ProcedureSet>,
    declared_size: Option<u32>,
}

impl RiffChunk {
    pub fn new(id: FourCC, procedures: Arc<ProcedureSet>) -> Self {
        RiffChunk {
            id,
            procedures,
            declared_size: None,
        }
    }

    /// A chunk with no procedures; its payload is kept as raw bytes.
    pub fn bare(id: FourCC) -> Self {
        Self::new(id, Arc::new(ProcedureSet::new()))
    }

    #[inline]
    pub fn id(&self) -> FourCC {
        self.id
    }

    #[inline]
    pub fn procedures(&self) -> &Arc<ProcedureSet> {
        &self.procedures
    }

    /// The length field found in the stream, if the chunk was read.
    #[inline]
    pub fn declared_size(&self) -> Option<u32> {
        self.declared_size
    }
}

/// A `RIFF` or `LIST` chunk: a type ID followed by child chunks.
#[derive(Debug, Clone)]
pub struct ListChunk {
    schema: Arc<ListSchema>,
    type_id: FourCC,
    declared_size: Option<u32>,
}

impl ListChunk {
    pub fn new(schema: Arc<ListSchema>) -> Self {
        let type_id = schema.type_id();
        ListChunk {
            schema,
            type_id,
            declared_size: None,
        }
    }

    #[inline]
    pub fn id(&self) -> FourCC {
        self.schema.id()
    }

    /// The type ID this list carries. Matches the schema's unless it was
    /// changed after construction.
    #[inline]
    pub fn type_id(&self) -> FourCC {
        self.type_id
    }

    pub fn set_type_id(&mut self, type_id: FourCC) {
        self.type_id = type_id;
    }

    #[inline]
    pub fn schema(&self) -> &Arc<ListSchema> {
        &self.schema
    }

    #[inline]
    pub fn declared_size(&self) -> Option<u32> {
        self.declared_size
    }
}

#[derive(Debug, Clone)]
pub enum Component {
    Chunk(RiffChunk),
    List(ListChunk),
    Value(Leaf),
}

impl Component {
    /// Chunk ID, or `None` for leaf values.
    pub fn id(&self) -> Option<FourCC> {
        match self {
            Component::Chunk(chunk) => Some(chunk.id()),
            Component::List(list) => Some(list.id()),
            Component::Value(_) => None,
        }
    }

    #[inline]
    pub fn header_size(&self) -> u64 {
        match self {
            Component::Value(_) => 0,
            _ => CHUNK_HEADER_SIZE,
        }
    }

    pub fn declared_size(&self) -> Option<u32> {
        match self {
            Component::Chunk(chunk) => chunk.declared_size(),
            Component::List(list) => list.declared_size(),
            Component::Value(_) => None,
        }
    }

    pub(crate) fn set_declared_size(&mut self, size: u32) {
        match self {
            Component::Chunk(chunk) => chunk.declared_size = Some(size),
            Component::List(list) => list.declared_size = Some(size),
            Component::Value(_) => {}
        }
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            Component::Value(leaf) => Some(leaf),
            _ => None,
        }
    }

    pub fn as_leaf_mut(&mut self) -> Option<&mut Leaf> {
        match self {
            Component::Value(leaf) => Some(leaf),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListChunk> {
        match self {
            Component::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_chunk(&self) -> Option<&RiffChunk> {
        match self {
            Component::Chunk(chunk) => Some(chunk),
            _ => None,
        }
    }
}

impl Tree<Component> {
    /// Payload length of `node`: the encoded length of a leaf, the sum of
    /// the children's footprints for a chunk, plus the type ID for a list.
    /// This is the value written in the chunk's length field.
    pub fn size(&self, node: NodeId) -> u64 {
        let children = || {
            self.children(node)
                .iter()
                .map(|&child| self.actual_size(child))
                .sum::<u64>()
        };
        match self.get(node) {
            Some(Component::Value(leaf)) => leaf.size(),
            Some(Component::Chunk(_)) => children(),
            Some(Component::List(_)) => 4 + children(),
            None => 0,
        }
    }

    /// Bytes `node` occupies inside its parent, header and pad byte included.
    pub fn actual_size(&self, node: NodeId) -> u64 {
        match self.get(node) {
            Some(Component::Value(leaf)) => leaf.size(),
            Some(_) => CHUNK_HEADER_SIZE + padded(self.size(node)),
            None => 0,
        }
    }

    /// Header length of `node`: 8 for chunks and lists, 0 for leaf values.
    pub fn header_size(&self, node: NodeId) -> u64 {
        self.get(node).map_or(0, Component::header_size)
    }

    /// Position of the first byte of `node` (its header, for chunks) relative
    /// to the start of the root.
    pub fn offset(&self, node: NodeId) -> u64 {
        let Some(parent) = self.parent(node) else {
            return 0;
        };
        let preceding: u64 = self
            .children(parent)
            .iter()
            .take_while(|&&sibling| sibling != node)
            .map(|&sibling| self.actual_size(sibling))
            .sum();
        self.data_offset(parent) + preceding
    }

    /// Position where the first child of `node` starts: past the header and,
    /// for lists, past the type ID.
    pub fn data_offset(&self, node: NodeId) -> u64 {
        let type_id = match self.get(node) {
            Some(Component::List(_)) => 4,
            _ => 0,
        };
        self.offset(node) + self.header_size(node) + type_id
    }

    pub fn chunk_id(&self, node: NodeId) -> Option<FourCC> {
        self.get(node).and_then(Component::id)
    }

    pub fn declared_size(&self, node: NodeId) -> Option<u32> {
        self.get(node).and_then(Component::declared_size)
    }

    pub fn leaf(&self, node: NodeId) -> Option<&Leaf> {
        self.get(node).and_then(Component::as_leaf)
    }

    /// The leaf values directly under `node`, in order.
    pub fn values(&self, node: NodeId) -> impl Iterator<Item = &Leaf> + '_ {
        self.children(node)
            .iter()
            .filter_map(move |&child| self.leaf(child))
    }
}
