// src/riff/procedures.rs

//! Per-chunk-kind behaviour and the registries that map chunk IDs to it.
//!
//! A schema is a plain value: a `ListSchema` names a list's ID and type ID and
//! owns the registry of chunk and list kinds that may appear inside it.
//! Registries are built once and shared behind `Arc`, so every chunk read from
//! a stream points at the procedures it was dispatched with.

use crate::riff::component::{RiffTree, ValidationContext};
use crate::riff::fourcc::FourCC;
use crate::riff::stream::{CHUNK_HEADER_SIZE, ReadSeek, RiffReadExt, WriteSeek};
use crate::utils::error::Result;
use crate::utils::tree::NodeId;
use crate::utils::validation::ValidationResult;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Parses a chunk payload into child values of `node`. The stream is
/// positioned just past the chunk header (past the type ID for lists).
pub type ReadProcedure =
    Arc<dyn Fn(&mut RiffTree, NodeId, &mut dyn ReadSeek) -> Result<()> + Send + Sync>;

/// Runs after the header is written and before the children are. Payload
/// bytes belong in child values; a write procedure checks that the node is
/// fit to serialise.
pub type WriteProcedure =
    Arc<dyn Fn(&RiffTree, NodeId, &mut dyn WriteSeek) -> Result<()> + Send + Sync>;

pub type ValidateProcedure =
    Arc<dyn Fn(&RiffTree, NodeId, &ValidationContext) -> ValidationResult + Send + Sync>;

/// The optional read, write and validate hooks of one chunk kind.
#[derive(Clone, Default)]
pub struct ProcedureSet {
    read: Option<ReadProcedure>,
    write: Option<WriteProcedure>,
    validate: Option<ValidateProcedure>,
}

impl ProcedureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read<F>(mut self, read: F) -> Self
    where
        F: Fn(&mut RiffTree, NodeId, &mut dyn ReadSeek) -> Result<()> + Send + Sync + 'static,
    {
        self.read = Some(Arc::new(read));
        self
    }

    pub fn with_write<F>(mut self, write: F) -> Self
    where
        F: Fn(&RiffTree, NodeId, &mut dyn WriteSeek) -> Result<()> + Send + Sync + 'static,
    {
        self.write = Some(Arc::new(write));
        self
    }

    pub fn with_validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(&RiffTree, NodeId, &ValidationContext) -> ValidationResult + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(validate));
        self
    }

    #[inline]
    pub fn read(&self) -> Option<&ReadProcedure> {
        self.read.as_ref()
    }

    #[inline]
    pub fn write(&self) -> Option<&WriteProcedure> {
        self.write.as_ref()
    }

    #[inline]
    pub fn validate(&self) -> Option<&ValidateProcedure> {
        self.validate.as_ref()
    }
}

impl fmt::Debug for ProcedureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcedureSet")
            .field("read", &self.read.is_some())
            .field("write", &self.write.is_some())
            .field("validate", &self.validate.is_some())
            .finish()
    }
}

/// Describes one kind of list chunk: its ID, its type ID, its own hooks and
/// the kinds of chunk it may contain.
#[derive(Debug, Clone)]
pub struct ListSchema {
    id: FourCC,
    type_id: FourCC,
    procedures: Arc<ProcedureSet>,
    children: ChunkRegistry,
}

impl ListSchema {
    pub fn new(id: FourCC, type_id: FourCC) -> Self {
        ListSchema {
            id,
            type_id,
            procedures: Arc::new(ProcedureSet::new()),
            children: ChunkRegistry::new(),
        }
    }

    pub fn with_procedures(mut self, procedures: ProcedureSet) -> Self {
        self.procedures = Arc::new(procedures);
        self
    }

    pub fn with_chunk(mut self, id: FourCC, procedures: ProcedureSet) -> Self {
        self.children.register_chunk(id, procedures);
        self
    }

    pub fn with_list(mut self, schema: ListSchema) -> Self {
        self.children.register_list(schema);
        self
    }

    #[inline]
    pub fn id(&self) -> FourCC {
        self.id
    }

    #[inline]
    pub fn type_id(&self) -> FourCC {
        self.type_id
    }

    #[inline]
    pub fn procedures(&self) -> &Arc<ProcedureSet> {
        &self.procedures
    }

    #[inline]
    pub fn children(&self) -> &ChunkRegistry {
        &self.children
    }

    #[inline]
    pub fn children_mut(&mut self) -> &mut ChunkRegistry {
        &mut self.children
    }
}

/// What a chunk ID found in a list resolves to.
#[derive(Debug, Clone)]
pub enum Dispatch {
    Chunk(Arc<ProcedureSet>),
    List(Arc<ListSchema>),
    /// Not registered in this list; the chunk is skipped.
    Unknown,
}

/// The chunk and list kinds registered for one list.
#[derive(Debug, Clone, Default)]
pub struct ChunkRegistry {
    chunks: HashMap<FourCC, Arc<ProcedureSet>>,
    lists: HashMap<(FourCC, FourCC), Arc<ListSchema>>,
}

impl ChunkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plain chunk kind, replacing any earlier registration.
    pub fn register_chunk(&mut self, id: FourCC, procedures: ProcedureSet) {
        self.chunks.insert(id, Arc::new(procedures));
    }

    /// Registers a list kind under its (ID, type ID) pair.
    pub fn register_list(&mut self, schema: ListSchema) {
        self.lists
            .insert((schema.id(), schema.type_id()), Arc::new(schema));
    }

    pub fn chunk(&self, id: FourCC) -> Option<&Arc<ProcedureSet>> {
        self.chunks.get(&id)
    }

    pub fn list(&self, id: FourCC, type_id: FourCC) -> Option<&Arc<ListSchema>> {
        self.lists.get(&(id, type_id))
    }

    /// True if some registered list kind uses `id` as its chunk ID.
    pub fn has_list_id(&self, id: FourCC) -> bool {
        self.lists.keys().any(|(list_id, _)| *list_id == id)
    }

    pub fn len(&self) -> usize {
        self.chunks.len() + self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty() && self.lists.is_empty()
    }

    /// Resolves the chunk whose ID is `id` and whose header starts at the
    /// current stream position. List kinds take precedence: when `id` names a
    /// registered list, the type ID 8 bytes ahead is peeked to pick the schema.
    /// The stream position is left unchanged.
    pub fn resolve(&self, stream: &mut dyn ReadSeek, id: FourCC) -> Result<Dispatch> {
        if self.has_list_id(id) {
            let type_id = stream.peek_fourcc_at(CHUNK_HEADER_SIZE)?;
            if let Some(schema) = self.list(id, type_id) {
                return Ok(Dispatch::List(Arc::clone(schema)));
            }
        }
        Ok(match self.chunk(id) {
            Some(procedures) => Dispatch::Chunk(Arc::clone(procedures)),
            None => Dispatch::Unknown,
        })
    }
}
