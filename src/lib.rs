//! # RIFF Codec Library
//!
//! Reading, editing, validating and writing RIFF chunk containers, with a
//! registry-driven chunk engine and WAVE format descriptors built on it.
//!
//! This library is organized into several modules:
//! - `utils`: Error handling, validation results and the arena tree
//! - `riff`: FourCC codes, stream helpers, the component model and the chunk and list engines
//! - `wave`: The `RIFF:WAVE` schema, format records, cue and playlist records

// Re-export commonly used types at the crate root
pub use utils::error::{Result, RiffError};

pub mod utils {
    pub mod error;
    pub mod tree;
    pub mod validation;
}

pub mod riff {
    pub mod chunk;
    pub mod component;
    pub mod document;
    pub mod fourcc;
    pub mod leaf;
    pub(crate) mod list;
    pub mod procedures;
    pub mod stream;
}

pub mod wave {
    pub mod cue;
    pub mod file;
    pub mod format;
    pub mod guid;
    pub mod schema;
}

pub use riff::component::{Component, ListChunk, RiffChunk, RiffTree, ValidationContext};
pub use riff::document::RiffDocument;
pub use riff::fourcc::FourCC;
pub use riff::leaf::{Leaf, LeafKind};
pub use riff::procedures::{ChunkRegistry, Dispatch, ListSchema, ProcedureSet};
pub use utils::tree::{Direction, NodeId, Tree};
pub use utils::validation::{ValidationResult, Validity};
pub use wave::cue::{CuePoint, PlaylistSegment};
pub use wave::file::WaveFile;
pub use wave::format::{FormatTag, WaveFormat, WaveFormatExtension};
pub use wave::guid::{Guid, SubFormatRegistry};
