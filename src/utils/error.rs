use std::io;

use thiserror::Error;

use crate::riff::fourcc::FourCC;

/// Main error type for the RIFF codec.
///
/// Structural and stream problems abort the current read or write and surface
/// here. Semantic problems never do; they are reported through
/// [`ValidationResult`](crate::utils::validation::ValidationResult).
#[derive(Error, Debug)]
pub enum RiffError {
    /// An I/O error occurred
    #[error("I/O error: {0}")]
    Io(io::Error),
    /// A fixed-width identifier was built from the wrong number of units
    #[error("Format error: {0}")]
    Format(String),
    /// The chunk structure does not match what the schema expects
    #[error("RIFF format error: {0}")]
    RiffFormat(String),
    /// The byte stream is truncated or carries illegal bytes
    #[error("Malformed stream: {0}")]
    MalformedStream(String),
    /// An invalid operation was attempted on the component tree
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    /// Reading a chunk failed
    #[error("Failed to read chunk '{id}': {source}")]
    ChunkRead {
        id: FourCC,
        #[source]
        source: Box<RiffError>,
    },
    /// Writing a chunk failed
    #[error("Failed to write chunk '{id}': {source}")]
    ChunkWrite {
        id: FourCC,
        #[source]
        source: Box<RiffError>,
    },
}

impl RiffError {
    /// Strips every `ChunkRead`/`ChunkWrite` layer and returns the innermost cause.
    pub fn root_cause(&self) -> &RiffError {
        match self {
            RiffError::ChunkRead { source, .. } | RiffError::ChunkWrite { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }

    /// Returns the chunk IDs this error passed through, outermost first.
    pub fn chunk_path(&self) -> Vec<FourCC> {
        let mut path = Vec::new();
        let mut current = self;
        while let RiffError::ChunkRead { id, source } | RiffError::ChunkWrite { id, source } =
            current
        {
            path.push(*id);
            current = source.as_ref();
        }
        path
    }

    pub(crate) fn read_failure(id: FourCC, err: RiffError) -> Self {
        RiffError::ChunkRead {
            id,
            source: Box::new(err),
        }
    }

    pub(crate) fn write_failure(id: FourCC, err: RiffError) -> Self {
        RiffError::ChunkWrite {
            id,
            source: Box::new(err),
        }
    }
}

impl From<io::Error> for RiffError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            RiffError::MalformedStream(format!("unexpected end of stream: {}", err))
        } else {
            RiffError::Io(err)
        }
    }
}

/// A specialized `Result` type for RIFF codec operations.
pub type Result<T> = std::result::Result<T, RiffError>;
