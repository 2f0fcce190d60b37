//! Error types for the graph store core.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Scan failed on batch {batch}: {source}")]
    Scan {
        batch: usize,
        #[source]
        source: Box<GraphError>,
    },

    #[error("Result stream is closed")]
    Closed,

    #[error("Scan cancelled")]
    Cancelled,

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),
}

impl GraphError {
    /// Wrap an error with the index of the batch whose scan failed.
    pub fn in_batch(self, batch: usize) -> Self {
        GraphError::Scan {
            batch,
            source: Box::new(self),
        }
    }
}
