use crate::common::*;
use std::io;

/// Errors surfaced by the dataset pipeline.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// A caller-supplied parameter was rejected before any I/O took place.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// A source image could not be read while building a container. Fatal to
    /// the whole write; the partial container is discarded.
    #[error("failed to read image '{}'", .path.display())]
    ImageRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// An image group holds more objects than the configured box capacity.
    /// Deliberately fatal: truncating boxes would corrupt supervision.
    #[error("{count} objects exceed the box capacity of {max_boxes}")]
    BoxOverflow { count: usize, max_boxes: usize },
}
