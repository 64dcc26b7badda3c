use crate::common::*;

/// Errors surfaced by the container layer.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// A container entry does not parse against the record layout or schema.
    #[error("malformed record: {reason}")]
    Malformed { reason: String },
    /// Reading or writing the container failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Build a [`RecordError::Malformed`] wrapped in [`anyhow::Error`], so the
/// kind stays downcastable through added context.
pub(crate) fn malformed(reason: impl Into<String>) -> Error {
    Error::new(RecordError::Malformed {
        reason: reason.into(),
    })
}
