//! Append-only binary containers of detection examples.
//!
//! A container is a flat sequence of records. Each record is independently
//! parseable: a length and checksum frame around a self-describing payload
//! of named, kind-tagged feature lists. The fixed example schema lives in
//! [`ImageExample`]; the untyped field map is [`RawExample`].

mod common;
mod error;
mod example;
mod feature;
mod reader;
mod wire;
mod writer;

pub use error::*;
pub use example::*;
pub use feature::*;
pub use reader::*;
pub use wire::*;
pub use writer::*;
