//! Snapnote storage crate - durable JSON-file persistence for notes.

pub mod store;

pub use store::{NoteStore, FORMAT_VERSION};
