//! Standard library entities available to every Quill program

pub mod builtins;

pub use builtins::{BuiltinEntry, BuiltinKind, BuiltinRegistry};
