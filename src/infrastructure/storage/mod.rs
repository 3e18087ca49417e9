//! Storage infrastructure - File-backed persistence

mod cell;
pub mod fs;
mod json_file;

pub use cell::DocumentCell;
pub use fs::{atomic_write, sha256_hex};
pub use json_file::JsonFileStore;
