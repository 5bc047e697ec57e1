//! Type-Safe Wrappers Module
//!
//! - `file_size`: byte counts with binary-prefix constructors

pub mod file_size;

pub use file_size::FileSize;
