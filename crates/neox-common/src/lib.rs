//! Common utilities for NeoX tooling.
//!
//! This crate provides the building blocks shared by the archive and mesh crates:
//!
//! - [`BinaryReader`] - Bounds-checked little-endian reading from byte slices
//! - [`crc`] - CRC-32 checksums as stored in NPK index rows
//! - [`search`] - memchr-backed byte and pattern search

mod error;
mod reader;

pub mod crc;
pub mod search;

pub use error::{Error, Result};
pub use reader::BinaryReader;
