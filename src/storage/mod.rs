//! Storage layer - disk I/O and file formats.
//!
//! This module handles persistent storage:
//! - [`DiskManager`] - Low-level file I/O for the metadata header and pages
//! - [`TreeMetadata`] - The metadata header codec
//! - [`page`] - The page container

mod disk_manager;
mod metadata;
pub mod page;

pub use disk_manager::DiskManager;
pub use metadata::TreeMetadata;
