//! Page type and typed accessors.
//!
//! This module contains [`Page`], the raw fixed-size data container that
//! node codecs read and write through bounds-checked primitives.

#[allow(clippy::module_inception)]
mod page;

pub use page::Page;
