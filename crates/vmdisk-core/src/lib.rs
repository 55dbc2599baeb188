//! vmdisk core library
//!
//! This crate opens, creates, and exposes the logical contents of VMDK
//! (VMware Virtual Machine Disk) images as sparse-aware byte streams.
//!
//! # Modules
//!
//! - `error` - Error types and Result alias
//! - `sector` - Sector math and little-endian codecs
//! - `stream` - Sparse stream trait and composition utilities
//! - `locator` - Extent file name resolution
//! - `geometry` - CHS geometry
//! - `descriptor` - Textual descriptor parsing and serialization
//! - `sparse` - Sparse extent headers, layout math, and read adapters
//! - `extent` - Per-extent initialization and opening
//! - `disk` - The top-level `DiskImageFile`

pub mod descriptor;
pub mod disk;
pub mod error;
pub mod extent;
pub mod geometry;
pub mod locator;
pub mod sector;
pub mod sparse;
pub mod stream;

pub use descriptor::{
    CreateType, DescriptorFile, ExtentAccess, ExtentDescriptor, ExtentType, NO_PARENT,
};
pub use disk::{adorn_file_name, DiskImageFile};
pub use error::{Error, Result};
pub use geometry::Geometry;
pub use locator::{FileAccess, FileLocator, FileMode, FileShare, LocalFileLocator};
pub use stream::{ConcatStream, SparseStream, StreamExtent, ZeroStream};
