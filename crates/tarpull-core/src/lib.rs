//! Pull pipeline for bundling registry images into one loadable archive.
//!
//! This crate ties the registry client and the archive writer together: the
//! blob streamer copies content-addressed blobs from a `RegistrySource` into
//! the `ArchiveWriter`, the `CatalogBuilder` records one catalog entry per
//! image, and the `Bundler` drives an ordered image list through both. It also
//! provides the optional spooled parallel fetch and Ctrl-C handling.

pub mod bundle;
pub mod catalog;
pub mod concurrency;
pub mod report;
pub mod spool;
pub mod streamer;

pub use bundle::{bundle, BundleOptions, Bundler};
pub use catalog::CatalogBuilder;
pub use concurrency::{install_signal_handler, shutdown_requested};
pub use report::{BundleReport, ImageOutcome, ImageStatus};
pub use streamer::stream_blob;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Schema(#[from] tarpull_schema::SchemaError),
    #[error(transparent)]
    Registry(#[from] tarpull_registry::RegistryError),
    #[error(transparent)]
    Archive(#[from] tarpull_archive::ArchiveError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("interrupted")]
    Interrupted,
    #[error("blob fetch worker panicked")]
    WorkerPanicked,
    #[error("none of the {0} images could be pulled")]
    NothingBundled(usize),
}
