//! File-backed message catalog.

mod file_catalog;

pub use file_catalog::{CatalogError, FileMessageCatalog};
