//! Content-addressed blob storage backing the local registry.

pub mod cas_fs;
