pub mod local_registry;
pub mod registry_meta;
