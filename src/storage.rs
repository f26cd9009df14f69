pub mod artifact_cache;
pub mod local_storage;
