pub mod coordinates;
pub mod http_fetcher;
pub mod metadata_xml;
pub mod paths;
pub mod remote_repo;
#[cfg(test)]
pub mod transient_repo;
pub mod version_resolver;
