pub mod content_resolver;
pub mod content_type;
