pub mod archive;
pub mod config;
pub mod error;
pub mod maven;
pub mod service;
pub mod storage;
