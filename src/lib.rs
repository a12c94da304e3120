pub mod api;
pub mod cache;
pub mod config;
pub mod engine;
pub mod events;
pub mod init;
pub mod probe;
pub mod safety;
pub mod scan;
pub mod service;
pub mod stats;
pub mod store;
pub mod types;
pub mod validate;
