pub mod args;
pub mod config;
pub mod cover;
pub mod error;
pub mod filename;
pub mod logging;
pub mod manifest;
pub mod media;
pub mod processor;
pub mod record;
pub mod selector;
pub mod sidecar;
pub mod source;
pub mod thumbnail;
