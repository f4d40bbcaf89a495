//! Building blocks for [`clap`]-driven configuration options.

pub mod availability;
pub mod cache;
pub mod endpoint;
pub mod resolver;
