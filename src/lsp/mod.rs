//! LSP Protocol Implementation
//!
//! Backend, request handlers, commands and the config watcher.

pub mod backend;
pub mod commands;
pub mod handlers;
pub mod server;
pub mod watch;

pub use backend::Backend;
