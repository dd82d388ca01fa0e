//! Transport module - command-server subprocess and its pipes.

mod process;

pub use process::{ServerConfig, ServerProcess, DEFAULT_HG_BINARY};
