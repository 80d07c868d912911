// Library interface for tailpage
// Exposes the viewing engine for the CLI, integration tests and embedders

pub mod collection;
pub mod config;
pub mod controller;
pub mod discovery;
pub mod filter;
pub mod log_line;
pub mod logging;
pub mod reader;
pub mod watcher;

#[cfg(test)]
pub mod test_utils;

pub use collection::{CollectionEvent, IncrementalLogCollection};
pub use controller::LogViewController;
pub use log_line::LogLine;
pub use reader::{LineSource, SourceError};
