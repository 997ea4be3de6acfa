//! Vidshelf Core Library
//!
//! Configuration and logging setup shared by the `vidshelf` binary.

pub mod colored_logger;
pub mod config;
