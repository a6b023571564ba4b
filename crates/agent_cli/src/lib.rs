//! Building blocks of the `agent-stream` command-line client.

pub mod config;
pub mod render;
pub mod review;
pub mod signals;
