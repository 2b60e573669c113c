//! Management endpoints
//!
//! - `memory`: an in-process resource tree (offline mode)
//! - `http`: JSON requests POSTed to a remote endpoint

pub mod http;
pub mod memory;

pub use http::{DisconnectedController, HttpController};
pub use memory::{MemoryController, Resource};
