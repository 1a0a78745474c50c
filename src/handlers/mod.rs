//! MCP tool handlers
//!
//! Each handler is in a separate file; the `#[mcp_server]` impl in the crate
//! root only forwards to them.

pub mod sections;
pub mod status;
pub mod sync;
