//! Everything needed to stand up the opensrc MCP server: the `App`
//! that owns every stateful component, the sandboxed JS runtime, and
//! the `rmcp` protocol surface wired on top of it.

pub mod app;
pub mod mcp;
pub mod sandbox;
pub mod sandbox_api;

pub use app::App;
pub use mcp::OpensrcServer;
