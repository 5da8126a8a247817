//! HTTP Transport layer for the Model Context Protocol
//!
//! Provides the external API routing, including the `/mcp` session endpoint and metadata endpoints.

pub mod handlers;
