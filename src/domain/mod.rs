//! Todoist tools exposed over the MCP protocol

pub mod tools;
pub mod utils;
