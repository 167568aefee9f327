//! Omnichat Agent: tools and the multi-turn chat client.
//!
//! This crate contains:
//! - **tools**: Tool trait, signature-based and typed registration, doc parsing, registry and executor
//! - **client**: `Client::create`, dispatching to a provider and running the tool conversation

pub mod client;
pub mod tools;

pub use client::{ChatOptions, Client, ToolItem, ToolsInput};
pub use tools::{Args, FunctionTool, ParamType, Tool, Tools, TypedTool};
