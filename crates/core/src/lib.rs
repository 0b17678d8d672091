//! # Memoria Core
//!
//! Domain types, traits, and error definitions shared by every Memoria crate.
//! This crate has **no framework dependencies**: it defines the model that the
//! memory pipeline, the providers, the tools and the agent loop are written
//! against.
//!
//! External services (the LLM, the long-term memory store, the tool gateway)
//! are each reached through a trait defined here, so the pipeline can be driven
//! by real HTTP clients in production and by scripted fakes in tests.

pub mod error;
pub mod memory;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{AuthError, Error, ParseError, ProviderError, Result, RetrievalError, ToolError};
pub use memory::{
    ConversationalMessage, EpisodicConfig, MemoryRecord, MemoryService, MessageRole,
    RecordContent, Turn, TurnMessage,
};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
