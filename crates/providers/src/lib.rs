//! LLM provider implementations for Memoria.
//!
//! All providers implement the `memoria_core::Provider` trait.

pub mod anthropic;

pub use anthropic::AnthropicProvider;
