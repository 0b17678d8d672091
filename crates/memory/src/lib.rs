//! Memory recall for Memoria.
//!
//! Three recall stages feed the system prompt, each producing one
//! [`ContextBlock`]:
//! - short-term: the last turns of the current session
//! - long-term: user facts from the semantic strategy
//! - episodic: reflections and learned patterns from the episodic strategy
//!
//! Strategy ids are discovered at runtime through [`StrategyLocator`]. Every
//! call to the memory service goes through [`TimeoutMemoryService`].

pub mod block;
pub mod episodic;
pub mod in_memory;
pub mod ltm;
pub mod namespace;
pub mod pipeline;
pub mod stm;
pub mod store;
pub mod strategy;
pub mod timeout;

#[cfg(test)]
pub(crate) mod testing;

pub use block::{BlockKind, ContextBlock};
pub use episodic::{EpisodicContent, classify};
pub use in_memory::InMemoryMemoryService;
pub use namespace::Namespace;
pub use pipeline::{MemoryPipeline, PipelineSettings};
pub use strategy::{StrategyId, StrategyKind, StrategyLocator};
pub use timeout::TimeoutMemoryService;
