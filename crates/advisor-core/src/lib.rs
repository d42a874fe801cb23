//! # advisor-core
//!
//! Provider-agnostic LLM abstraction used by the trade advisor.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     TradeAdvisor                          │
//! │  ┌─────────────┐   ┌─────────────┐   ┌────────────────┐  │
//! │  │   Prompt    │──▶│  Messages   │──▶│  LlmProvider   │  │
//! │  │  (context)  │   │ system+user │   │  (Strategy)    │  │
//! │  └─────────────┘   └─────────────┘   └────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait enables swapping between Gemini, Ollama,
//! or any other text-generation backend without touching advisor logic.

pub mod provider;
pub mod message;
pub mod error;

pub use error::{LlmError, Result};
pub use message::{Message, Role};
pub use provider::{Completion, GenerationOptions, LlmProvider};
