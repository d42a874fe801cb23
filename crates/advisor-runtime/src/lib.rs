//! # advisor-runtime
//!
//! Runtime providers for the trade advisor.
//!
//! ## Providers
//!
//! - **Gemini** (default): Google Generative Language API over HTTPS
//! - **Ollama** (feature `ollama`): Local LLM inference via Ollama
//!
//! ## Usage
//!
//! ```rust,ignore
//! use advisor_runtime::GeminiProvider;
//!
//! let provider = GeminiProvider::from_env()?;
//! let advisor = TradeAdvisor::new(Some(Arc::new(provider)), options);
//! ```

#[cfg(feature = "gemini")]
pub mod gemini;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "gemini")]
pub use gemini::{GeminiConfig, GeminiProvider};

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};

// Re-export core types for convenience
pub use advisor_core::{
    Completion, GenerationOptions, LlmError, LlmProvider, Message, Result, Role,
};
