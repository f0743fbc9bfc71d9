//! # tandemai
//!
//! Provider-agnostic content-generation interface for the Tandem agent core.
//!
//! This crate defines the contract between the orchestration core and
//! whatever model backend serves it: unified message and tool-declaration
//! types, a streaming event union, token accounting, and a classified error
//! taxonomy the retry/fallback machinery depends on. Concrete providers are
//! external collaborators that implement [`ContentGenerator`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tandemai::{ContentGenerator, GenerateRequest, Message, Model, Role};
//!
//! async fn one_round_trip(generator: &dyn ContentGenerator) -> tandemai::Result<()> {
//!     let request = GenerateRequest::new(
//!         Model::custom("tandem-pro-2"),
//!         vec![Message::new(Role::User, "What is Rust?")],
//!     );
//!     let _stream = generator.stream(&request).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod generator;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use generator::ContentGenerator;
pub use types::{
    // Message types
    ContentPart, Message, MessageContent, Role,
    // Model types
    Model, ModelLimit,
    // Options types
    GenerateOptions, Tool,
    // Request types
    GenerateRequest,
    // Response types
    FinishReason, FinishReasonKind, Usage,
    // Stream types
    GenerateStream, StreamEvent,
};
