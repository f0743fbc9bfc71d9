//! Core types for the content-generation interface

mod message;
mod model;
mod options;
mod request;
mod response;
mod stream;

// Message types
pub use message::{ContentPart, Message, MessageContent, Role};

// Model types
pub use model::{Model, ModelLimit};

// Options types
pub use options::{GenerateOptions, Tool};

// Request types
pub use request::GenerateRequest;

// Response types
pub use response::{FinishReason, FinishReasonKind, Usage};

// Stream types
pub use stream::{GenerateStream, StreamEvent};
