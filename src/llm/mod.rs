//! Chat endpoint access and completion normalization.

pub mod client;
pub mod completion;
pub mod prompt;

pub use client::{
    ChatClient, ChatEndpoint, ChatMessage, ChatRequest, HttpChatClient, ModelFilter,
    REQUEST_TIMEOUT,
};
pub use completion::{CompletionBody, Usage, normalize};
