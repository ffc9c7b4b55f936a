// Language-model module
// OpenAI-compatible chat-completion and embedding client

pub mod openai;

pub use openai::{ChatMessage, ChatOptions, OpenAiClient};
