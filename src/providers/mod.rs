//! HTTP implementations of the classification and embedding capabilities.

pub mod openai;

pub use openai::{OpenAiClassifier, OpenAiConfig, OpenAiEmbedder};
