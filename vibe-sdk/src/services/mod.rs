//! Service-specific client implementations

pub mod openai;
pub mod pinecone;
mod common;

pub use common::UserAgent;
