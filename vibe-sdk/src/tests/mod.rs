//! Unit tests for the SDK
//!
//! HTTP-level client tests run against WireMock servers; the rest exercise
//! the error, config and resilience layers directly.

pub mod openai_mock_tests;
pub mod pinecone_mock_tests;
