#![deny(missing_docs)]

//! Core library for the booksum PDF summarization server.

/// HTTP routing, REST handlers, and the WebSocket progress channel.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline activity counters.
pub mod metrics;
/// Extraction, chunking, dispatch, merge, and session orchestration.
pub mod pipeline;
/// Readability scoring of merged summaries.
pub mod readability;
/// Text-to-speech rendering.
pub mod speech;
/// On-disk artifact storage.
pub mod storage;
/// Summarization model clients.
pub mod summarization;
