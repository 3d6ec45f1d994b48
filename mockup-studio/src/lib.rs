// Library root: re-exports all modules so integration tests and external
// front ends can drive mockup generation directly.

pub mod app;
pub mod config;
pub mod llm;
pub mod media;
pub mod protocol;
