//! Integration tests with mock HTTP server


mod fetch;
mod jobs;
