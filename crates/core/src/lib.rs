//! Operator domain types shared by the supervisor and the API server.
//!
//! Holds the job descriptor model, the core error type, and the job
//! invocation boundary: the registry of named job functions and the runner
//! that executes one of them inside a child process.

pub mod error;
pub mod job;
pub mod jobs;
pub mod types;
