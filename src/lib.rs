#![deny(missing_docs)]

//! A Gemini-backed chemistry tutor for gifted-student exam preparation.
//!
//! The crate solves chemistry problems (typed, uploaded or pasted as images),
//! generates exams and grades submissions. Every request goes through a small
//! pipeline: build the request, call the model, retry rate limits with backoff,
//! and reduce any failure to one user-facing sentence.

pub mod access;
pub mod classifier;
pub mod client;
pub mod config;
pub mod error;
pub mod file;
pub mod models;
pub mod prompts;
pub mod render;
pub mod retry;
pub mod session;

pub use classifier::{ClassifierPolicy, ErrorClassifier};
pub use client::{ContentGenerator, GenerationClient, GenerativeModel};
pub use error::{ClassifiedError, ErrorKind, GenerationError, RemoteFailure};
pub use retry::{RetryController, RetryPolicy};
pub use session::{AppMode, SolveInput, Tutor};
