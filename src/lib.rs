//! A terminal tutor that keeps a Gemini chat model on data-science topics
//! while carrying the conversation across turns.

pub mod cli;
pub mod config;
pub mod error;
pub mod gemini_client;
pub mod tutor;

pub use error::{ErrorKind, Result, TutorError};
pub use tutor::TutorSession;
