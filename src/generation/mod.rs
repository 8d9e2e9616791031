//! Grounded answer synthesis

mod answerer;
mod prompt;

pub use answerer::{AnswerEngine, NO_CONTEXT_ANSWER};
pub use prompt::PromptBuilder;
