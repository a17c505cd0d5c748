//! Generative layer: prompts built from lexicon examples, an OpenAI-compatible
//! completions client, and parsing of numbered-list completions.

mod error;
pub mod generator;
pub mod parse;
pub mod prompt;

pub use error::GenerateError;
pub use generator::{CompletionsClient, Generator, SamplingParams, generate};
pub use parse::{ParsedCompletion, parse_completion};
pub use prompt::{Prompt, PromptStyle, build_prompt};
