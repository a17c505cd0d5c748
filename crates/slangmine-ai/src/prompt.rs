//! Few-shot prompts asking for alternate names of a seed drug.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::GenerateError;

/// Drugs listed as negative examples by [`PromptStyle::Counterexamples`].
const COUNTEREXAMPLES: [&str; 4] = ["ativan", "zoloft", "lexapro", "klonopin"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PromptStyle {
    /// "ways to say X:" followed by three known examples.
    #[default]
    WaysToSay,
    /// Four non-synonyms, then two known examples.
    Counterexamples,
}

impl PromptStyle {
    pub fn example_count(&self) -> usize {
        match self {
            Self::WaysToSay => 3,
            Self::Counterexamples => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WaysToSay => "ways-to-say",
            Self::Counterexamples => "counterexamples",
        }
    }
}

impl fmt::Display for PromptStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ways-to-say" => Ok(Self::WaysToSay),
            "counterexamples" => Ok(Self::Counterexamples),
            other => Err(format!(
                "unknown prompt style '{other}' (expected ways-to-say or counterexamples)"
            )),
        }
    }
}

/// A rendered prompt and the examples sampled into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub seed: String,
    pub style: PromptStyle,
    pub examples: Vec<String>,
    pub text: String,
}

/// Sample examples for `seed` from `pool` and render the prompt.
///
/// The seed is shown with spaces in place of `_`, as are the examples.
pub fn build_prompt<R: Rng + ?Sized>(
    seed: &str,
    pool: &[String],
    style: PromptStyle,
    rng: &mut R,
) -> Result<Prompt, GenerateError> {
    let needed = style.example_count();
    if pool.len() < needed {
        return Err(GenerateError::InsufficientExamples {
            seed: seed.to_string(),
            available: pool.len(),
            needed,
        });
    }

    let examples: Vec<String> = pool
        .choose_multiple(rng, needed)
        .map(|e| e.replace('_', " "))
        .collect();
    let name = seed.replace('_', " ");

    let text = match style {
        PromptStyle::WaysToSay => format!(
            "ways to say {name}:\n1. {}\n2. {}\n3. {}\n4.",
            examples[0], examples[1], examples[2]
        ),
        PromptStyle::Counterexamples => {
            let negatives: String = COUNTEREXAMPLES
                .iter()
                .enumerate()
                .map(|(i, d)| {
                    let lead = if i == 0 { " " } else { "" };
                    format!("{lead}{}. {d}\n", i + 1)
                })
                .collect();
            format!(
                "these are not synonyms for {name}:\n{negatives}\
                 but these are synonyms for {name}:\n 1. {}\n2. {}\n3.",
                examples[0], examples[1]
            )
        }
    };

    Ok(Prompt {
        seed: seed.to_string(),
        style,
        examples,
        text,
    })
}
