//! Build tool command-line arguments

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered list of extra arguments passed to a build tool
///
/// Kept as tokens rather than a single string so that project-wide defaults
/// can be combined with per-step arguments and individual flags removed
/// without touching unrelated text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildToolArgs(Vec<String>);

impl BuildToolArgs {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Split a whitespace-separated argument string into tokens
    pub fn parse(args: &str) -> Self {
        Self(args.split_whitespace().map(str::to_string).collect())
    }

    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tokens.into_iter().map(Into::into).collect())
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Arguments of `self` followed by those of `other`
    pub fn concat(&self, other: &BuildToolArgs) -> Self {
        let mut tokens = self.0.clone();
        tokens.extend(other.0.iter().cloned());
        Self(tokens)
    }

    /// Remove every contiguous occurrence of `sequence`
    ///
    /// `-I ./init.gradle` removes the flag together with its value, but leaves
    /// a lone `-I` followed by a different path untouched.
    pub fn without(&self, sequence: &BuildToolArgs) -> Self {
        let needle = sequence.tokens();
        if needle.is_empty() {
            return self.clone();
        }

        let mut kept = Vec::with_capacity(self.0.len());
        let mut i = 0;
        while i < self.0.len() {
            if self.0[i..].starts_with(needle) {
                i += needle.len();
            } else {
                kept.push(self.0[i].clone());
                i += 1;
            }
        }
        Self(kept)
    }
}

impl fmt::Display for BuildToolArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

impl From<&str> for BuildToolArgs {
    fn from(args: &str) -> Self {
        Self::parse(args)
    }
}

impl From<Vec<String>> for BuildToolArgs {
    fn from(tokens: Vec<String>) -> Self {
        Self(tokens)
    }
}
