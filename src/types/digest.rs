// ABOUTME: Content digest of a pushed image.
// ABOUTME: Parses `algorithm:hex` values such as sha256 digests.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DigestError {
    #[error("digest must have the form <algorithm>:<hex>: {0}")]
    InvalidFormat(String),

    #[error("digest contains non-hex characters: {0}")]
    NotHex(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest(String);

impl Digest {
    pub fn parse(input: &str) -> Result<Self, DigestError> {
        let input = input.trim();
        let (algorithm, hex) = input
            .split_once(':')
            .ok_or_else(|| DigestError::InvalidFormat(input.to_string()))?;

        if algorithm.is_empty()
            || hex.is_empty()
            || !algorithm.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(DigestError::InvalidFormat(input.to_string()));
        }

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DigestError::NotHex(input.to_string()));
        }

        Ok(Self(input.to_ascii_lowercase()))
    }

    /// Find the digest on the last output line that carries one.
    pub fn find_in(output: &str) -> Option<Self> {
        output
            .lines()
            .rev()
            .flat_map(|line| line.split_whitespace())
            .filter(|token| token.contains("sha256:"))
            .find_map(|token| {
                let start = token.find("sha256:")?;
                Digest::parse(token[start..].trim_end_matches(|c: char| !c.is_ascii_hexdigit()))
                    .ok()
            })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
