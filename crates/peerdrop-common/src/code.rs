use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::SessionError;

/// Number of digits in a session code.
pub const CODE_LEN: usize = 6;

/// Short human-typed code pairing a sender and a receiver on the relay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionCode(String);

impl SessionCode {
    /// Parse user input. Surrounding whitespace is ignored.
    pub fn parse(input: &str) -> Result<Self, SessionError> {
        let trimmed = input.trim();
        if trimmed.len() != CODE_LEN || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SessionError::InvalidCode(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Random code in `100000..=999999`.
    pub fn generate() -> Self {
        let n: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
        Self(n.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionCode {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SessionCode {
    type Error = SessionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SessionCode> for String {
    fn from(code: SessionCode) -> Self {
        code.0
    }
}
