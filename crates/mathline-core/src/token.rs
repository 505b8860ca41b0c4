//! Typed payload items carried by packets and outbound messages.

use serde::{Deserialize, Serialize};

/// One typed item of a packet payload or an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Token {
    /// Function head with its argument count.
    Function { name: String, arity: usize },
    /// UTF-8 string.
    String(String),
    /// Symbol name.
    Symbol(String),
    /// Machine integer.
    Integer(i32),
}

impl Token {
    /// Create a function head token.
    #[must_use]
    pub fn function(name: impl Into<String>, arity: usize) -> Self {
        Self::Function {
            name: name.into(),
            arity,
        }
    }

    /// Create a string token.
    #[must_use]
    pub fn string(text: impl Into<String>) -> Self {
        Self::String(text.into())
    }

    /// Create a symbol token.
    #[must_use]
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::Symbol(name.into())
    }

    /// Short name of the token kind, used in error reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Function { .. } => "function",
            Self::String(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::Integer(_) => "integer",
        }
    }
}
