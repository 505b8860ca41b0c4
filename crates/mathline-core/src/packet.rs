//! Packet discriminants of the kernel reply stream.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Head used to submit input through the kernel's main loop.
pub const ENTER_TEXT: &str = "EnterTextPacket";
/// Head used to answer a kernel request for raw text.
pub const TEXT: &str = "TextPacket";
/// Heads used to evaluate input outside the main loop, returning a string.
pub const EVALUATE_AS_STRING: [&str; 3] = ["EvaluatePacket", "ToString", "ToExpression"];

/// Symbol naming syntax diagnostics.
pub const SYNTAX_SYMBOL: &str = "Syntax";
/// Message tag signalling an incomplete expression.
pub const INCOMPLETE_TAG: &str = "sntxi";

/// Packet tag read off the link.
///
/// The numeric codes match the kernel protocol. Codes this engine does not
/// know are kept as `Unknown` so newer kernels never stall the session loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum PacketTag {
    Illegal,
    Input,
    Text,
    Return,
    ReturnText,
    Message,
    Menu,
    InputName,
    OutputName,
    Syntax,
    Display,
    DisplayEnd,
    ReturnExpr,
    Suspend,
    Resume,
    BeginDialog,
    EndDialog,
    InputStr,
    Unknown(i32),
}

impl PacketTag {
    /// Map a wire code to a tag.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Illegal,
            1 => Self::Input,
            2 => Self::Text,
            3 => Self::Return,
            4 => Self::ReturnText,
            5 => Self::Message,
            6 => Self::Menu,
            8 => Self::InputName,
            9 => Self::OutputName,
            10 => Self::Syntax,
            11 => Self::Display,
            12 => Self::DisplayEnd,
            16 => Self::ReturnExpr,
            17 => Self::Suspend,
            18 => Self::Resume,
            19 => Self::BeginDialog,
            20 => Self::EndDialog,
            21 => Self::InputStr,
            other => Self::Unknown(other),
        }
    }

    /// Wire code of this tag.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Illegal => 0,
            Self::Input => 1,
            Self::Text => 2,
            Self::Return => 3,
            Self::ReturnText => 4,
            Self::Message => 5,
            Self::Menu => 6,
            Self::InputName => 8,
            Self::OutputName => 9,
            Self::Syntax => 10,
            Self::Display => 11,
            Self::DisplayEnd => 12,
            Self::ReturnExpr => 16,
            Self::Suspend => 17,
            Self::Resume => 18,
            Self::BeginDialog => 19,
            Self::EndDialog => 20,
            Self::InputStr => 21,
            Self::Unknown(code) => code,
        }
    }

    /// Whether this is one of the return-class packets.
    #[must_use]
    pub const fn is_return(self) -> bool {
        matches!(self, Self::Return | Self::ReturnExpr)
    }
}

impl From<i32> for PacketTag {
    fn from(code: i32) -> Self {
        Self::from_code(code)
    }
}

impl From<PacketTag> for i32 {
    fn from(tag: PacketTag) -> Self {
        tag.code()
    }
}

impl fmt::Display for PacketTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "Unknown({code})"),
            known => write!(f, "{known:?}"),
        }
    }
}
