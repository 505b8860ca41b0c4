//! Wire frames exchanged with a kernel process.
//!
//! Every frame is a single JSON object terminated by a newline.

use mathline_core::{PacketTag, Token};
use serde::{Deserialize, Serialize};

/// Frame decode/encode error.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Packet sent by the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketFrame {
    /// Numeric packet tag.
    pub packet: PacketTag,
    /// Payload items in read order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Token>,
}

impl PacketFrame {
    #[must_use]
    pub fn new(packet: PacketTag, args: Vec<Token>) -> Self {
        Self { packet, args }
    }

    /// Decode one line. Blank lines carry no frame.
    ///
    /// # Errors
    /// Returns error if the line is not a valid packet frame.
    pub fn decode(line: &str) -> Result<Option<Self>, FrameError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(line)?))
    }

    /// Encode as a newline-terminated line.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn encode(&self) -> Result<String, FrameError> {
        encode_line(self)
    }
}

/// Complete message sent to the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFrame {
    pub message: Vec<Token>,
}

impl MessageFrame {
    #[must_use]
    pub fn new(message: Vec<Token>) -> Self {
        Self { message }
    }

    /// Encode as a newline-terminated line.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn encode(&self) -> Result<String, FrameError> {
        encode_line(self)
    }

    /// Decode one line.
    ///
    /// # Errors
    /// Returns error if the line is not a valid message frame.
    pub fn decode(line: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(line.trim())?)
    }
}

fn encode_line<T: Serialize>(frame: &T) -> Result<String, FrameError> {
    let mut json = serde_json::to_string(frame)?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_packet() {
        let frame = PacketFrame::decode(r#"{"packet":8,"args":[{"string":"In[1]:= "}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(frame.packet, PacketTag::InputName);
        assert_eq!(frame.args, vec![Token::string("In[1]:= ")]);
    }

    #[test]
    fn test_decode_packet_without_args() {
        let frame = PacketFrame::decode(r#"{"packet":17}"#).unwrap().unwrap();
        assert_eq!(frame.packet, PacketTag::Suspend);
        assert!(frame.args.is_empty());
    }

    #[test]
    fn test_unknown_tag_survives() {
        let frame = PacketFrame::decode(r#"{"packet":99,"args":[]}"#).unwrap().unwrap();
        assert_eq!(frame.packet, PacketTag::Unknown(99));
        assert_eq!(frame.encode().unwrap(), "{\"packet\":99}\n");
    }

    #[test]
    fn test_blank_line_is_skipped() {
        assert!(PacketFrame::decode("   ").unwrap().is_none());
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(PacketFrame::decode("In[1]:= ").is_err());
        assert!(PacketFrame::decode(r#"{"args":[]}"#).is_err());
    }

    #[test]
    fn test_message_wire_shape() {
        let frame = MessageFrame::new(vec![
            Token::function("EnterTextPacket", 1),
            Token::string("2+2"),
        ]);
        assert_eq!(
            frame.encode().unwrap(),
            "{\"message\":[{\"function\":{\"name\":\"EnterTextPacket\",\"arity\":1}},{\"string\":\"2+2\"}]}\n"
        );
    }
}
