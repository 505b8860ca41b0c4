//! In-memory link that replays a scripted kernel.
//!
//! Useful for tests and for embedding the engine without a kernel process.
//! Every outbound message is recorded for inspection.

use std::collections::VecDeque;

use crate::{
    Link, LinkError, LinkStatus, PacketTag, Token,
    link::code,
    packet::{EVALUATE_AS_STRING, SYNTAX_SYMBOL},
};

#[derive(Debug, Clone)]
enum Step {
    Packet { tag: PacketTag, args: Vec<Token> },
    Stall,
    Failure { code: i32, message: String },
}

/// Scripted in-memory link.
///
/// Once the script runs out, the link behaves as if the kernel had closed it.
#[derive(Debug, Default)]
pub struct ScriptedLink {
    script: VecDeque<Step>,
    current: VecDeque<Token>,
    building: Vec<Token>,
    sent: Vec<Vec<Token>>,
    status: LinkStatus,
    fail_activation: Option<LinkStatus>,
    activated: bool,
    closed: bool,
    fetched: usize,
}

impl ScriptedLink {
    /// Create a link with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a packet.
    #[must_use]
    pub fn packet(mut self, tag: PacketTag, args: impl IntoIterator<Item = Token>) -> Self {
        self.push(tag, args);
        self
    }

    /// Queue a packet through a mutable reference.
    pub fn push(&mut self, tag: PacketTag, args: impl IntoIterator<Item = Token>) {
        self.script.push_back(Step::Packet {
            tag,
            args: args.into_iter().collect(),
        });
    }

    /// Queue a packet carrying a single string.
    #[must_use]
    pub fn text_packet(self, tag: PacketTag, text: &str) -> Self {
        self.packet(tag, [Token::string(text)])
    }

    /// Queue a packet carrying a single integer.
    #[must_use]
    pub fn integer_packet(self, tag: PacketTag, value: i32) -> Self {
        self.packet(tag, [Token::Integer(value)])
    }

    /// Queue a message header followed by its body text packet.
    #[must_use]
    pub fn message(self, name: &str, tag: &str, body: &str) -> Self {
        self.packet(
            PacketTag::Message,
            [Token::symbol(name), Token::string(tag)],
        )
        .text_packet(PacketTag::Text, body)
    }

    /// Queue a syntax diagnostic: message, body and position.
    #[must_use]
    pub fn syntax_error(self, tag: &str, body: &str, position: i32) -> Self {
        self.message(SYNTAX_SYMBOL, tag, body)
            .integer_packet(PacketTag::Syntax, position)
    }

    /// Queue the startup handshake of a kernel: the first input prompt, then
    /// the answer to the `$PrePrint` assignment.
    #[must_use]
    pub fn startup(self, prompt: &str) -> Self {
        self.text_packet(PacketTag::InputName, prompt)
            .text_packet(PacketTag::Return, "InputForm")
    }

    /// Report "not ready" once before the next packet.
    #[must_use]
    pub fn stall(mut self) -> Self {
        self.script.push_back(Step::Stall);
        self
    }

    /// Make the link fail when this point of the script is reached.
    #[must_use]
    pub fn failure(mut self, code: i32, message: &str) -> Self {
        self.script.push_back(Step::Failure {
            code,
            message: message.to_string(),
        });
        self
    }

    /// Make activation fail with the given error.
    #[must_use]
    pub fn refuse_activation(mut self, code: i32, message: &str) -> Self {
        self.fail_activation = Some(LinkStatus::failed(code, message));
        self
    }

    /// Every message sent so far, in order.
    #[must_use]
    pub fn sent(&self) -> &[Vec<Token>] {
        &self.sent
    }

    /// String payload of each message sent so far.
    #[must_use]
    pub fn sent_strings(&self) -> Vec<&str> {
        self.sent
            .iter()
            .filter_map(|message| {
                message.iter().find_map(|token| match token {
                    Token::String(text) => Some(text.as_str()),
                    _ => None,
                })
            })
            .collect()
    }

    /// Function heads of the message at `index`.
    #[must_use]
    pub fn heads(&self, index: usize) -> Vec<&str> {
        self.sent.get(index).map_or_else(Vec::new, |message| {
            message
                .iter()
                .filter_map(|token| match token {
                    Token::Function { name, .. } => Some(name.as_str()),
                    _ => None,
                })
                .collect()
        })
    }

    /// Whether the message at `index` used the evaluate-as-string heads.
    #[must_use]
    pub fn bypassed_main_loop(&self, index: usize) -> bool {
        self.heads(index) == EVALUATE_AS_STRING
    }

    /// Number of packets fetched so far.
    #[must_use]
    pub const fn fetched(&self) -> usize {
        self.fetched
    }

    /// Scripted steps not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    /// Whether `close` was called.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    fn fail(&mut self, code: i32, message: impl Into<String>) {
        if self.status.is_ok() {
            self.status = LinkStatus::failed(code, message);
        }
    }

    fn take_token(&mut self, expected: &'static str) -> Result<Token, LinkError> {
        if self.closed {
            return Err(LinkError::NotConnected);
        }
        self.current.pop_front().ok_or(LinkError::UnexpectedToken {
            expected,
            found: "nothing",
        })
    }
}

impl Link for ScriptedLink {
    fn activate(&mut self) -> bool {
        if let Some(status) = self.fail_activation.take() {
            self.status = status;
            return false;
        }
        self.activated = true;
        true
    }

    fn is_ready(&mut self) -> bool {
        if self.closed {
            return false;
        }
        if matches!(self.script.front(), Some(Step::Stall)) {
            self.script.pop_front();
            return false;
        }
        true
    }

    fn flush(&mut self) -> bool {
        !self.closed
    }

    fn new_packet(&mut self) -> bool {
        self.current.clear();
        !self.closed
    }

    fn next_packet(&mut self) -> PacketTag {
        self.current.clear();
        if self.closed {
            return PacketTag::Illegal;
        }
        loop {
            match self.script.pop_front() {
                Some(Step::Stall) => {}
                Some(Step::Packet { tag, args }) => {
                    self.fetched += 1;
                    self.current = args.into();
                    return tag;
                }
                Some(Step::Failure { code, message }) => {
                    self.fail(code, message);
                    return PacketTag::Illegal;
                }
                None => {
                    self.fail(code::CLOSED, "scripted kernel has no more packets");
                    return PacketTag::Illegal;
                }
            }
        }
    }

    fn get_string(&mut self) -> Result<String, LinkError> {
        match self.take_token("string")? {
            Token::String(text) => Ok(text),
            other => Err(LinkError::UnexpectedToken {
                expected: "string",
                found: other.kind(),
            }),
        }
    }

    fn get_symbol(&mut self) -> Result<String, LinkError> {
        match self.take_token("symbol")? {
            Token::Symbol(name) => Ok(name),
            other => Err(LinkError::UnexpectedToken {
                expected: "symbol",
                found: other.kind(),
            }),
        }
    }

    fn get_integer(&mut self) -> Result<i32, LinkError> {
        match self.take_token("integer")? {
            Token::Integer(value) => Ok(value),
            other => Err(LinkError::UnexpectedToken {
                expected: "integer",
                found: other.kind(),
            }),
        }
    }

    fn put_function(&mut self, name: &str, arity: usize) -> Result<(), LinkError> {
        if self.closed {
            return Err(LinkError::NotConnected);
        }
        self.building.push(Token::function(name, arity));
        Ok(())
    }

    fn put_string(&mut self, text: &str) -> Result<(), LinkError> {
        if self.closed {
            return Err(LinkError::NotConnected);
        }
        self.building.push(Token::string(text));
        Ok(())
    }

    fn end_message(&mut self) -> Result<(), LinkError> {
        if self.closed {
            return Err(LinkError::NotConnected);
        }
        self.sent.push(std::mem::take(&mut self.building));
        Ok(())
    }

    fn last_error(&mut self) -> LinkStatus {
        self.status.clone()
    }

    fn close(&mut self) {
        self.closed = true;
        self.current.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replays_packets_in_order() {
        let mut link = ScriptedLink::new()
            .text_packet(PacketTag::ReturnText, "3")
            .integer_packet(PacketTag::BeginDialog, 2);

        assert!(link.is_ready());
        assert_eq!(link.next_packet(), PacketTag::ReturnText);
        assert_eq!(link.get_string().unwrap(), "3");
        assert_eq!(link.next_packet(), PacketTag::BeginDialog);
        assert_eq!(link.get_integer().unwrap(), 2);
        assert_eq!(link.fetched(), 2);
    }

    #[test]
    fn test_next_packet_discards_unread_payload() {
        let mut link = ScriptedLink::new()
            .packet(
                PacketTag::Message,
                [Token::symbol("General"), Token::string("tag")],
            )
            .text_packet(PacketTag::Text, "body");

        assert_eq!(link.next_packet(), PacketTag::Message);
        assert_eq!(link.next_packet(), PacketTag::Text);
        assert_eq!(link.get_string().unwrap(), "body");
    }

    #[test]
    fn test_stall_reports_not_ready_once() {
        let mut link = ScriptedLink::new()
            .stall()
            .text_packet(PacketTag::Text, "x");

        assert!(!link.is_ready());
        assert!(link.is_ready());
        assert_eq!(link.next_packet(), PacketTag::Text);
    }

    #[test]
    fn test_exhausted_script_reports_closed() {
        let mut link = ScriptedLink::new();
        assert_eq!(link.next_packet(), PacketTag::Illegal);
        let status = link.last_error();
        assert_eq!(status.code, code::CLOSED);
    }

    #[test]
    fn test_type_mismatch_is_reported() {
        let mut link = ScriptedLink::new().integer_packet(PacketTag::Syntax, 4);
        link.next_packet();
        let err = link.get_string().unwrap_err();
        assert!(matches!(
            err,
            LinkError::UnexpectedToken {
                expected: "string",
                found: "integer"
            }
        ));
        assert!(link.last_error().is_ok());
    }

    #[test]
    fn test_records_sent_messages() {
        let mut link = ScriptedLink::new();
        link.put_function("EnterTextPacket", 1).unwrap();
        link.put_string("1+2").unwrap();
        link.end_message().unwrap();

        assert_eq!(link.sent().len(), 1);
        assert_eq!(link.heads(0), vec!["EnterTextPacket"]);
        assert_eq!(link.sent_strings(), vec!["1+2"]);
        assert!(!link.bypassed_main_loop(0));
    }

    #[test]
    fn test_closed_link_refuses_io() {
        let mut link = ScriptedLink::new().text_packet(PacketTag::Text, "x");
        link.close();
        assert!(link.is_closed());
        assert!(!link.is_ready());
        assert!(link.put_string("y").is_err());
        assert_eq!(link.next_packet(), PacketTag::Illegal);
    }
}
