//! Packet dispatch: the per-turn session loop and one handler per packet tag.
//!
//! Each handler consumes exactly the payload of its packet and reports
//! whether the kernel's turn is over.

use std::{io::Write, thread, time::Duration};

use mathline_core::{
    Link, PacketTag, PendingMessage,
    packet::{INCOMPLETE_TAG, SYNTAX_SYMBOL},
};

use crate::{
    error::SessionError,
    session::{InputMode, Session, Turn},
};

/// Pause between readiness polls in [`Session::process_response`].
const POLL_INTERVAL: Duration = Duration::from_millis(2);

impl<L: Link, W: Write> Session<L, W> {
    /// Read and act on the kernel's reply until it is ready for new input.
    ///
    /// Blocks the calling thread, polling the link between packets. Callers
    /// that need to interleave other work use [`Session::poll_response`].
    ///
    /// # Errors
    /// Returns error if the link fails or the kernel breaks the protocol.
    pub fn process_response(&mut self) -> Result<(), SessionError> {
        loop {
            match self.poll_response()? {
                Turn::Finished => return Ok(()),
                Turn::Pending => thread::sleep(POLL_INTERVAL),
            }
        }
    }

    /// Handle every packet that is ready without blocking.
    ///
    /// Returns `Turn::Pending` when the link has nothing ready yet; that is
    /// not an error and the caller polls again later.
    ///
    /// # Errors
    /// Returns error if the link fails or the kernel breaks the protocol.
    /// Pending messages are flushed before the error is returned.
    pub fn poll_response(&mut self) -> Result<Turn, SessionError> {
        self.ensure_connected()?;
        loop {
            match self.link_ready() {
                Ok(true) => {}
                Ok(false) => return Ok(Turn::Pending),
                Err(err) => return Err(self.abort_turn(err)),
            }

            match self.dispatch_next() {
                Ok(false) => {}
                Ok(true) => {
                    self.running = false;
                    self.drain_messages()?;
                    self.out.flush()?;
                    return Ok(Turn::Finished);
                }
                Err(err) => return Err(self.abort_turn(err)),
            }
        }
    }

    fn abort_turn(&mut self, err: SessionError) -> SessionError {
        self.running = false;
        if let Err(drain_err) = self.drain_messages() {
            tracing::warn!(error = %drain_err, "failed to flush pending messages");
        }
        self.images.discard_open();
        if let Err(flush_err) = self.out.flush() {
            tracing::debug!(error = %flush_err, "failed to flush output");
        }
        tracing::warn!(error = %err, "turn aborted");
        err
    }

    fn dispatch_next(&mut self) -> Result<bool, SessionError> {
        let tag = self.next_packet()?;
        tracing::trace!(packet = %tag, "dispatching");

        match tag {
            PacketTag::InputName => self.on_input_name(),
            PacketTag::Input => self.on_input(),
            PacketTag::OutputName => self.on_output_name(),
            PacketTag::ReturnText => self.on_return_text(),
            PacketTag::Return | PacketTag::ReturnExpr => self.on_return(),
            PacketTag::Text => self.on_text(),
            PacketTag::Message => self.on_message(),
            PacketTag::Syntax => self.on_syntax(),
            PacketTag::InputStr => self.on_input_str(),
            PacketTag::Menu => self.on_menu(),
            PacketTag::Display => self.on_display(),
            PacketTag::DisplayEnd => self.on_display_end(),
            PacketTag::Suspend => self.on_suspend(),
            PacketTag::Resume => self.on_resume(),
            PacketTag::BeginDialog => self.on_begin_dialog(),
            PacketTag::EndDialog => self.on_end_dialog(),
            PacketTag::Illegal => Ok(true),
            PacketTag::Unknown(code) => {
                tracing::debug!(code, "ignoring unknown packet");
                Ok(false)
            }
        }
    }

    /// Print or discard every cached message.
    ///
    /// Messages belonging to an input the user is about to continue are
    /// discarded.
    pub(crate) fn drain_messages(&mut self) -> Result<(), SessionError> {
        if self.messages.is_empty() {
            return Ok(());
        }
        let suppress = self.continue_input;
        for message in self.messages.drain() {
            if suppress {
                tracing::trace!(tag = %message.tag, "discarding message of incomplete input");
                continue;
            }
            message.render(&self.input, &mut self.out)?;
        }
        Ok(())
    }

    // In[n]:= prompt.
    fn on_input_name(&mut self) -> Result<bool, SessionError> {
        if !self.continue_input {
            write!(self.out, "\n\n")?;
        }
        if self.config.show_in_out_strings && self.config.main_loop {
            self.kernel_prompt = self.read_string()?;
        }
        Ok(true)
    }

    // The kernel asks for more expression input.
    fn on_input(&mut self) -> Result<bool, SessionError> {
        self.kernel_prompt = self.read_string()?;
        Ok(true)
    }

    // Out[n]= prompt.
    fn on_output_name(&mut self) -> Result<bool, SessionError> {
        self.drain_messages()?;
        writeln!(self.out)?;
        if self.config.show_in_out_strings {
            self.output_prompt = self.read_string()?;
            write!(self.out, "{}", self.output_prompt)?;
        }
        Ok(false)
    }

    fn on_return_text(&mut self) -> Result<bool, SessionError> {
        let text = self.read_string()?;
        write!(self.out, "\n{text}")?;
        Ok(false)
    }

    /// Outside the main loop this packet ends the turn; inside it more
    /// bookkeeping packets follow.
    fn on_return(&mut self) -> Result<bool, SessionError> {
        self.drain_messages()?;
        let text = self.read_string()?;
        writeln!(self.out, "{text}")?;
        Ok(!self.config.main_loop)
    }

    fn on_text(&mut self) -> Result<bool, SessionError> {
        if !self.continue_input {
            let text = self.read_string()?;
            write!(self.out, "{text}")?;
        }
        Ok(false)
    }

    /// Syntax messages are cached until the turn ends so that an
    /// incomplete-input notice can suppress them. Other messages flush the
    /// cache and print straight away.
    fn on_message(&mut self) -> Result<bool, SessionError> {
        let name = self.read_symbol()?;
        let tag = self.read_string()?;

        if name == SYNTAX_SYMBOL {
            if tag == INCOMPLETE_TAG {
                self.continue_input = true;
            }
            self.next_packet()?;
            let text = self.read_string()?;
            self.messages.enqueue(PendingMessage::new(name, tag, text));
        } else if !self.continue_input {
            self.drain_messages()?;
            self.next_packet()?;
            let text = self.read_string()?;
            writeln!(self.out, "\n{text}")?;
        }
        Ok(false)
    }

    /// Position of a syntax error within the last input. Never an error for
    /// the user; a position with nothing to attach to is dropped.
    fn on_syntax(&mut self) -> Result<bool, SessionError> {
        let read = self.link_mut()?.get_integer();
        match read {
            Ok(position) => match u32::try_from(position) {
                Ok(position) => {
                    self.messages.attach_position_to_last(position);
                }
                Err(_) => tracing::debug!(position, "ignoring negative syntax position"),
            },
            Err(err) => {
                self.error_check()?;
                tracing::warn!(error = %err, "syntax packet without a position");
            }
        }
        Ok(false)
    }

    // Request for a line of raw text.
    fn on_input_str(&mut self) -> Result<bool, SessionError> {
        let text = self.read_string()?;
        write!(self.out, "{text}")?;
        self.input_mode = InputMode::Text;
        Ok(true)
    }

    /// Interrupt menu. Selector 0 announces a text packet with the menu body.
    fn on_menu(&mut self) -> Result<bool, SessionError> {
        let selector = self.read_integer()?;
        self.kernel_prompt = self.read_string()?;
        self.input_mode = InputMode::Text;

        if selector == 0 {
            let tag = self.next_packet()?;
            if tag != PacketTag::Text {
                return Err(SessionError::Protocol(format!(
                    "menu text expected but packet {tag} received"
                )));
            }
            let text = self.read_string()?;
            write!(self.out, "{text}")?;
        } else {
            writeln!(self.out)?;
        }
        Ok(true)
    }

    fn on_display(&mut self) -> Result<bool, SessionError> {
        let chunk = self.read_string()?;
        self.images.append(&chunk);
        Ok(false)
    }

    fn on_display_end(&mut self) -> Result<bool, SessionError> {
        let chunk = self.read_string()?;
        self.images.finish(&chunk);
        Ok(false)
    }

    // Another front end took over the kernel.
    fn on_suspend(&mut self) -> Result<bool, SessionError> {
        self.link_mut()?.new_packet();
        writeln!(self.out, "--suspended--")?;
        Ok(true)
    }

    fn on_resume(&mut self) -> Result<bool, SessionError> {
        writeln!(self.out, "--resumed--")?;
        self.link_mut()?.new_packet();
        Ok(false)
    }

    fn on_begin_dialog(&mut self) -> Result<bool, SessionError> {
        let level = self.read_integer()?;
        writeln!(self.out, "entering dialog:{level}")?;
        Ok(false)
    }

    fn on_end_dialog(&mut self) -> Result<bool, SessionError> {
        let level = self.read_integer()?.saturating_sub(1);
        writeln!(self.out, "leaving dialog:{level}")?;
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use mathline_core::{ScriptedLink, SessionConfig, Token, link::code};

    use super::*;

    fn with_script(
        config: SessionConfig,
        script: impl FnOnce(ScriptedLink) -> ScriptedLink,
    ) -> Session<ScriptedLink, Vec<u8>> {
        let link = script(ScriptedLink::new().startup("In[1]:= "));
        Session::connect(config, link, Vec::new()).unwrap()
    }

    fn output(session: &Session<ScriptedLink, Vec<u8>>) -> String {
        String::from_utf8(session.writer().clone()).unwrap()
    }

    #[test]
    fn test_headless_return_ends_turn() {
        let mut session = Session::connect(
            SessionConfig::headless(),
            ScriptedLink::new()
                .startup("In[1]:= ")
                .text_packet(PacketTag::Return, "3"),
            Vec::new(),
        )
        .unwrap();

        session.evaluate("1+2").unwrap();
        session.process_response().unwrap();

        assert_eq!(output(&session), "3\n");
        assert_eq!(session.link().unwrap().remaining(), 0);
        assert!(!session.is_running().unwrap());
    }

    #[test]
    fn test_main_loop_turn_ends_at_input_name() {
        let mut session = Session::connect(
            SessionConfig::default(),
            ScriptedLink::new()
                .startup("In[1]:= ")
                .text_packet(PacketTag::OutputName, "Out[1]= ")
                .text_packet(PacketTag::Return, "4")
                .text_packet(PacketTag::InputName, "In[2]:= "),
            Vec::new(),
        )
        .unwrap();

        session.evaluate("2+2").unwrap();
        session.process_response().unwrap();

        assert_eq!(output(&session), "\nOut[1]= 4\n\n\n");
        assert_eq!(session.output_prompt(), "Out[1]= ");
        assert_eq!(session.kernel_prompt(), "In[2]:= ");
    }

    #[test]
    fn test_syntax_error_points_at_position() {
        let mut session = Session::connect(
            SessionConfig::default(),
            ScriptedLink::new()
                .startup("In[1]:= ")
                .syntax_error("sntxf", "Syntax::sntxf: bad input", 2)
                .text_packet(PacketTag::InputName, "In[1]:= "),
            Vec::new(),
        )
        .unwrap();

        session.evaluate("1+*2").unwrap();
        session.process_response().unwrap();

        assert_eq!(
            output(&session),
            "\n\n\nSyntax::sntxf: bad input\n1+*2\n..^ Syntax Error.\n\n"
        );
        assert_eq!(session.pending_messages(), 0);
    }

    #[test]
    fn test_incomplete_input_is_silent_and_continues() {
        let mut session = Session::connect(
            SessionConfig::default(),
            ScriptedLink::new()
                .startup("In[1]:= ")
                .syntax_error("sntxi", "Syntax::sntxi: Incomplete expression", 3)
                .text_packet(PacketTag::InputName, "In[1]:= "),
            Vec::new(),
        )
        .unwrap();

        session.evaluate("1+(").unwrap();
        session.process_response().unwrap();

        assert_eq!(output(&session), "");
        assert!(session.is_continuing());
        assert_eq!(session.pending_messages(), 0);

        session.evaluate("2)").unwrap();
        assert_eq!(session.last_input(), "1+(2)");
        assert!(!session.is_continuing());
        assert_eq!(session.link().unwrap().sent_strings()[2], "1+(2)");
    }

    #[test]
    fn test_other_message_prints_immediately() {
        let mut session = with_script(SessionConfig::headless(), |link| {
            link.message("General", "ovfl", "General::ovfl: Overflow occurred.")
                .text_packet(PacketTag::Return, "Overflow[]")
        });

        session.evaluate("Exp[10^20]").unwrap();
        session.process_response().unwrap();

        assert_eq!(
            output(&session),
            "\nGeneral::ovfl: Overflow occurred.\nOverflow[]\n"
        );
    }

    #[test]
    fn test_syntax_packet_with_empty_cache() {
        let mut session = with_script(SessionConfig::headless(), |link| {
            link.integer_packet(PacketTag::Syntax, 4)
                .text_packet(PacketTag::Return, "x")
        });

        session.evaluate("x").unwrap();
        session.process_response().unwrap();

        assert_eq!(output(&session), "x\n");
        assert!(session.is_connected());
    }

    #[test]
    fn test_display_chunks_form_image() {
        let mut session = with_script(SessionConfig::headless(), |link| {
            link.text_packet(PacketTag::Display, "A")
                .text_packet(PacketTag::Display, "B")
                .text_packet(PacketTag::DisplayEnd, "C")
                .text_packet(PacketTag::Return, "-Graphics-")
        });

        session.evaluate("Plot[x, {x, 0, 1}]").unwrap();
        session.process_response().unwrap();

        assert!(!session.image_in_progress());
        assert_eq!(session.pop_image().unwrap().as_str(), Some("ABC"));
        assert!(session.pop_image().is_none());
    }

    #[test]
    fn test_menu_with_text_body() {
        let mut session = with_script(SessionConfig::default(), |link| {
            link.packet(
                PacketTag::Menu,
                [
                    Token::Integer(0),
                    Token::string("Interrupt> "),
                ],
            )
            .text_packet(PacketTag::Text, "Interrupt options:\n")
        });

        session.evaluate("Do[1, {10^9}]").unwrap();
        session.process_response().unwrap();

        assert_eq!(output(&session), "Interrupt options:\n");
        assert_eq!(session.kernel_prompt(), "Interrupt> ");
        assert_eq!(session.input_mode(), InputMode::Text);
    }

    #[test]
    fn test_menu_without_text_is_protocol_error() {
        let mut session = with_script(SessionConfig::default(), |link| {
            link.packet(
                PacketTag::Menu,
                [
                    Token::Integer(0),
                    Token::string("Interrupt> "),
                ],
            )
            .text_packet(PacketTag::Return, "oops")
        });

        session.evaluate("x").unwrap();
        let err = session.process_response().unwrap_err();

        assert!(matches!(err, SessionError::Protocol(_)));
        assert!(session.is_connected());
    }

    #[test]
    fn test_menu_with_selector() {
        let mut session = with_script(SessionConfig::default(), |link| {
            link.packet(
                PacketTag::Menu,
                [
                    Token::Integer(1),
                    Token::string("Choice? "),
                ],
            )
        });

        session.evaluate("x").unwrap();
        session.process_response().unwrap();
        assert_eq!(output(&session), "\n");
        assert_eq!(session.kernel_prompt(), "Choice? ");
    }

    #[test]
    fn test_input_string_request_switches_to_text() {
        let mut session = with_script(SessionConfig::default(), |link| {
            link.text_packet(PacketTag::InputStr, "name? ")
        });

        session.evaluate("InputString[\"name? \"]").unwrap();
        session.process_response().unwrap();

        assert_eq!(output(&session), "name? ");
        assert_eq!(session.input_mode(), InputMode::Text);
    }

    #[test]
    fn test_dialog_levels() {
        let mut session = with_script(SessionConfig::headless(), |link| {
            link.integer_packet(PacketTag::BeginDialog, 2)
                .integer_packet(PacketTag::EndDialog, 2)
                .text_packet(PacketTag::Return, "Null")
        });

        session.evaluate("Dialog[]").unwrap();
        session.process_response().unwrap();

        assert_eq!(
            output(&session),
            "entering dialog:2\nleaving dialog:1\nNull\n"
        );
    }

    #[test]
    fn test_suspend_and_resume() {
        let mut session = with_script(SessionConfig::headless(), |link| {
            link.packet(PacketTag::Resume, [])
                .packet(PacketTag::Suspend, [])
        });

        session.evaluate("x").unwrap();
        session.process_response().unwrap();
        assert_eq!(output(&session), "--resumed--\n--suspended--\n");
    }

    #[test]
    fn test_unknown_packet_is_skipped() {
        let mut session = with_script(SessionConfig::headless(), |link| {
            link.text_packet(PacketTag::Unknown(42), "?")
                .text_packet(PacketTag::Return, "1")
        });

        session.evaluate("1").unwrap();
        session.process_response().unwrap();
        assert_eq!(output(&session), "1\n");
    }

    #[test]
    fn test_poll_reports_pending_while_stalled() {
        let mut session = with_script(SessionConfig::headless(), |link| {
            link.stall().text_packet(PacketTag::Return, "1")
        });

        session.evaluate("1").unwrap();
        assert_eq!(session.poll_response().unwrap(), Turn::Pending);
        assert_eq!(session.poll_response().unwrap(), Turn::Finished);
    }

    #[test]
    fn test_kernel_failure_disconnects() {
        let mut session = with_script(SessionConfig::headless(), |link| {
            link.failure(code::DEAD, "kernel died")
        });

        session.evaluate("1").unwrap();
        let err = session.process_response().unwrap_err();

        assert!(matches!(err, SessionError::KernelError { .. }));
        assert!(!session.is_connected());
        assert!(matches!(
            session.evaluate("2"),
            Err(SessionError::NotConnected)
        ));
        assert!(matches!(
            session.poll_response(),
            Err(SessionError::NotConnected)
        ));
    }

    #[test]
    fn test_failure_flushes_pending_messages() {
        let mut session = with_script(SessionConfig::default(), |link| {
            link.syntax_error("sntxf", "Syntax::sntxf: bad", 0)
                .failure(code::CLOSED, "closed")
        });

        session.evaluate("*").unwrap();
        assert!(session.process_response().is_err());
        assert_eq!(output(&session), "\nSyntax::sntxf: bad\n*\n^ Syntax Error.\n\n");
        assert_eq!(session.pending_messages(), 0);
    }
}
