//! Kernel session: connection lifecycle, input submission and link checks.

use std::io::{self, Write};

use mathline_core::{
    Image, ImageAccumulator, Link, LinkConfig, LinkError, MessageCache, PacketTag, SessionConfig,
    packet::{ENTER_TEXT, EVALUATE_AS_STRING, TEXT},
};

use crate::error::{ConnectError, SessionError};

/// How the next submission is wrapped for the kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputMode {
    /// Kernel-evaluable code.
    #[default]
    Expression,
    /// Raw text answering a kernel input request. Reverts after one send.
    Text,
}

/// Progress of the kernel's turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    /// The link has nothing ready yet; poll again later.
    Pending,
    /// The kernel is ready for new input.
    Finished,
}

/// An interactive session with a kernel.
///
/// Kernel output is written to `W` as packets arrive. Completed images are
/// queued and handed out through [`Session::pop_image`].
pub struct Session<L: Link, W: Write = io::Stdout> {
    pub(crate) config: SessionConfig,
    pub(crate) link: Option<L>,
    pub(crate) out: W,
    pub(crate) connected: bool,
    pub(crate) running: bool,
    pub(crate) input_mode: InputMode,
    /// Set when the kernel reported the last input as incomplete.
    pub(crate) continue_input: bool,
    /// Last input sent, kept for locating syntax errors.
    pub(crate) input: String,
    pub(crate) kernel_prompt: String,
    pub(crate) output_prompt: String,
    pub(crate) messages: MessageCache,
    pub(crate) images: ImageAccumulator,
}

impl<L: Link, W: Write> Session<L, W> {
    /// Open a link with `open`, then connect over it.
    ///
    /// # Errors
    /// Returns error if no link name is configured, the link cannot be
    /// opened, or connecting fails.
    pub fn open<F, E>(config: SessionConfig, out: W, open: F) -> Result<Self, ConnectError>
    where
        F: FnOnce(&LinkConfig) -> Result<L, E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        if config.link.name.trim().is_empty() {
            return Err(ConnectError::NoLinkName);
        }
        let link = open(&config.link).map_err(|e| ConnectError::Open(e.into()))?;
        Self::connect(config, link, out)
    }

    /// Activate `link` and initialize the kernel.
    ///
    /// The kernel must greet with an input prompt; the configured
    /// `$PrePrint` is installed afterwards.
    ///
    /// # Errors
    /// Returns error if activation or kernel initialization fails.
    pub fn connect(config: SessionConfig, mut link: L, out: W) -> Result<Self, ConnectError> {
        if !link.activate() {
            let status = link.last_error();
            link.close();
            return Err(ConnectError::Activate {
                code: status.code,
                message: status.message.unwrap_or_default(),
            });
        }

        let mut session = Self {
            config,
            link: Some(link),
            out,
            connected: true,
            running: false,
            input_mode: InputMode::Expression,
            continue_input: false,
            input: String::new(),
            kernel_prompt: String::new(),
            output_prompt: String::new(),
            messages: MessageCache::new(),
            images: ImageAccumulator::new(),
        };
        tracing::info!(link = %session.config.link.name, "link activated");

        session.initialize_kernel()?;
        Ok(session)
    }

    fn initialize_kernel(&mut self) -> Result<(), SessionError> {
        let tag = self.next_packet()?;
        if tag != PacketTag::InputName {
            return Err(SessionError::Protocol(format!(
                "kernel sent an unexpected packet ({tag}) during startup"
            )));
        }
        self.kernel_prompt = self.read_string()?;

        if let Some(function) = self.config.pre_print.clone() {
            self.set_pre_print(&function)?;
        }
        Ok(())
    }

    /// Close the link. Safe to call more than once.
    pub fn disconnect(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.close();
            tracing::info!("disconnected from kernel");
        }
        self.connected = false;
        self.running = false;
    }

    /// Whether the link is still up.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Submit user input.
    ///
    /// Input following an incomplete submission is appended to it. The
    /// wrapping depends on the input mode and on main-loop mode; text mode
    /// applies to this one submission only.
    ///
    /// # Errors
    /// Returns error if the session is disconnected or the link fails.
    pub fn evaluate(&mut self, text: &str) -> Result<(), SessionError> {
        self.ensure_connected()?;
        self.record_input(text);

        let heads: &'static [&'static str] = match self.input_mode {
            InputMode::Expression if self.config.main_loop => &[ENTER_TEXT],
            InputMode::Expression => &EVALUATE_AS_STRING,
            InputMode::Text => &[TEXT],
        };
        tracing::debug!(mode = ?self.input_mode, input = %self.input, "evaluating");
        self.input_mode = InputMode::Expression;

        self.send(heads)?;
        self.running = true;
        Ok(())
    }

    /// Evaluate outside the main loop regardless of configuration.
    ///
    /// With `consume_return` the kernel's answer packet is fetched and
    /// discarded; otherwise the session is left running.
    ///
    /// # Errors
    /// Returns error if the session is disconnected or the link fails.
    pub fn evaluate_without_main_loop(
        &mut self,
        text: &str,
        consume_return: bool,
    ) -> Result<(), SessionError> {
        self.ensure_connected()?;
        self.record_input(text);
        self.send(&EVALUATE_AS_STRING)?;

        if consume_return {
            self.next_packet()?;
        } else {
            self.running = true;
        }
        Ok(())
    }

    /// Install `function` as the kernel's `$PrePrint`.
    ///
    /// # Errors
    /// Returns error if the evaluation fails.
    pub fn set_pre_print(&mut self, function: &str) -> Result<(), SessionError> {
        self.evaluate_without_main_loop(&format!("$PrePrint = {function}"), true)
    }

    /// Evaluate `expression` outside the main loop and return the result text.
    ///
    /// # Errors
    /// Returns error if the kernel answers with anything but a return packet.
    pub fn evaluated(&mut self, expression: &str) -> Result<String, SessionError> {
        self.evaluate_without_main_loop(expression, false)?;
        self.running = false;

        let tag = self.next_packet()?;
        if tag != PacketTag::Return {
            return Err(SessionError::Protocol(format!(
                "kernel sent an unexpected packet ({tag}) in response to evaluating {expression}"
            )));
        }
        self.read_string()
    }

    /// Kernel version string.
    ///
    /// # Errors
    /// Returns error if the evaluation fails.
    pub fn kernel_version(&mut self) -> Result<String, SessionError> {
        self.evaluated("$Version")
    }

    /// Whether a turn is in progress and the kernel has nothing ready yet.
    ///
    /// # Errors
    /// Returns error if the link reports a failure.
    pub fn is_running(&mut self) -> Result<bool, SessionError> {
        if !self.running {
            return Ok(false);
        }
        if self.link_ready()? {
            self.running = false;
        }
        Ok(self.running)
    }

    /// Check the link for errors.
    ///
    /// A nonzero error code disconnects the session.
    ///
    /// # Errors
    /// Returns `LinkSevered` if the link is gone, or `KernelError` if it
    /// reports a failure.
    pub fn error_check(&mut self) -> Result<(), SessionError> {
        let status = self.link_mut()?.last_error();
        if status.is_ok() {
            return Ok(());
        }
        tracing::error!(code = status.code, message = ?status.message, "link error");
        self.disconnect();
        Err(SessionError::kernel(status))
    }

    /// Take the oldest completed image.
    pub fn pop_image(&mut self) -> Option<Image> {
        self.images.pop()
    }

    /// Prompt to show the user: custom prefix plus kernel prompt.
    ///
    /// While continuing an incomplete input, all but the last character are
    /// blanked so the continuation lines up.
    #[must_use]
    pub fn user_prompt(&self) -> String {
        let prompt = format!("{}{}", self.config.prompt, self.kernel_prompt);
        if !self.continue_input {
            return prompt;
        }
        let count = prompt.chars().count();
        prompt
            .chars()
            .enumerate()
            .map(|(i, c)| if i + 1 < count { ' ' } else { c })
            .collect()
    }

    /// Forget the kernel prompt once it has been shown.
    pub fn clear_kernel_prompt(&mut self) {
        self.kernel_prompt.clear();
    }

    /// Prompt most recently supplied by the kernel.
    #[must_use]
    pub fn kernel_prompt(&self) -> &str {
        &self.kernel_prompt
    }

    /// Last `Out[n]=` prompt.
    #[must_use]
    pub fn output_prompt(&self) -> &str {
        &self.output_prompt
    }

    /// Input text last sent, including appended continuations.
    #[must_use]
    pub fn last_input(&self) -> &str {
        &self.input
    }

    #[must_use]
    pub const fn input_mode(&self) -> InputMode {
        self.input_mode
    }

    /// Whether the next input continues an incomplete one.
    #[must_use]
    pub const fn is_continuing(&self) -> bool {
        self.continue_input
    }

    /// Number of diagnostics awaiting a print-or-discard decision.
    #[must_use]
    pub fn pending_messages(&self) -> usize {
        self.messages.len()
    }

    /// Whether an image is partially received.
    #[must_use]
    pub const fn image_in_progress(&self) -> bool {
        self.images.is_open()
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The underlying link, if still connected.
    #[must_use]
    pub const fn link(&self) -> Option<&L> {
        self.link.as_ref()
    }

    #[must_use]
    pub const fn writer(&self) -> &W {
        &self.out
    }

    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.out
    }

    pub(crate) fn ensure_connected(&self) -> Result<(), SessionError> {
        if self.connected && self.link.is_some() {
            Ok(())
        } else {
            Err(SessionError::NotConnected)
        }
    }

    pub(crate) fn link_mut(&mut self) -> Result<&mut L, SessionError> {
        self.link.as_mut().ok_or(SessionError::LinkSevered)
    }

    /// Non-blocking readiness check; runs the error check when not ready.
    pub(crate) fn link_ready(&mut self) -> Result<bool, SessionError> {
        let link = self.link_mut()?;
        if link.flush() && link.is_ready() {
            return Ok(true);
        }
        self.error_check()?;
        Ok(false)
    }

    /// Fetch the next packet tag, skipping the rest of the current one.
    pub(crate) fn next_packet(&mut self) -> Result<PacketTag, SessionError> {
        if !self.link_mut()?.new_packet() {
            self.error_check()?;
        }
        let tag = self.link_mut()?.next_packet();
        if tag == PacketTag::Illegal {
            self.error_check()?;
        }
        Ok(tag)
    }

    pub(crate) fn read_string(&mut self) -> Result<String, SessionError> {
        let read = self.link_mut()?.get_string();
        self.checked(read, "string")
    }

    pub(crate) fn read_symbol(&mut self) -> Result<String, SessionError> {
        let read = self.link_mut()?.get_symbol();
        self.checked(read, "symbol")
    }

    pub(crate) fn read_integer(&mut self) -> Result<i32, SessionError> {
        let read = self.link_mut()?.get_integer();
        self.checked(read, "integer")
    }

    fn checked<T>(&mut self, read: Result<T, LinkError>, what: &str) -> Result<T, SessionError> {
        match read {
            Ok(value) => Ok(value),
            Err(err) => {
                self.error_check()?;
                Err(SessionError::Protocol(format!(
                    "{what} expected but not read from the kernel: {err}"
                )))
            }
        }
    }

    fn record_input(&mut self, text: &str) {
        if self.continue_input {
            self.input.push_str(text);
            self.continue_input = false;
        } else {
            text.clone_into(&mut self.input);
        }
    }

    fn send(&mut self, heads: &[&str]) -> Result<(), SessionError> {
        let link = self.link.as_mut().ok_or(SessionError::LinkSevered)?;
        let written = heads
            .iter()
            .try_for_each(|head| link.put_function(head, 1))
            .and_then(|()| link.put_string(&self.input))
            .and_then(|()| link.end_message());

        self.error_check()?;
        written.map_err(SessionError::from)
    }
}

impl<L: Link, W: Write> Drop for Session<L, W> {
    fn drop(&mut self) {
        self.disconnect();
    }
}
