//! Read-evaluate-print loop over a session.

use std::io::{self, Write};

use mathline_core::Link;

use crate::{error::SessionError, session::Session};

/// Inputs that end the loop instead of being sent to the kernel.
const QUIT_COMMANDS: [&str; 3] = ["Exit", "Exit[]", "Quit"];

/// Source of user input lines.
pub trait LineReader {
    /// Show `prompt` and read one line without its terminator.
    ///
    /// Returns `Ok(None)` at end of input.
    ///
    /// # Errors
    /// Returns error if the terminal cannot be read.
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

impl<R: LineReader + ?Sized> LineReader for &mut R {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        (**self).read_line(prompt)
    }
}

/// Why the loop stopped.
#[derive(Debug)]
pub enum ExitReason {
    /// The user asked to quit.
    Quit,
    /// The input source ran dry.
    EndOfInput,
    /// Reading input failed.
    Input(io::Error),
    /// The session failed; the error was already shown to the user.
    Failed(SessionError),
}

impl ExitReason {
    /// Whether the loop ended without a failure.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        matches!(self, Self::Quit | Self::EndOfInput)
    }
}

/// Whether `line` is a request to leave the loop.
#[must_use]
pub fn is_quit_command(line: &str) -> bool {
    QUIT_COMMANDS.contains(&line.trim())
}

/// Interactive loop driving a session from a [`LineReader`].
pub struct Repl<'s, L: Link, W: Write> {
    session: &'s mut Session<L, W>,
    turns: usize,
}

impl<'s, L: Link, W: Write> Repl<'s, L, W> {
    pub fn new(session: &'s mut Session<L, W>) -> Self {
        Self { session, turns: 0 }
    }

    /// Completed turns so far.
    #[must_use]
    pub const fn turns(&self) -> usize {
        self.turns
    }

    /// Run until the user quits, input ends, or the session fails.
    ///
    /// `after_turn` sees the session after every completed kernel turn, for
    /// example to collect images.
    pub fn run<R, F>(&mut self, mut reader: R, mut after_turn: F) -> ExitReason
    where
        R: LineReader,
        F: FnMut(&mut Session<L, W>),
    {
        loop {
            if let Err(err) = self.session.writer_mut().flush() {
                return ExitReason::Failed(err.into());
            }

            let prompt = self.session.user_prompt();
            let line = match reader.read_line(&prompt) {
                Ok(Some(line)) => line,
                Ok(None) => {
                    tracing::debug!("end of input");
                    return ExitReason::EndOfInput;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to read input");
                    return ExitReason::Input(err);
                }
            };
            self.session.clear_kernel_prompt();

            if !self.session.is_continuing() && is_quit_command(&line) {
                tracing::debug!("quit requested");
                return ExitReason::Quit;
            }

            if let Err(err) = self.turn(&line) {
                let out = self.session.writer_mut();
                if let Err(write_err) = writeln!(out, "{err}").and_then(|()| out.flush()) {
                    tracing::debug!(error = %write_err, "failed to report turn error");
                }
                return ExitReason::Failed(err);
            }
            self.turns += 1;
            after_turn(&mut *self.session);
        }
    }

    fn turn(&mut self, line: &str) -> Result<(), SessionError> {
        self.session.evaluate(line)?;
        self.session.process_response()
    }
}
