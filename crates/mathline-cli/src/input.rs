//! User input: a line editor with history, or plain line reads.

use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

use mathline_session::LineReader;
use rustyline::{Config, DefaultEditor, error::ReadlineError};

/// Line editor with emacs-style keys and a bounded history.
pub struct EditorReader {
    editor: DefaultEditor,
    history: Option<PathBuf>,
}

impl EditorReader {
    /// Create an editor keeping at most `max_history` lines.
    ///
    /// History is loaded from and saved to the user's data directory when
    /// one exists.
    ///
    /// # Errors
    /// Returns error if the terminal cannot be set up.
    pub fn new(max_history: usize) -> rustyline::Result<Self> {
        let config = Config::builder()
            .max_history_size(max_history)?
            .auto_add_history(false)
            .build();
        let mut editor = DefaultEditor::with_config(config)?;

        let history = (max_history > 0)
            .then(history_path)
            .flatten();
        if let Some(path) = &history {
            if let Err(err) = editor.load_history(path) {
                tracing::debug!(path = %path.display(), error = %err, "no input history loaded");
            }
        }
        Ok(Self { editor, history })
    }

    /// Write the history back to disk.
    pub fn save_history(&mut self) {
        let Some(path) = &self.history else {
            return;
        };
        if let Some(dir) = path.parent() {
            if let Err(err) = std::fs::create_dir_all(dir) {
                tracing::warn!(path = %dir.display(), error = %err, "cannot create history directory");
                return;
            }
        }
        if let Err(err) = self.editor.save_history(path) {
            tracing::warn!(path = %path.display(), error = %err, "failed to save input history");
        }
    }
}

impl LineReader for EditorReader {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            // Ctrl-C abandons the line.
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(ReadlineError::Eof) => Ok(None),
            Err(ReadlineError::Io(err)) => Err(err),
            Err(err) => Err(io::Error::other(err.to_string())),
        }
    }
}

fn history_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("mathline").join("history.txt"))
}

/// Plain line reads with only the terminal's own editing.
pub struct PlainReader<R, W> {
    input: R,
    output: W,
}

impl PlainReader<io::StdinLock<'static>, io::Stdout> {
    /// Read from stdin, prompting on stdout.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> PlainReader<R, W> {
    pub const fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> LineReader for PlainReader<R, W> {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => Ok(None),
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\n', '\r']).len();
                line.truncate(trimmed);
                Ok(Some(line))
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Ok(Some(String::new())),
            Err(err) => Err(err),
        }
    }
}
