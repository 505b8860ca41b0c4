//! Command-line options.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use mathline_core::{LineEditing, SessionConfig};

/// MathLine: a textual interface to a symbolic-computation kernel.
#[derive(Parser, Debug)]
#[command(name = "mathline")]
#[command(about = "A free and open source textual interface to Mathematica")]
#[command(version)]
pub struct Args {
    /// Establish that the connection to the kernel works, then exit
    #[arg(short, long)]
    pub check: bool,

    /// Use the kernel's main loop, which keeps session history in In[#]
    /// and Out[#] [default: true]
    #[arg(short, long, value_name = "BOOL")]
    pub mainloop: Option<bool>,

    /// Prompt shown before the kernel's input prompt
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Print the "In[#]:=" and "Out[#]=" strings [default: true]
    #[arg(short, long, value_name = "BOOL")]
    pub inoutstrings: Option<bool>,

    /// Command line that starts the kernel [default: "math -mathlink"]
    #[arg(short = 'n', long)]
    pub linkname: Option<String>,

    /// Link mode [default: launch]
    #[arg(short, long)]
    pub linkmode: Option<String>,

    /// Read input with a plain line reader instead of the line editor
    #[arg(short = 'g', long, value_name = "BOOL")]
    pub usegetline: Option<bool>,

    /// Maximum number of lines kept in the input history [default: 10]
    #[arg(short = 'x', long, value_name = "N")]
    pub maxhistory: Option<usize>,

    /// Directory to save images (PostScript) the kernel sends
    #[arg(long, value_name = "DIR")]
    pub image_dir: Option<PathBuf>,

    /// Session configuration file (JSON); options given here override it
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log debug events to stderr
    #[arg(short, long)]
    pub debug: bool,
}

impl Args {
    /// Build the session configuration.
    ///
    /// # Errors
    /// Returns error if the configuration file cannot be read or parsed.
    pub fn session_config(&self) -> anyhow::Result<SessionConfig> {
        let base = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("failed to parse {}", path.display()))?
            }
            None => SessionConfig::default(),
        };
        Ok(self.apply(base))
    }

    fn apply(&self, mut config: SessionConfig) -> SessionConfig {
        if let Some(main_loop) = self.mainloop {
            config.main_loop = main_loop;
        }
        if let Some(prompt) = &self.prompt {
            config.prompt.clone_from(prompt);
        }
        if let Some(show) = self.inoutstrings {
            config.show_in_out_strings = show;
        }
        if let Some(name) = non_empty(self.linkname.as_deref(), "linkname") {
            config.link.name = name;
        }
        if let Some(mode) = non_empty(self.linkmode.as_deref(), "linkmode") {
            config.link.mode = mode;
        }
        if let Some(plain) = self.usegetline {
            config.line_editing = if plain {
                LineEditing::Plain
            } else {
                LineEditing::Editor
            };
        }
        if let Some(max) = self.maxhistory {
            config.max_history = max;
        }
        config
    }
}

fn non_empty(value: Option<&str>, option: &str) -> Option<String> {
    match value {
        Some(v) if v.trim().is_empty() => {
            tracing::warn!(option, "option cannot be empty. Ignoring.");
            None
        }
        other => other.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use mathline_core::config::{DEFAULT_LINK_MODE, DEFAULT_LINK_NAME};
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("mathline").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).session_config().unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_options_override() {
        let args = parse(&[
            "--mainloop",
            "false",
            "-p",
            "> ",
            "--inoutstrings=false",
            "-n",
            "wolfram -wstp",
            "--usegetline",
            "true",
            "-x",
            "25",
        ]);
        let config = args.session_config().unwrap();

        assert!(!config.main_loop);
        assert!(!config.show_in_out_strings);
        assert_eq!(config.prompt, "> ");
        assert_eq!(config.link.name, "wolfram -wstp");
        assert_eq!(config.link.mode, DEFAULT_LINK_MODE);
        assert_eq!(config.line_editing, LineEditing::Plain);
        assert_eq!(config.max_history, 25);
    }

    #[test]
    fn test_empty_link_options_are_ignored() {
        let config = parse(&["--linkname", "", "--linkmode", " "])
            .session_config()
            .unwrap();
        assert_eq!(config.link.name, DEFAULT_LINK_NAME);
        assert_eq!(config.link.mode, DEFAULT_LINK_MODE);
    }

    #[test]
    fn test_negative_history_is_rejected() {
        let result = Args::try_parse_from(["mathline", "--maxhistory", "-1"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_file_under_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"main_loop": false, "prompt": "math> ", "max_history": 3}}"#).unwrap();
        let path = file.path().to_str().unwrap();

        let config = parse(&["--config", path, "-x", "7"]).session_config().unwrap();

        assert!(!config.main_loop);
        assert_eq!(config.prompt, "math> ");
        assert_eq!(config.max_history, 7);
    }

    #[test]
    fn test_bad_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "main_loop = false").unwrap();
        let path = file.path().to_str().unwrap();

        let err = parse(&["--config", path]).session_config().unwrap_err();
        assert!(err.to_string().starts_with("failed to parse"));
    }
}
