//! Session configuration.

use serde::{Deserialize, Serialize};

/// Default kernel invocation.
pub const DEFAULT_LINK_NAME: &str = "math -mathlink";
/// Default link mode: launch a fresh kernel.
pub const DEFAULT_LINK_MODE: &str = "launch";
/// Default `$PrePrint` installed at kernel start.
pub const DEFAULT_PRE_PRINT: &str = "InputForm";
/// Default line-editor history depth.
pub const DEFAULT_MAX_HISTORY: usize = 10;

/// How user input lines are read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineEditing {
    /// Line editor with history and emacs-style keys.
    #[default]
    Editor,
    /// Plain line reads with limited editing.
    Plain,
}

/// How to reach the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Command line that starts (or names) the kernel.
    pub name: String,
    /// Link mode, e.g. `launch`.
    pub mode: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_LINK_NAME.to_string(),
            mode: DEFAULT_LINK_MODE.to_string(),
        }
    }
}

/// Everything the session engine needs to know before it starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Route evaluations through the kernel's main loop (`In[n]`/`Out[n]` history).
    pub main_loop: bool,
    /// Capture and show the `In[n]:=` and `Out[n]=` prompts.
    pub show_in_out_strings: bool,
    /// Prefix shown before the kernel prompt.
    pub prompt: String,
    /// Line reading mode.
    pub line_editing: LineEditing,
    /// Line-editor history depth.
    pub max_history: usize,
    /// Kernel link parameters.
    pub link: LinkConfig,
    /// `$PrePrint` function installed after connecting, if any.
    pub pre_print: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            main_loop: true,
            show_in_out_strings: true,
            prompt: String::new(),
            line_editing: LineEditing::default(),
            max_history: DEFAULT_MAX_HISTORY,
            link: LinkConfig::default(),
            pre_print: Some(DEFAULT_PRE_PRINT.to_string()),
        }
    }
}

impl SessionConfig {
    /// Configuration for headless evaluation outside the main loop.
    #[must_use]
    pub fn headless() -> Self {
        Self {
            main_loop: false,
            ..Self::default()
        }
    }
}
