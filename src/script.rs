//! Replay scripts: one editor or bridge command per line.
//!
//! ```text
//! # comments and blank lines are ignored
//! load Hello\nworld
//! move end
//! insert !
//! goto 1 0
//! subscribe
//! deactivate
//! ```

use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::editor::Motion;

/// One script command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Load(String),
    Insert(String),
    Newline,
    Backspace,
    Delete,
    Move(Motion),
    Goto { line: usize, col: usize },
    /// Add a subscriber at this point of the replay.
    Subscribe,
    Activate,
    Deactivate,
    /// Dispose the editor; later activations fail.
    Dispose,
}

/// A command with its 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub line: usize,
    pub command: Command,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("line {line}: unknown command `{command}`")]
    UnknownCommand { line: usize, command: String },

    #[error("line {line}: `{command}` expects {expected}")]
    MissingArgument {
        line: usize,
        command: &'static str,
        expected: &'static str,
    },

    #[error("line {line}: unknown motion `{motion}`")]
    UnknownMotion { line: usize, motion: String },

    #[error("line {line}: invalid number `{value}`")]
    InvalidNumber { line: usize, value: String },
}

/// A parsed replay script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    steps: Vec<Step>,
}

impl Script {
    /// Parse script source.
    ///
    /// # Errors
    /// Returns the first malformed line.
    pub fn parse(source: &str) -> Result<Self, ScriptError> {
        let mut steps = Vec::new();
        for (idx, raw) in source.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim_start();
            if trimmed.trim_end().is_empty() || trimmed.starts_with('#') {
                continue;
            }
            steps.push(Step {
                line,
                command: parse_command(line, trimmed)?,
            });
        }
        Ok(Self { steps })
    }

    /// Read and parse a script file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or does not parse.
    pub fn from_file(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        Self::parse(&source).with_context(|| format!("Invalid script {}", path.display()))
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl FromStr for Script {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_command(line: usize, text: &str) -> Result<Command, ScriptError> {
    let (name, rest) = text.split_once(' ').unwrap_or((text.trim_end(), ""));
    let arg = rest.trim_end_matches(['\r', '\n']);
    let command = match name {
        "load" => Command::Load(unescape(arg)),
        "insert" => {
            if arg.is_empty() {
                return Err(ScriptError::MissingArgument {
                    line,
                    command: "insert",
                    expected: "text",
                });
            }
            Command::Insert(unescape(arg))
        }
        "newline" => Command::Newline,
        "backspace" => Command::Backspace,
        "delete" => Command::Delete,
        "move" => Command::Move(parse_motion(line, arg.trim())?),
        "goto" => {
            let mut parts = arg.split_whitespace();
            let (Some(l), Some(c)) = (parts.next(), parts.next()) else {
                return Err(ScriptError::MissingArgument {
                    line,
                    command: "goto",
                    expected: "<line> <col>",
                });
            };
            Command::Goto {
                line: parse_number(line, l)?,
                col: parse_number(line, c)?,
            }
        }
        "subscribe" => Command::Subscribe,
        "activate" => Command::Activate,
        "deactivate" => Command::Deactivate,
        "dispose" => Command::Dispose,
        other => {
            return Err(ScriptError::UnknownCommand {
                line,
                command: other.to_string(),
            });
        }
    };
    Ok(command)
}

fn parse_motion(line: usize, s: &str) -> Result<Motion, ScriptError> {
    let motion = match s {
        "left" => Motion::Left,
        "right" => Motion::Right,
        "up" => Motion::Up,
        "down" => Motion::Down,
        "home" => Motion::Home,
        "end" => Motion::End,
        "word-left" => Motion::WordLeft,
        "word-right" => Motion::WordRight,
        "start" => Motion::Start,
        "finish" => Motion::Finish,
        "" => {
            return Err(ScriptError::MissingArgument {
                line,
                command: "move",
                expected: "a motion",
            });
        }
        other => {
            return Err(ScriptError::UnknownMotion {
                line,
                motion: other.to_string(),
            });
        }
    };
    Ok(motion)
}

fn parse_number(line: usize, s: &str) -> Result<usize, ScriptError> {
    s.parse().map_err(|_| ScriptError::InvalidNumber {
        line,
        value: s.to_string(),
    })
}

/// Expand `\n`, `\t` and `\\`. Unknown escapes are kept verbatim.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
