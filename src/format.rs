//! Rendering of commands, pipelines, and springs for error messages.

use std::ffi::{OsStr, OsString};
use std::fmt;

/// An arbitrarily nested command structure.
///
/// Nesting depth selects the rendering: a bare word, a command (words joined
/// by spaces), a pipeline (commands joined by `" | "`), or a spring
/// (pipelines joined by `" + "` inside parentheses).  Deeper nestings
/// parenthesize recursively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandTree {
    /// A single argument.
    Word(OsString),
    /// A sequence of nested structures.
    Seq(Vec<CommandTree>),
}

impl CommandTree {
    /// Builds the tree for a single command.
    pub fn command<S: AsRef<OsStr>>(argv: &[S]) -> CommandTree {
        CommandTree::Seq(
            argv.iter()
                .map(|arg| CommandTree::Word(arg.as_ref().to_owned()))
                .collect(),
        )
    }

    /// Builds the tree for a pipeline of commands.
    pub fn pipeline<C, S>(commands: &[C]) -> CommandTree
    where
        C: AsRef<[S]>,
        S: AsRef<OsStr>,
    {
        CommandTree::Seq(
            commands
                .iter()
                .map(|cmd| CommandTree::command(cmd.as_ref()))
                .collect(),
        )
    }

    // Height above the atoms: 0 for a word, 1 for a command, 2 for a
    // pipeline, 3 for a spring.
    fn depth(&self) -> usize {
        match self {
            CommandTree::Word(_) => 0,
            CommandTree::Seq(children) => {
                1 + children.iter().map(CommandTree::depth).max().unwrap_or(0)
            }
        }
    }
}

impl fmt::Display for CommandTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandTree::Word(word) => write!(f, "{}", word.to_string_lossy()),
            CommandTree::Seq(children) => {
                let parts: Vec<String> = children.iter().map(|child| child.to_string()).collect();
                match self.depth() {
                    0 | 1 => write!(f, "{}", parts.join(" ")),
                    2 => write!(f, "{}", parts.join(" | ")),
                    _ => write!(f, "({})", parts.join(" + ")),
                }
            }
        }
    }
}

/// Renders a command, pipeline, or spring as a human-readable string.
///
/// A one-element pipeline renders identically to its sole command.
pub fn format_commands(commands: &CommandTree) -> String {
    commands.to_string()
}
