use std::sync::Arc;

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::vfs::types::EntryType;

pub type FsResult<T> = Result<T, FsError>;

pub type ShellResult<T> = Result<T, ShellError>;

/// Failures raised by the in-memory filesystem and the directory stack.
#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
pub enum FsError {
    /// The path does not lead to an existing entry.
    #[error("Invalid path: {path}")]
    InvalidPath { path: String },

    /// The path exists but holds the other kind of entry.
    #[error("{path} is not a {expected}")]
    WrongType { path: String, expected: EntryType },

    #[error("Invalid name: {name:?}")]
    #[diagnostic(help(
        "names must be non-empty and free of control characters and of / ! @ $ & * ( ) ? : [ ] \" < > ' ` | = {{ }} \\ , ;"
    ))]
    InvalidName { name: String },

    #[error("{parent} already contains an entry named {name}")]
    DuplicateName { parent: String, name: String },

    #[error("{parent} has no entry named {name}")]
    NotFound { parent: String, name: String },

    #[error("Directory stack is empty")]
    #[diagnostic(help("use `pushd DIR` before `popd`"))]
    EmptyStack,
}

/// A command line that could not be split into words.
#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
#[error("Cannot split line into words")]
pub struct SyntaxError {
    #[source_code]
    pub line: Arc<String>,

    /// One entry per malformed stretch of the line.
    #[related]
    pub problems: Vec<MalformedSpan>,
}

/// A malformed stretch of a command line, such as an unquoted echo text.
#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
#[error("{message}")]
pub struct MalformedSpan {
    #[source_code]
    pub line: Arc<String>,

    #[label("{found}")]
    pub span: SourceSpan,

    pub message: String,

    /// What the span holds instead of the expected word.
    pub found: String,

    #[help]
    pub help: Option<String>,
}

/// Failures while classifying a tokenized line against the command table.
#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
pub enum InterpretError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("Command not found: {name}")]
    #[diagnostic(help("run `man man` for the list of commands"))]
    UnknownCommand { name: String, args: Vec<String> },

    #[error("Missing operands for command {command}")]
    #[diagnostic(help("run `man {command}` for its usage"))]
    MissingOperands { command: String },
}

/// Everything that can go wrong while executing one line of input.
#[derive(Debug, Diagnostic, Error)]
pub enum ShellError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Fs(#[from] FsError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Interpret(#[from] InterpretError),

    #[error("{command}: expected {expected} argument(s), got {actual}")]
    Arity {
        command: String,
        expected: String,
        actual: usize,
    },

    #[error("{}", render_make_dir_failures(.failures))]
    MakeDir {
        #[related]
        failures: Vec<MakeDirFailure>,
    },

    #[error("Cannot remove {path}: is a directory")]
    #[diagnostic(help("use `rm -r {path}` to remove a directory and its contents"))]
    IsDirectory { path: String },

    #[error("Invalid regular expression {pattern:?}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("History holds {available} command(s), {requested} requested")]
    HistoryOutOfRange { requested: usize, available: usize },

    #[error("Invalid history argument {arg:?}")]
    #[diagnostic(help("history takes a single non-negative number"))]
    BadHistoryArg { arg: String },

    #[error("No manual exists for command: {command}")]
    NoManual { command: String },

    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },

    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
}

/// One directory that `mkdir` could not create.
#[derive(Debug, Diagnostic, Clone, Eq, PartialEq, Error)]
#[error("Cannot create directory {path:?}: {source}")]
pub struct MakeDirFailure {
    pub path: String,
    #[source]
    pub source: FsError,
}

fn render_make_dir_failures(failures: &[MakeDirFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
