use crate::error::ShellError;
use crate::interpreter::{is_recursive_flag, Argument, CommandName, Interpretation};
use crate::resolver::ResolvedPath;

/// A fully classified command, ready to run against the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompleteCommand {
    /// Create one or more directories
    MakeDir {
        /// The directories to create, in order
        dirs: Vec<ResolvedPath>,
    },
    /// Change the working directory
    ChangeDir {
        /// The directory to enter
        dir: ResolvedPath,
    },
    /// List directory contents
    List {
        /// If true, descend into every subdirectory
        recursive: bool,
        /// The entries to list. Empty means the working directory.
        paths: Vec<ResolvedPath>,
    },
    /// Print the working directory
    PrintWorkingDir,
    /// Fetch a remote file into the working directory
    Curl {
        /// The address to fetch
        url: String,
    },
    /// Run a command from history again
    Recall {
        /// The 1-based history number as typed after `!`
        number: String,
    },
    /// Move or rename an entry
    Move {
        /// The entry to move
        from: ResolvedPath,
        /// An existing directory, or the new path of the entry
        to: ResolvedPath,
    },
    /// Copy an entry into a directory
    Copy {
        /// The entry to copy
        from: ResolvedPath,
        /// The directory receiving the copy
        to: ResolvedPath,
    },
    /// Concatenate files
    Cat {
        /// The files to print
        files: Vec<ResolvedPath>,
    },
    /// Save the working directory on the stack, then change to `dir`
    PushDir { dir: ResolvedPath },
    /// Return to the directory on top of the stack
    PopDir,
    /// Print the directory stack
    Dirs,
    /// Print lines matching a regular expression
    Grep {
        /// If true, search directories recursively
        recursive: bool,
        /// The expression each whole line must match
        pattern: String,
        /// The files or directories to search
        paths: Vec<ResolvedPath>,
    },
    /// Print the command history
    History {
        /// How many of the latest commands to print. `None` prints all.
        count: Option<String>,
    },
    /// Print a line of text
    Echo { text: String },
    /// Print the manual page of a command
    Manual {
        /// A command name, or `!N` for the command recalled by history entry `N`
        command: String,
    },
    /// Remove an entry
    Remove {
        /// If true, directories are removed with their contents
        recursive: bool,
        /// The entry to remove
        path: ResolvedPath,
    },
}

impl CompleteCommand {
    pub fn name(&self) -> CommandName {
        match self {
            CompleteCommand::MakeDir { .. } => CommandName::MakeDir,
            CompleteCommand::ChangeDir { .. } => CommandName::ChangeDir,
            CompleteCommand::List { .. } => CommandName::List,
            CompleteCommand::PrintWorkingDir => CommandName::PrintWorkingDir,
            CompleteCommand::Curl { .. } => CommandName::Curl,
            CompleteCommand::Recall { .. } => CommandName::Recall,
            CompleteCommand::Move { .. } => CommandName::Move,
            CompleteCommand::Copy { .. } => CommandName::Copy,
            CompleteCommand::Cat { .. } => CommandName::Cat,
            CompleteCommand::PushDir { .. } => CommandName::PushDir,
            CompleteCommand::PopDir => CommandName::PopDir,
            CompleteCommand::Dirs => CommandName::Dirs,
            CompleteCommand::Grep { .. } => CommandName::Grep,
            CompleteCommand::History { .. } => CommandName::History,
            CompleteCommand::Echo { .. } => CommandName::Echo,
            CompleteCommand::Manual { .. } => CommandName::Manual,
            CompleteCommand::Remove { .. } => CommandName::Remove,
        }
    }
}

/// Pops arguments off an interpretation while checking how many there are.
struct Operands {
    command: String,
    args: std::vec::IntoIter<Argument>,
}

impl Operands {
    fn new(command: &str, args: Vec<Argument>) -> Self {
        Self {
            command: command.to_string(),
            args: args.into_iter(),
        }
    }

    /// Consumes a leading `-r`/`-R` if present.
    fn flag(&mut self) -> bool {
        let recursive = self
            .args
            .as_slice()
            .first()
            .is_some_and(|arg| is_recursive_flag(arg.as_str()));
        if recursive {
            self.args.next();
        }
        recursive
    }

    fn exactly(self, expected: usize) -> Result<Vec<Argument>, ShellError> {
        self.between(expected, expected)
    }

    fn between(self, min: usize, max: usize) -> Result<Vec<Argument>, ShellError> {
        let args: Vec<Argument> = self.args.collect();
        if (min..=max).contains(&args.len()) {
            return Ok(args);
        }
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{min} to {max}")
        };
        Err(ShellError::Arity {
            command: self.command,
            expected,
            actual: args.len(),
        })
    }

    fn rest(self) -> Vec<Argument> {
        self.args.collect()
    }
}

fn paths(args: Vec<Argument>) -> Vec<ResolvedPath> {
    args.into_iter().map(Argument::into_path).collect()
}

fn one(args: Vec<Argument>) -> Argument {
    args.into_iter()
        .next()
        .unwrap_or_else(|| Argument::Word(String::new()))
}

fn two(args: Vec<Argument>) -> (Argument, Argument) {
    let mut args = args.into_iter();
    let first = args.next().unwrap_or_else(|| Argument::Word(String::new()));
    let second = args.next().unwrap_or_else(|| Argument::Word(String::new()));
    (first, second)
}

impl TryFrom<Interpretation> for CompleteCommand {
    type Error = ShellError;

    fn try_from(interpretation: Interpretation) -> Result<Self, Self::Error> {
        let Interpretation {
            name, word, args, ..
        } = interpretation;
        let mut operands = Operands::new(&word, args);

        let command = match name {
            CommandName::MakeDir => CompleteCommand::MakeDir {
                dirs: paths(operands.rest()),
            },
            CommandName::ChangeDir => CompleteCommand::ChangeDir {
                dir: one(operands.exactly(1)?).into_path(),
            },
            CommandName::List => CompleteCommand::List {
                recursive: operands.flag(),
                paths: paths(operands.rest()),
            },
            CommandName::PrintWorkingDir => {
                operands.exactly(0)?;
                CompleteCommand::PrintWorkingDir
            }
            CommandName::Curl => CompleteCommand::Curl {
                url: one(operands.exactly(1)?).into_word(),
            },
            CommandName::Recall => {
                operands.exactly(0)?;
                CompleteCommand::Recall {
                    number: word.trim_start_matches('!').to_string(),
                }
            }
            CommandName::Move => {
                let (from, to) = two(operands.exactly(2)?);
                CompleteCommand::Move {
                    from: from.into_path(),
                    to: to.into_path(),
                }
            }
            CommandName::Copy => {
                let (from, to) = two(operands.exactly(2)?);
                CompleteCommand::Copy {
                    from: from.into_path(),
                    to: to.into_path(),
                }
            }
            CommandName::Cat => CompleteCommand::Cat {
                files: paths(operands.rest()),
            },
            CommandName::PushDir => CompleteCommand::PushDir {
                dir: one(operands.exactly(1)?).into_path(),
            },
            CommandName::PopDir => {
                operands.exactly(0)?;
                CompleteCommand::PopDir
            }
            CommandName::Dirs => {
                operands.exactly(0)?;
                CompleteCommand::Dirs
            }
            CommandName::Grep => {
                let recursive = operands.flag();
                let mut args = operands.rest().into_iter();
                let pattern = args.next().map(Argument::into_word).unwrap_or_default();
                let paths = paths(args.collect());
                if paths.is_empty() {
                    return Err(ShellError::Arity {
                        command: word,
                        expected: "at least 2".into(),
                        actual: 1,
                    });
                }
                CompleteCommand::Grep {
                    recursive,
                    pattern,
                    paths,
                }
            }
            CommandName::History => CompleteCommand::History {
                count: operands
                    .between(0, 1)?
                    .into_iter()
                    .next()
                    .map(Argument::into_word),
            },
            CommandName::Echo => CompleteCommand::Echo {
                text: one(operands.exactly(1)?).into_word(),
            },
            CommandName::Manual => CompleteCommand::Manual {
                command: one(operands.exactly(1)?).into_word(),
            },
            CommandName::Remove => {
                let recursive = operands.flag();
                CompleteCommand::Remove {
                    recursive,
                    path: one(operands.exactly(1)?).into_path(),
                }
            }
        };
        Ok(command)
    }
}
