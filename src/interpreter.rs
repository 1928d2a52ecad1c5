use std::fmt;

use tracing::debug;

use crate::error::InterpretError;
use crate::parser::WinnowLineParser;
use crate::resolver::{PathProbe, PathResolver, ResolvedPath};

/// First word of the argument vector produced for a line that cannot run.
pub const INVALID: &str = "invalid";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandName {
    MakeDir,
    ChangeDir,
    List,
    PrintWorkingDir,
    Curl,
    Recall,
    Move,
    Copy,
    Cat,
    PushDir,
    PopDir,
    Dirs,
    Grep,
    History,
    Echo,
    Manual,
    Remove,
}

/// Which arguments of a command are paths to normalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathArgs {
    None,
    All,
    /// All, after an optional leading `-r`/`-R`
    AfterFlag,
    /// All after the pattern, itself after an optional leading `-r`/`-R`
    AfterPattern,
}

struct Grammar {
    word: &'static str,
    name: CommandName,
    /// Minimum number of words, the command word included.
    min_words: usize,
    paths: PathArgs,
}

static GRAMMAR: [Grammar; 17] = [
    Grammar { word: "mkdir", name: CommandName::MakeDir, min_words: 2, paths: PathArgs::All },
    Grammar { word: "cd", name: CommandName::ChangeDir, min_words: 2, paths: PathArgs::All },
    Grammar { word: "ls", name: CommandName::List, min_words: 1, paths: PathArgs::AfterFlag },
    Grammar { word: "pwd", name: CommandName::PrintWorkingDir, min_words: 1, paths: PathArgs::None },
    Grammar { word: "curl", name: CommandName::Curl, min_words: 2, paths: PathArgs::None },
    Grammar { word: "!", name: CommandName::Recall, min_words: 1, paths: PathArgs::None },
    Grammar { word: "mv", name: CommandName::Move, min_words: 3, paths: PathArgs::All },
    Grammar { word: "cp", name: CommandName::Copy, min_words: 3, paths: PathArgs::All },
    Grammar { word: "cat", name: CommandName::Cat, min_words: 2, paths: PathArgs::All },
    Grammar { word: "pushd", name: CommandName::PushDir, min_words: 2, paths: PathArgs::All },
    Grammar { word: "popd", name: CommandName::PopDir, min_words: 1, paths: PathArgs::None },
    Grammar { word: "dirs", name: CommandName::Dirs, min_words: 1, paths: PathArgs::None },
    Grammar { word: "grep", name: CommandName::Grep, min_words: 3, paths: PathArgs::AfterPattern },
    Grammar { word: "history", name: CommandName::History, min_words: 1, paths: PathArgs::None },
    Grammar { word: "echo", name: CommandName::Echo, min_words: 2, paths: PathArgs::None },
    Grammar { word: "man", name: CommandName::Manual, min_words: 2, paths: PathArgs::None },
    Grammar { word: "rm", name: CommandName::Remove, min_words: 2, paths: PathArgs::AfterFlag },
];

impl CommandName {
    /// Grammar row for a typed word. `!N` recalls history entry `N`.
    fn grammar_for_word(word: &str) -> Option<&'static Grammar> {
        if word.len() > 1 && word.starts_with('!') {
            return GRAMMAR.iter().find(|g| g.name == CommandName::Recall);
        }
        GRAMMAR.iter().find(|g| g.word == word && g.name != CommandName::Recall)
    }

    pub fn word(self) -> &'static str {
        GRAMMAR
            .iter()
            .find(|g| g.name == self)
            .map(|g| g.word)
            .unwrap_or_default()
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.word())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    Word(String),
    Path(ResolvedPath),
}

impl Argument {
    pub fn as_str(&self) -> &str {
        match self {
            Argument::Word(word) => word,
            Argument::Path(path) => path.as_str(),
        }
    }

    pub fn into_word(self) -> String {
        match self {
            Argument::Word(word) => word,
            Argument::Path(path) => path.as_str().to_string(),
        }
    }

    pub fn into_path(self) -> ResolvedPath {
        match self {
            Argument::Path(path) => path,
            Argument::Word(word) => ResolvedPath::Unreachable(word),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Redirection {
    #[default]
    None,
    /// `> FILE`
    Overwrite(ResolvedPath),
    /// `>> FILE`
    Append(ResolvedPath),
}

impl Redirection {
    /// `("", "")`, `(">", target)` or `(">>", target)`.
    pub fn as_pair(&self) -> (&str, &str) {
        match self {
            Redirection::None => ("", ""),
            Redirection::Overwrite(target) => (">", target.as_str()),
            Redirection::Append(target) => (">>", target.as_str()),
        }
    }
}

/// A classified line: which command, its arguments with paths normalized,
/// and where its output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpretation {
    pub name: CommandName,
    /// The command word as typed, e.g. `!3` for a recall.
    pub word: String,
    pub args: Vec<Argument>,
    pub redirection: Redirection,
}

impl Interpretation {
    /// The argument vector, command word first.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.word.clone())
            .chain(self.args.iter().map(|arg| arg.as_str().to_string()))
            .collect()
    }
}

impl InterpretError {
    /// The argument vector of a line that cannot run.
    pub fn argv(&self) -> Vec<String> {
        match self {
            InterpretError::UnknownCommand { name, args } => std::iter::once(INVALID.to_string())
                .chain(std::iter::once(name.clone()))
                .chain(args.iter().cloned())
                .collect(),
            InterpretError::Syntax(_) | InterpretError::MissingOperands { .. } => {
                vec![INVALID.to_string()]
            }
        }
    }
}

/// Turns raw lines into [`Interpretation`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandInterpreter;

impl CommandInterpreter {
    pub fn new() -> Self {
        Self
    }

    /// Tokenizes `line`, splits off a trailing redirection, checks the command
    /// against the grammar table and normalizes every path argument.
    pub fn interpret<P: PathProbe + ?Sized>(
        &self,
        line: &str,
        probe: &P,
    ) -> Result<Interpretation, InterpretError> {
        let mut words = WinnowLineParser::new(line).tokens()?;
        let redirection = Self::split_redirection(&mut words, probe);

        let mut words = words.into_iter();
        let word = words.next().unwrap_or_default();
        let args: Vec<String> = words.collect();

        let Some(grammar) = CommandName::grammar_for_word(&word) else {
            return Err(InterpretError::UnknownCommand { name: word, args });
        };
        if args.len() + 1 < grammar.min_words {
            return Err(InterpretError::MissingOperands { command: word });
        }

        let first_path = Self::first_path_index(grammar.paths, &args);
        let args = args
            .into_iter()
            .enumerate()
            .map(|(i, arg)| match first_path {
                Some(first) if i >= first => Argument::Path(PathResolver::normalize(probe, &arg)),
                _ => Argument::Word(arg),
            })
            .collect();

        let interpretation = Interpretation {
            name: grammar.name,
            word,
            args,
            redirection,
        };
        debug!("interpret: {:?}", interpretation);
        Ok(interpretation)
    }

    /// Takes `> FILE` or `>> FILE` off the end of a line of more than two words.
    fn split_redirection<P: PathProbe + ?Sized>(words: &mut Vec<String>, probe: &P) -> Redirection {
        let len = words.len();
        if len <= 2 || !matches!(words[len - 2].as_str(), ">" | ">>") {
            return Redirection::None;
        }

        let target = words.pop().unwrap_or_default();
        let symbol = words.pop().unwrap_or_default();
        let target = PathResolver::normalize(probe, &target);
        if symbol == ">>" {
            Redirection::Append(target)
        } else {
            Redirection::Overwrite(target)
        }
    }

    fn first_path_index(paths: PathArgs, args: &[String]) -> Option<usize> {
        let flag = usize::from(args.first().is_some_and(|a| is_recursive_flag(a)));
        match paths {
            PathArgs::None => None,
            PathArgs::All => Some(0),
            PathArgs::AfterFlag => Some(flag),
            PathArgs::AfterPattern => Some(flag + 1),
        }
    }
}

pub fn is_recursive_flag(word: &str) -> bool {
    matches!(word, "-r" | "-R")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complete_command::CompleteCommand;
    use crate::error::ShellError;
    use crate::vfs::VirtualFileSystem;

    fn fixture() -> anyhow::Result<VirtualFileSystem> {
        let mut fs = VirtualFileSystem::new();
        fs.make_directory("/a")?;
        fs.make_directory("/a/b")?;
        fs.make_file("/a/notes")?;
        fs.change_directory("/a")?;
        Ok(fs)
    }

    #[test]
    fn test_argv_with_normalized_paths() -> anyhow::Result<()> {
        // Arrange
        let fs = fixture()?;
        let interpreter = CommandInterpreter::new();
        let inputs = [
            "mkdir x ../y b/./z",
            "cd ..",
            "ls -R b",
            "ls",
            "grep -R \"a.*\" . notes",
            "grep hello notes b",
            "mv notes b",
            "pwd",
            "echo \"some text\"",
            "rm -r b",
            "!12",
            "man cd",
        ];
        let outputs: [&[&str]; 12] = [
            &["mkdir", "/a/x", "/y", "/a/b/z"],
            &["cd", "/"],
            &["ls", "-R", "/a/b"],
            &["ls"],
            &["grep", "-R", "\"a.*\"", "/a", "/a/notes"],
            &["grep", "hello", "/a/notes", "/a/b"],
            &["mv", "/a/notes", "/a/b"],
            &["pwd"],
            &["echo", "some text"],
            &["rm", "-r", "/a/b"],
            &["!12"],
            &["man", "cd"],
        ];

        for (input, output) in inputs.iter().zip(outputs.iter()) {
            // Act
            let result = interpreter.interpret(input, &fs)?;

            // Assert
            assert_eq!(result.argv(), *output, "{input}");
            assert_eq!(result.redirection.as_pair(), ("", ""), "{input}");
        }
        Ok(())
    }

    #[test]
    fn test_redirection_is_split_off() -> anyhow::Result<()> {
        // Arrange
        let fs = fixture()?;
        let interpreter = CommandInterpreter::new();

        // Act
        let overwrite = interpreter.interpret("echo \"hi\" > out", &fs)?;
        let append = interpreter.interpret("ls b >> ../log", &fs)?;
        let too_short = interpreter.interpret("ls >", &fs)?;

        // Assert
        assert_eq!(overwrite.argv(), ["echo", "hi"]);
        assert_eq!(overwrite.redirection.as_pair(), (">", "/a/out"));
        assert_eq!(append.argv(), ["ls", "/a/b"]);
        assert_eq!(append.redirection.as_pair(), (">>", "/log"));
        assert_eq!(too_short.argv(), ["ls", "/a/>"]);
        assert_eq!(too_short.redirection, Redirection::None);
        Ok(())
    }

    #[test]
    fn test_unknown_command_is_invalid() -> anyhow::Result<()> {
        let fs = fixture()?;

        let err = CommandInterpreter::new()
            .interpret("frobnicate now please", &fs)
            .unwrap_err();

        assert_eq!(
            err,
            InterpretError::UnknownCommand {
                name: "frobnicate".into(),
                args: vec!["now".into(), "please".into()]
            }
        );
        assert_eq!(err.argv(), ["invalid", "frobnicate", "now", "please"]);
        Ok(())
    }

    #[test]
    fn test_missing_operands_is_invalid() -> anyhow::Result<()> {
        // Arrange
        let fs = fixture()?;
        let interpreter = CommandInterpreter::new();
        let inputs = ["mkdir", "cd", "mv a", "cp a", "cat", "grep x", "echo", "man", "curl", "rm"];

        for input in inputs {
            // Act
            let err = interpreter.interpret(input, &fs).unwrap_err();

            // Assert
            assert!(
                matches!(err, InterpretError::MissingOperands { .. }),
                "{input}: {err:?}"
            );
            assert_eq!(err.argv(), ["invalid"]);
        }
        Ok(())
    }

    #[test]
    fn test_malformed_echo_is_invalid() -> anyhow::Result<()> {
        let fs = fixture()?;

        let err = CommandInterpreter::new()
            .interpret("echo no quotes", &fs)
            .unwrap_err();

        assert!(matches!(err, InterpretError::Syntax(_)));
        assert_eq!(err.argv(), ["invalid"]);
        Ok(())
    }

    #[test]
    fn test_unreachable_path_keeps_token() -> anyhow::Result<()> {
        let fs = fixture()?;

        let result = CommandInterpreter::new().interpret("cd ghost/../b", &fs)?;

        assert_eq!(
            result.args,
            [Argument::Path(ResolvedPath::Unreachable("ghost/../b".into()))]
        );
        Ok(())
    }

    #[test]
    fn test_extra_operands_are_not_invalid() -> anyhow::Result<()> {
        // Arrange
        let fs = fixture()?;
        let interpreter = CommandInterpreter::new();
        let inputs = ["cd b notes", "pwd now", "popd x", "man ls cd"];
        let outputs: [&[&str]; 4] = [
            &["cd", "/a/b", "/a/notes"],
            &["pwd", "now"],
            &["popd", "x"],
            &["man", "ls", "cd"],
        ];

        for (input, output) in inputs.iter().zip(outputs.iter()) {
            // Act
            let interpretation = interpreter.interpret(input, &fs)?;
            let argv = interpretation.argv();
            let typed = CompleteCommand::try_from(interpretation);

            // Assert
            assert_eq!(argv, *output, "{input}");
            assert_ne!(argv.first().map(String::as_str), Some(INVALID), "{input}");
            assert!(
                matches!(typed, Err(ShellError::Arity { .. })),
                "{input}: {typed:?}"
            );
        }
        Ok(())
    }
}
