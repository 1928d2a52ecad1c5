use regex::Regex;
use tracing::{debug, info};

use crate::complete_command::CompleteCommand;
use crate::error::{MakeDirFailure, ShellError, ShellResult};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::history::CommandHistory;
use crate::interpreter::{CommandInterpreter, CommandName, Redirection};
use crate::manual;
use crate::resolver::ResolvedPath;
use crate::vfs::types::join_path;
use crate::vfs::{DirectoryStack, Entry, EntryId, VirtualFileSystem, WriteMode};

/// Separator between the contents of consecutive files in `cat`.
static CAT_SEPARATOR: &str = "\n\n\n";

/// A system that can execute command lines
///
/// This trait is the seam between the front ends (script runner, plain REPL,
/// line editor) and whatever executes the commands.
pub trait System {
    /// Absolute path of the working directory
    fn current_path(&self) -> &str;
    /// Run one line of input, returning the text it prints, if any
    fn run_line(&mut self, line: &str) -> ShellResult<Option<String>>;
}

/// The shell session: a filesystem plus everything a command can touch.
#[derive(Debug)]
pub struct Shell<F: Fetcher = HttpFetcher> {
    fs: VirtualFileSystem,
    stack: DirectoryStack,
    history: CommandHistory,
    interpreter: CommandInterpreter,
    fetcher: F,
}

impl Default for Shell<HttpFetcher> {
    fn default() -> Self {
        Self::new()
    }
}

impl Shell<HttpFetcher> {
    pub fn new() -> Self {
        Self::with_fetcher(HttpFetcher::new())
    }
}

impl<F: Fetcher> Shell<F> {
    pub fn with_fetcher(fetcher: F) -> Self {
        Self {
            fs: VirtualFileSystem::new(),
            stack: DirectoryStack::new(),
            history: CommandHistory::new(),
            interpreter: CommandInterpreter::new(),
            fetcher,
        }
    }

    pub fn fs(&self) -> &VirtualFileSystem {
        &self.fs
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn stack(&self) -> &DirectoryStack {
        &self.stack
    }

    fn execute(&mut self, line: &str) -> ShellResult<Option<String>> {
        let interpretation = self.interpreter.interpret(line, &self.fs)?;
        let redirection = interpretation.redirection.clone();
        let command = CompleteCommand::try_from(interpretation)?;
        let name = command.name();

        info!("execute: {:?}", command);
        let output = self.dispatch(command)?;
        self.deliver(name, output, redirection)
    }

    fn dispatch(&mut self, command: CompleteCommand) -> ShellResult<String> {
        match command {
            CompleteCommand::MakeDir { dirs } => self.make_dirs(dirs).map(|_| String::new()),
            CompleteCommand::ChangeDir { dir } => {
                self.fs.change_directory(&dir.into_path()?)?;
                Ok(String::new())
            }
            CompleteCommand::List { recursive, paths } => self.list(recursive, paths),
            CompleteCommand::PrintWorkingDir => Ok(self.fs.current_path().to_string()),
            CompleteCommand::Curl { url } => self.curl(&url).map(|_| String::new()),
            CompleteCommand::Recall { number } => Ok(self.recall(&number)?.unwrap_or_default()),
            CompleteCommand::Move { from, to } => {
                self.fs.move_entry(&from.into_path()?, &to.into_path()?)?;
                Ok(String::new())
            }
            CompleteCommand::Copy { from, to } => {
                self.fs.copy(&from.into_path()?, &to.into_path()?)?;
                Ok(String::new())
            }
            CompleteCommand::Cat { files } => self.cat(files),
            CompleteCommand::PushDir { dir } => {
                self.stack.push(self.fs.current_handle());
                self.fs.change_directory(&dir.into_path()?)?;
                Ok(String::new())
            }
            CompleteCommand::PopDir => {
                let dir = self.stack.pop()?;
                self.fs.change_directory_to(&dir)?;
                Ok(String::new())
            }
            CompleteCommand::Dirs => Ok(self.stack.render(&self.fs)),
            CompleteCommand::Grep {
                recursive,
                pattern,
                paths,
            } => self.grep(recursive, &pattern, paths),
            CompleteCommand::History { count } => self.history.render(count.as_deref()),
            CompleteCommand::Echo { text } => Ok(text),
            CompleteCommand::Manual { command } => self.manual(&command),
            CompleteCommand::Remove { recursive, path } => {
                self.remove(recursive, path).map(|_| String::new())
            }
        }
    }

    /// Prints `output`, or writes it to the redirection target.
    fn deliver(
        &mut self,
        name: CommandName,
        output: String,
        redirection: Redirection,
    ) -> ShellResult<Option<String>> {
        let (target, mode) = match redirection {
            Redirection::None => return Ok((!output.is_empty()).then_some(output)),
            Redirection::Overwrite(target) => (target, WriteMode::Overwrite),
            Redirection::Append(target) => (target, WriteMode::Append),
        };

        let path = target.into_path()?;
        if !self.fs.path_exists(&path) {
            if output.is_empty() && name != CommandName::Echo {
                return Ok(None);
            }
            self.fs.make_file(&path)?;
        }
        self.fs.write_file(&path, &output, mode)?;
        Ok(None)
    }

    fn make_dirs(&mut self, dirs: Vec<ResolvedPath>) -> ShellResult<()> {
        let failures: Vec<MakeDirFailure> = dirs
            .into_iter()
            .filter_map(|dir| {
                let raw = dir.as_str().to_string();
                let made = dir
                    .into_path()
                    .and_then(|path| self.fs.make_directory(&path));
                made.err()
                    .map(|source| MakeDirFailure { path: raw, source })
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ShellError::MakeDir { failures })
        }
    }

    fn list(&self, recursive: bool, paths: Vec<ResolvedPath>) -> ShellResult<String> {
        if paths.is_empty() && !recursive {
            let cwd = self.fs.current_directory()?;
            let names: Vec<&str> = self.fs.children(cwd).map(Entry::name).collect();
            return Ok(names.join("\n"));
        }

        let paths = if paths.is_empty() {
            vec![ResolvedPath::Absolute(self.fs.current_path().to_string())]
        } else {
            paths
        };

        let mut blocks = Vec::new();
        for path in paths {
            let path = path.into_path()?;
            let id = self.fs.resolve(&path)?;
            let entry = self.fs.get_entry(&path)?;
            if entry.is_file() {
                blocks.push(entry.name().to_string());
            } else {
                self.list_directory(id, recursive, &mut blocks);
            }
        }
        Ok(blocks.join("\n"))
    }

    /// Pushes `name:` and the indented child names of `id`, then its
    /// subdirectories in name order when `recursive`.
    fn list_directory(&self, id: EntryId, recursive: bool, blocks: &mut Vec<String>) {
        let Some(dir) = self.fs.get(id) else {
            return;
        };

        let mut block = format!("{}:", dir.name());
        for child in self.fs.children(id) {
            block.push_str("\n  ");
            block.push_str(child.name());
        }
        blocks.push(block);

        if recursive {
            for (_, child) in dir.children() {
                if self.fs.get(child).is_some_and(Entry::is_directory) {
                    self.list_directory(child, true, blocks);
                }
            }
        }
    }

    fn curl(&mut self, url: &str) -> ShellResult<()> {
        let download = self.fetcher.fetch(url)?;
        let path = join_path(self.fs.current_path(), &download.file_name);

        if !self.fs.path_exists(&path) {
            self.fs.make_file(&path)?;
        }
        self.fs
            .write_file(&path, &download.content, WriteMode::Overwrite)?;
        Ok(())
    }

    /// Records history entry `number` again and runs it.
    fn recall(&mut self, number: &str) -> ShellResult<Option<String>> {
        let line = self.history.recall(number)?.to_string();
        debug!("recall: !{} -> {}", number, line);
        self.history.record(line.as_str());
        self.execute(&line)
    }

    fn cat(&self, files: Vec<ResolvedPath>) -> ShellResult<String> {
        let contents = files
            .into_iter()
            .map(|file| -> ShellResult<&str> {
                let path = file.into_path()?;
                Ok(self.fs.read_file(&path)?)
            })
            .collect::<ShellResult<Vec<&str>>>()?;
        Ok(contents.join(CAT_SEPARATOR))
    }

    fn grep(&self, recursive: bool, pattern: &str, paths: Vec<ResolvedPath>) -> ShellResult<String> {
        let pattern = strip_quotes(pattern);
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
            ShellError::InvalidRegex {
                pattern: pattern.to_string(),
                source,
            }
        })?;

        let mut prefix = paths.len() > 1;
        let mut files = Vec::new();
        for path in paths {
            let path = path.into_path()?;
            if recursive {
                let id = self.fs.resolve(&path)?;
                prefix |= self.fs.get(id).is_some_and(Entry::is_directory);
                self.collect_files(id, &mut files);
            } else {
                files.push(self.fs.get_file(&path)?);
            }
        }

        let lines: Vec<String> = files
            .iter()
            .flat_map(|file| {
                let path = file.path();
                file.data()
                    .unwrap_or_default()
                    .lines()
                    .filter(|line| regex.is_match(line))
                    .map(move |line| {
                        if prefix {
                            format!("{path}: {line}")
                        } else {
                            line.to_string()
                        }
                    })
            })
            .collect();
        Ok(lines.join("\n"))
    }

    /// Every file at or below `id`, parents before children.
    fn collect_files<'a>(&'a self, id: EntryId, files: &mut Vec<&'a Entry>) {
        let Some(entry) = self.fs.get(id) else {
            return;
        };
        if entry.is_file() {
            files.push(entry);
            return;
        }
        for (_, child) in entry.children() {
            self.collect_files(child, files);
        }
    }

    fn manual(&self, command: &str) -> ShellResult<String> {
        let name = match command.strip_prefix('!').filter(|n| !n.is_empty()) {
            Some(number) => self
                .history
                .recall(number)?
                .split_whitespace()
                .next()
                .unwrap_or_default(),
            None => command,
        };

        manual::page(name)
            .map(String::from)
            .ok_or_else(|| ShellError::NoManual {
                command: name.to_string(),
            })
    }

    fn remove(&mut self, recursive: bool, path: ResolvedPath) -> ShellResult<()> {
        let path = path.into_path()?;
        if self.fs.get_entry(&path)?.is_directory() && !recursive {
            return Err(ShellError::IsDirectory { path });
        }
        self.fs.remove(&path)?;
        Ok(())
    }
}

impl<F: Fetcher> System for Shell<F> {
    fn current_path(&self) -> &str {
        self.fs.current_path()
    }

    /// Blank lines are ignored. Lines other than `!N` recalls are recorded
    /// in history before they run, whether or not they succeed.
    fn run_line(&mut self, line: &str) -> ShellResult<Option<String>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        if !line.starts_with('!') {
            self.history.record(line);
        }
        self.execute(line)
    }
}

fn strip_quotes(pattern: &str) -> &str {
    pattern
        .strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
        .unwrap_or(pattern)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::{FsError, InterpretError};
    use crate::fetch::Download;

    #[derive(Debug, Default)]
    struct StaticFetcher {
        pages: HashMap<String, (String, String)>,
    }

    impl StaticFetcher {
        fn with_page(mut self, url: &str, file_name: &str, body: &str) -> Self {
            self.pages
                .insert(url.into(), (file_name.into(), body.into()));
            self
        }
    }

    impl Fetcher for StaticFetcher {
        fn fetch(&self, url: &str) -> ShellResult<Download> {
            self.pages
                .get(url)
                .map(|(name, body)| Download::new(name.as_str(), body))
                .ok_or_else(|| ShellError::InvalidUrl { url: url.into() })
        }
    }

    fn shell() -> Shell<StaticFetcher> {
        Shell::with_fetcher(StaticFetcher::default())
    }

    /// Runs every line, failing on the first error, and returns the last output.
    fn run_all<F: Fetcher>(shell: &mut Shell<F>, lines: &[&str]) -> anyhow::Result<Option<String>> {
        let mut last = None;
        for line in lines {
            last = shell
                .run_line(line)
                .map_err(|e| anyhow::anyhow!("{line}: {e}"))?;
        }
        Ok(last)
    }

    #[test]
    fn test_mkdir_cd_pwd() -> anyhow::Result<()> {
        // Arrange
        let mut shell = shell();

        // Act
        let output = run_all(&mut shell, &["mkdir a b", "cd a", "mkdir c", "cd c", "pwd"])?;

        // Assert
        assert_eq!(output.as_deref(), Some("/a/c"));
        assert_eq!(shell.current_path(), "/a/c");
        Ok(())
    }

    #[test]
    fn test_mkdir_reports_every_failure() -> anyhow::Result<()> {
        // Arrange
        let mut shell = shell();
        run_all(&mut shell, &["mkdir a"])?;

        // Act
        let result = shell.run_line("mkdir a b missing/c d@");

        // Assert
        let Err(ShellError::MakeDir { failures }) = result else {
            anyhow::bail!("expected a batch failure, got {result:?}");
        };
        let paths: Vec<&str> = failures.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, ["/a", "/missing/c", "/d@"]);
        assert!(shell.fs().is_directory("/b"));
        Ok(())
    }

    #[test]
    fn test_echo_redirection() -> anyhow::Result<()> {
        // Arrange
        let mut shell = shell();

        // Act
        let printed = run_all(&mut shell, &["echo \"hello\""])?;
        let redirected = run_all(
            &mut shell,
            &["echo \"hello\" > f", "echo \"world\" >> f", "echo \"\" > empty"],
        )?;
        let content = run_all(&mut shell, &["cat f"])?;

        // Assert
        assert_eq!(printed.as_deref(), Some("hello"));
        assert_eq!(redirected, None);
        assert_eq!(content.as_deref(), Some("hello\nworld"));
        assert_eq!(shell.fs().read_file("/empty")?, "");
        Ok(())
    }

    #[test]
    fn test_empty_output_does_not_create_target() -> anyhow::Result<()> {
        let mut shell = shell();

        run_all(&mut shell, &["mkdir d", "cd d", "ls > out"])?;
        let created_on_empty = shell.fs().path_exists("/d/out");
        run_all(&mut shell, &["cd /", "ls > d/out"])?;

        assert!(!created_on_empty);
        assert_eq!(shell.fs().read_file("/d/out")?, "d");
        Ok(())
    }

    #[test]
    fn test_cat_joins_with_blank_lines() -> anyhow::Result<()> {
        let mut shell = shell();

        let output = run_all(
            &mut shell,
            &["echo \"one\" > a", "echo \"two\" > b", "cat a b"],
        )?;

        assert_eq!(output.as_deref(), Some("one\n\n\ntwo"));
        Ok(())
    }

    #[test]
    fn test_ls_formats() -> anyhow::Result<()> {
        // Arrange
        let mut shell = shell();
        run_all(
            &mut shell,
            &["mkdir a b", "mkdir a/x a/y", "mkdir a/x/deep", "echo \"t\" > a/f"],
        )?;
        let inputs = ["ls", "ls a", "ls a/f", "ls a/f b", "ls -R a", "ls -R"];
        let outputs = [
            "a\nb",
            "a:\n  f\n  x\n  y",
            "f",
            "f\nb:",
            "a:\n  f\n  x\n  y\nx:\n  deep\ndeep:\ny:",
            "/:\n  a\n  b\na:\n  f\n  x\n  y\nx:\n  deep\ndeep:\ny:\nb:",
        ];

        for (input, output) in inputs.iter().zip(outputs.iter()) {
            // Act
            let result = shell.run_line(input)?;

            // Assert
            assert_eq!(result.as_deref(), Some(*output), "{input}");
        }
        Ok(())
    }

    #[test]
    fn test_grep() -> anyhow::Result<()> {
        // Arrange
        let mut shell = shell();
        run_all(
            &mut shell,
            &[
                "mkdir d",
                "echo \"apple\" > d/f",
                "echo \"banana\" >> d/f",
                "echo \"apricot\" >> d/f",
                "echo \"avocado\" > g",
            ],
        )?;
        let inputs = [
            "grep a.* d/f",
            "grep \"ap.*\" d/f",
            "grep a.* d/f g",
            "grep -R \"a.*o.*\" /",
            "grep ban d/f",
            "grep -R ap.* d/f",
            "grep -R ap.* d",
        ];
        let outputs = [
            Some("apple\napricot".to_string()),
            Some("apple\napricot".to_string()),
            Some("/d/f: apple\n/d/f: apricot\n/g: avocado".to_string()),
            Some("/d/f: apricot\n/g: avocado".to_string()),
            None,
            Some("apple\napricot".to_string()),
            Some("/d/f: apple\n/d/f: apricot".to_string()),
        ];

        for (input, output) in inputs.iter().zip(outputs.iter()) {
            // Act
            let result = shell.run_line(input)?;

            // Assert
            assert_eq!(result, *output, "{input}");
        }
        Ok(())
    }

    #[test]
    fn test_grep_errors() -> anyhow::Result<()> {
        let mut shell = shell();
        run_all(&mut shell, &["mkdir d", "echo \"x\" > f"])?;

        assert!(matches!(
            shell.run_line("grep ( f"),
            Err(ShellError::InvalidRegex { .. })
        ));
        assert!(matches!(
            shell.run_line("grep x d"),
            Err(ShellError::Fs(FsError::WrongType { .. }))
        ));
        Ok(())
    }

    #[test]
    fn test_history_and_recall() -> anyhow::Result<()> {
        // Arrange
        let mut shell = shell();
        run_all(&mut shell, &["mkdir a", "cd a", "pwd", "  ", "cd /"])?;

        // Act
        let recalled = shell.run_line("!3")?;
        let history = shell.run_line("history 3")?;

        // Assert
        assert_eq!(recalled.as_deref(), Some("/"));
        assert_eq!(history.as_deref(), Some("4. cd /\n5. pwd\n6. history 3"));
        assert!(matches!(
            shell.run_line("!9"),
            Err(ShellError::HistoryOutOfRange { .. })
        ));
        assert!(matches!(
            shell.run_line("history x"),
            Err(ShellError::BadHistoryArg { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_failed_lines_are_recorded() -> anyhow::Result<()> {
        let mut shell = shell();

        let err = shell.run_line("frobnicate now").unwrap_err();

        let ShellError::Interpret(err) = err else {
            anyhow::bail!("expected an interpret error, got {err:?}");
        };
        assert!(matches!(err, InterpretError::UnknownCommand { .. }));
        assert_eq!(shell.history().render(None)?, "1. frobnicate now");
        Ok(())
    }

    #[test]
    fn test_pushd_popd_dirs() -> anyhow::Result<()> {
        // Arrange
        let mut shell = shell();
        run_all(&mut shell, &["mkdir a b", "pushd a", "pushd /b"])?;

        // Act
        let dirs = shell.run_line("dirs")?;
        run_all(&mut shell, &["popd"])?;
        let after_one = shell.current_path().to_string();
        run_all(&mut shell, &["popd"])?;
        let empty = shell.run_line("popd");

        // Assert
        assert_eq!(dirs.as_deref(), Some("a\n/"));
        assert_eq!(after_one, "/a");
        assert_eq!(shell.current_path(), "/");
        assert!(matches!(empty, Err(ShellError::Fs(FsError::EmptyStack))));
        Ok(())
    }

    #[test]
    fn test_popd_into_removed_directory() -> anyhow::Result<()> {
        let mut shell = shell();
        run_all(&mut shell, &["mkdir a", "cd a", "pushd /", "rm -r /a"])?;

        let result = shell.run_line("popd");

        assert!(matches!(
            result,
            Err(ShellError::Fs(FsError::InvalidPath { .. }))
        ));
        assert_eq!(shell.current_path(), "/");
        Ok(())
    }

    #[test]
    fn test_removed_working_directory() -> anyhow::Result<()> {
        // Arrange
        let mut shell = shell();
        run_all(&mut shell, &["mkdir a", "mkdir a/b", "cd a/b", "rm -r /a"])?;

        // Act
        let ls = shell.run_line("ls");
        let up = shell.run_line("cd ..");
        let home = shell.run_line("cd /");

        // Assert
        assert!(matches!(ls, Err(ShellError::Fs(FsError::InvalidPath { .. }))));
        assert!(matches!(up, Err(ShellError::Fs(FsError::InvalidPath { .. }))));
        assert!(home.is_ok());
        assert_eq!(shell.current_path(), "/");
        Ok(())
    }

    #[test]
    fn test_rm_needs_recursive_for_directories() -> anyhow::Result<()> {
        let mut shell = shell();
        run_all(&mut shell, &["mkdir d", "echo \"x\" > f"])?;

        let dir = shell.run_line("rm d");
        run_all(&mut shell, &["rm f", "rm -r d"])?;

        assert!(matches!(dir, Err(ShellError::IsDirectory { .. })));
        assert!(!shell.fs().path_exists("/d"));
        assert!(!shell.fs().path_exists("/f"));
        Ok(())
    }

    #[test]
    fn test_mv_and_cp() -> anyhow::Result<()> {
        // Arrange
        let mut shell = shell();
        run_all(
            &mut shell,
            &["mkdir src dst", "echo \"data\" > src/f", "cp src dst", "mv src/f renamed"],
        )?;

        // Act
        let copied = shell.run_line("cat dst/src/f")?;
        let moved = shell.run_line("cat renamed")?;

        // Assert
        assert_eq!(copied.as_deref(), Some("data"));
        assert_eq!(moved.as_deref(), Some("data"));
        assert!(!shell.fs().path_exists("/src/f"));
        Ok(())
    }

    #[test]
    fn test_man() -> anyhow::Result<()> {
        // Arrange
        let mut shell = shell();
        run_all(&mut shell, &["mkdir a", "pwd"])?;

        // Act
        let direct = shell.run_line("man cd")?;
        let recalled = shell.run_line("man !1")?;
        let missing = shell.run_line("man frobnicate");

        // Assert
        assert_eq!(direct.as_deref(), manual::page("cd"));
        assert_eq!(recalled.as_deref(), manual::page("mkdir"));
        assert!(matches!(missing, Err(ShellError::NoManual { .. })));
        Ok(())
    }

    #[test]
    fn test_curl_writes_into_working_directory() -> anyhow::Result<()> {
        // Arrange
        let fetcher = StaticFetcher::default().with_page(
            "http://example.com/notes.txt",
            "notes.txt",
            "first\r\nsecond\n",
        );
        let mut shell = Shell::with_fetcher(fetcher);
        run_all(&mut shell, &["mkdir d", "cd d"])?;

        // Act
        run_all(&mut shell, &["curl http://example.com/notes.txt"])?;
        run_all(&mut shell, &["curl http://example.com/notes.txt"])?;
        let missing = shell.run_line("curl http://example.com/none");

        // Assert
        assert_eq!(shell.fs().read_file("/d/notes.txt")?, "first\nsecond");
        assert!(matches!(missing, Err(ShellError::InvalidUrl { .. })));
        Ok(())
    }
}
