use std::borrow::Cow;

use miette::{IntoDiagnostic, Result};

use clap_repl::reedline::{
    Prompt, PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus, Reedline, Signal,
};
use tracing::info;

use crate::repl::{render_report, EXIT_COMMAND};
use crate::system::System;

static PROMPT_INDICATOR: &str = "$ ";
static CONTINUATION_INDICATOR: &str = "> ";

/// What the left side of the prompt shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellPromptSegment {
    /// Fixed text given on the command line.
    Text(String),
    /// Full path of the working directory, e.g. `/docs/notes`.
    WorkingDirectory,
    /// Last name of the working directory, `/` at the root.
    DirectoryName,
}

/// Prompt for one line, rendered from the shell state before the line is read.
pub struct ShellPrompt {
    segment: ShellPromptSegment,
    current_path: String,
}

impl ShellPrompt {
    pub fn new(segment: ShellPromptSegment, current_path: impl Into<String>) -> Self {
        Self {
            segment,
            current_path: current_path.into(),
        }
    }

    fn render_segment(&self) -> Cow<'_, str> {
        match &self.segment {
            ShellPromptSegment::Text(text) => Cow::Borrowed(text.as_str()),
            ShellPromptSegment::WorkingDirectory => {
                Cow::Owned(format!("memsh:{}", self.current_path))
            }
            ShellPromptSegment::DirectoryName => {
                let name = match self.current_path.rsplit_once('/') {
                    Some((_, name)) if !name.is_empty() => name,
                    _ => "/",
                };
                Cow::Owned(format!("memsh:{name}"))
            }
        }
    }
}

impl Prompt for ShellPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        self.render_segment()
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _prompt_mode: PromptEditMode) -> Cow<'_, str> {
        match self.segment {
            ShellPromptSegment::Text(_) => Cow::Borrowed(""),
            _ => Cow::Borrowed(PROMPT_INDICATOR),
        }
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed(CONTINUATION_INDICATOR)
    }

    /// Searching recalls earlier lines, the same ones `history` lists.
    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<'_, str> {
        let status = match history_search.status {
            PromptHistorySearchStatus::Passing => "history",
            PromptHistorySearchStatus::Failing => "no earlier line",
        };
        Cow::Owned(format!("({status}: {}) ", history_search.term))
    }
}

/// Interactive session on the terminal with line editing.
pub struct ReplV2 {}

impl ReplV2 {
    /// Runs until `exit`, Ctrl-C or Ctrl-D. Errors are printed as reports.
    pub fn run<S: System>(system: &mut S, segment: ShellPromptSegment) -> Result<()> {
        let mut line_editor = Reedline::create();

        loop {
            let prompt = ShellPrompt::new(segment.clone(), system.current_path());
            let buffer = match line_editor.read_line(&prompt).into_diagnostic()? {
                Signal::Success(buffer) => buffer,
                _ => break,
            };
            if buffer.trim() == EXIT_COMMAND {
                break;
            }

            match system.run_line(&buffer) {
                Ok(Some(output)) => println!("{output}"),
                Ok(None) => {}
                Err(err) => eprintln!("{}", render_report(err)),
            }
        }

        info!("session ended");
        Ok(())
    }
}
