use miette::{IntoDiagnostic, Report, Result};

use crate::system::System;

/// Word that ends a session.
pub static EXIT_COMMAND: &str = "exit";

/// A line-by-line session over plain streams.
///
/// Output of each line goes to `output_stream`, errors go to `error_stream`,
/// and the session goes on after a failing line.
#[derive(Debug, Default)]
pub struct Repl<I, O, E, S>
where
    I: std::io::BufRead,
    O: std::io::Write,
    E: std::io::Write,
    S: System,
{
    input_stream: I,
    output_stream: O,
    error_stream: E,
    system: S,
    prompt: Option<String>,
}

impl<I, O, E, S> Repl<I, O, E, S>
where
    I: std::io::BufRead,
    O: std::io::Write,
    E: std::io::Write,
    S: System,
{
    pub fn new(input_stream: I, output_stream: O, error_stream: E, system: S) -> Self {
        Self {
            input_stream,
            output_stream,
            error_stream,
            system,
            prompt: None,
        }
    }

    /// Writes `prompt` before reading each line.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn system(&self) -> &S {
        &self.system
    }

    /// Runs until end of input or `exit`.
    pub fn run(&mut self) -> Result<()> {
        let mut buffer = String::new();

        loop {
            if let Some(prompt) = &self.prompt {
                let prompt = format!("{}{prompt}", self.system.current_path());
                self.output_stream
                    .write_all(prompt.as_bytes())
                    .into_diagnostic()?;
                self.output_stream.flush().into_diagnostic()?;
            }

            buffer.clear();
            if self.input_stream.read_line(&mut buffer).into_diagnostic()? == 0 {
                break;
            }
            if buffer.trim() == EXIT_COMMAND {
                break;
            }

            match self.system.run_line(&buffer) {
                Ok(Some(output)) => writeln!(self.output_stream, "{output}").into_diagnostic()?,
                Ok(None) => {}
                Err(err) => writeln!(self.error_stream, "{err}").into_diagnostic()?,
            }
        }

        self.output_stream.flush().into_diagnostic()
    }
}

/// Renders an error the way the line editor shows it.
pub fn render_report(err: impl miette::Diagnostic + Send + Sync + 'static) -> String {
    format!("{:?}", Report::new(err))
}
