use std::fs::File;
use std::io::{self, BufReader};

use clap::Parser;
use memsh::{
    cli::ShellCli,
    repl::Repl,
    repl_v2::{ReplV2, ShellPromptSegment},
    system::Shell,
};
use miette::{IntoDiagnostic, Result};

fn main() -> Result<()> {
    let cli = ShellCli::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(cli.log_level)
        .init();

    let mut shell = Shell::new();

    if let Some(script) = cli.script {
        let file = File::open(&script).into_diagnostic()?;
        return Repl::new(BufReader::new(file), io::stdout(), io::stderr(), shell).run();
    }

    if cli.plain {
        let prompt = cli.prompt.unwrap_or_else(|| "$ ".to_string());
        return Repl::new(io::stdin().lock(), io::stdout(), io::stderr(), shell)
            .with_prompt(prompt)
            .run();
    }

    let segment = match cli.prompt {
        Some(text) => ShellPromptSegment::Text(text),
        None if cli.short_prompt => ShellPromptSegment::DirectoryName,
        None => ShellPromptSegment::WorkingDirectory,
    };
    ReplV2::run(&mut shell, segment)
}
