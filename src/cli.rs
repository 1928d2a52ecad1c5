use std::path::PathBuf;

use clap::Parser;
use tracing::Level;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct ShellCli {
    /// Run the commands in this file, one per line, instead of a session
    #[arg(short, long)]
    pub script: Option<PathBuf>,

    /// Read commands from stdin without line editing
    #[arg(long)]
    pub plain: bool,

    /// Fixed prompt text instead of the working directory
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Show only the last name of the working directory in the prompt
    #[arg(long, conflicts_with = "prompt")]
    pub short_prompt: bool,

    /// Most verbose log level written to stderr
    #[arg(short, long, default_value_t = Level::WARN)]
    pub log_level: Level,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() -> anyhow::Result<()> {
        let cli = ShellCli::try_parse_from(["memsh"])?;

        assert_eq!(cli.script, None);
        assert!(!cli.plain);
        assert_eq!(cli.prompt, None);
        assert!(!cli.short_prompt);
        assert_eq!(cli.log_level, Level::WARN);
        Ok(())
    }

    #[test]
    fn test_all_flags() -> anyhow::Result<()> {
        let cli = ShellCli::try_parse_from([
            "memsh", "-s", "setup.txt", "--plain", "-p", "> ", "-l", "debug",
        ])?;

        assert_eq!(cli.script, Some(PathBuf::from("setup.txt")));
        assert!(cli.plain);
        assert_eq!(cli.prompt.as_deref(), Some("> "));
        assert_eq!(cli.log_level, Level::DEBUG);
        Ok(())
    }

    #[test]
    fn test_short_prompt_conflicts_with_fixed_prompt() -> anyhow::Result<()> {
        let cli = ShellCli::try_parse_from(["memsh", "--short-prompt"])?;
        assert!(cli.short_prompt);

        let result = ShellCli::try_parse_from(["memsh", "--short-prompt", "-p", "> "]);
        assert!(result.is_err());
        Ok(())
    }
}
