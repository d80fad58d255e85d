//! Completion scripts for the `permafiles` binary
//!
//! The script is printed to stdout unless `--output` names a file, e.g.
//! `permafiles completions zsh --output ~/.zfunc/_permafiles`.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::Shell;
use tracing::info;

use super::session::CliContext;

#[derive(Debug, clap::Args)]
pub struct CompletionsCommand {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Write the script here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl CompletionsCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        match &self.output {
            None => render(self.shell, &mut io::stdout().lock()),
            Some(path) => {
                let mut file = File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                render(self.shell, &mut file)?;
                info!(shell = %self.shell, path = %path.display(), "completion script written");
                ctx.formatter().success(&format!(
                    "Wrote {} completions to {}",
                    self.shell,
                    path.display()
                ));
                Ok(())
            }
        }
    }
}

fn render(shell: Shell, out: &mut dyn Write) -> Result<()> {
    let mut cli = crate::Cli::command();
    let name = cli.get_name().to_string();
    clap_complete::generate(shell, &mut cli, name, out);
    out.flush().context("Failed to flush completion script")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bash_script_lists_subcommands() {
        let mut script = Vec::new();
        render(Shell::Bash, &mut script).unwrap();
        let script = String::from_utf8(script).unwrap();
        assert!(script.contains("permafiles"));
        assert!(script.contains("share"));
        assert!(script.contains("queue"));
    }
}
