mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, LogFormat};
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Dropped when main returns, which flushes buffered file logs.
    let _guard = init_tracing(
        cli.global.verbose,
        cli.global.log_format,
        cli.global.log_file.as_deref(),
    );

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            tracing::error!(error = %err, code, "command failed");
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn init_tracing(verbosity: u8, format: LogFormat, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let Some((dir, file_name)) = log_file.and_then(split_log_path) else {
        match format {
            LogFormat::Text => builder.with_writer(std::io::stderr).init(),
            LogFormat::Json => builder.json().with_writer(std::io::stderr).init(),
        }
        return None;
    };

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    match format {
        LogFormat::Text => builder.with_writer(writer).with_ansi(false).init(),
        LogFormat::Json => builder.json().with_writer(writer).with_ansi(false).init(),
    }
    Some(guard)
}

/// Split `--log-file` into the directory and file name the appender wants.
fn split_log_path(path: &Path) -> Option<(PathBuf, PathBuf)> {
    let file_name = PathBuf::from(path.file_name()?);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    Some((dir, file_name))
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands manage the file themselves
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "hivewatch", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let cfg = config::load(&cli.global)?;
            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &cli.global, &cfg).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_path_without_directory_uses_cwd() {
        assert_eq!(
            split_log_path(Path::new("hivewatch.log")),
            Some((PathBuf::from("."), PathBuf::from("hivewatch.log")))
        );
    }

    #[test]
    fn log_path_keeps_parent() {
        assert_eq!(
            split_log_path(Path::new("/var/log/hivewatch.log")),
            Some((PathBuf::from("/var/log"), PathBuf::from("hivewatch.log")))
        );
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
