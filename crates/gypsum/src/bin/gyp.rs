use std::process::ExitCode;

use clap::Parser;
use gypsum::cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cli.log_filter()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let program = std::env::args().next().unwrap_or_else(|| "gyp".to_string());
    let result = cli
        .context(|name| std::env::var(name).ok(), &program)
        .map_err(Into::into)
        .and_then(|ctx| gypsum::driver::run(&ctx));

    match result {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("gyp: {} {e}", e.kind());
            Ok(ExitCode::FAILURE)
        }
    }
}
