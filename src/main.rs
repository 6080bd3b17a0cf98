use bitbot_etl::cli::{run, Cli};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bitbot_etl=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse())
}
