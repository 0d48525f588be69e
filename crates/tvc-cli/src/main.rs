use clap::Parser;

mod cli;
mod commands;
mod config;
mod repo;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    init_tracing(&cli);
    commands::run_command(cli)
}

/// `--verbose` wins; otherwise use the repository's `[log] level`.
fn init_tracing(cli: &cli::Cli) {
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        config::RepoConfig::load(&cli.repo.join(repo::TVC_DIR).join("config.toml"))
            .and_then(|config| config.log_level())
            .unwrap_or(tracing::Level::WARN)
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}
