use anyhow::Result;
use clap::Parser;
use run_logger::cli::Cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("run_logger=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    cli.run()
}
