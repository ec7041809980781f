use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tts_qa::args::{Cli, Commands};
use tts_qa::{analysis, comments, generate, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Generate(args) => {
            info!("Starting sample generation against {}", args.base_url);
            generate::run(args).await
        }
        Commands::Serve(args) => server::start_server(args).await,
        Commands::Analyze(args) => analysis::run(args),
        Commands::Comments(args) => comments::run(args),
    }
}
