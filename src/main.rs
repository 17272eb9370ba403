mod cli;

use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    wxvoice::observability::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => wxvoice::api::run(args.address, args.config).await?,
    }

    Ok(())
}
