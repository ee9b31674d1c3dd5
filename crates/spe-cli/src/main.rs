//! `spe` command

use clap::Parser;
use spe_cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    cli.init_tracing();

    if let Err(e) = spe_cli::run(cli).await {
        eprintln!("Error [{}]: {e}", e.category());
        for suggestion in e.suggestions() {
            eprintln!("  hint: {suggestion}");
        }
        std::process::exit(1);
    }
}
