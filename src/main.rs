//! Cultivar CLI — validate, inspect, and cook recipes on the local host.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "cultivar",
    version,
    about = "Recipe execution core — validated step graphs, six-way requisites, concurrent cooking"
)]
struct Cli {
    #[command(subcommand)]
    command: cultivar::cli::Commands,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = cultivar::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
