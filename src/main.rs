use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "grammar-smoke", about = "Check that compiled tree-sitter grammars load", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load grammars with the tree-sitter runtime and report pass/fail
    Check(commands::check::CheckArgs),
    /// List known grammars and grammar libraries
    List(commands::list::ListArgs),
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check(args) => commands::check::run(args),
        Commands::List(args) => commands::list::run(args),
    }
}
