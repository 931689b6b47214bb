use clap::Args;
use grammar_smoke::library;
use grammar_smoke::provider::{self, GrammarProvider};
use std::path::PathBuf;

#[derive(Args)]
pub struct ListArgs {
    /// Also list grammar libraries found in this directory
    #[arg(long)]
    pub library_dir: Option<PathBuf>,
}

pub fn run(args: ListArgs) {
    println!("Linked grammars:");
    for grammar in provider::bundled() {
        let state = if grammar.is_linked() { "linked" } else { "not linked" };
        println!("  {:<12} {:<12} {}", grammar.name(), grammar.display_name(), state);
    }

    if let Some(dir) = args.library_dir {
        if !dir.is_dir() {
            eprintln!("Error: library directory '{}' does not exist", dir.display());
            std::process::exit(1);
        }
        let found = library::discover(&dir);
        println!("Libraries in {}:", dir.display());
        if found.is_empty() {
            println!("  (none)");
        }
        for lib in found {
            println!("  {:<12} {}", lib.name, lib.path.display());
        }
    }
}
