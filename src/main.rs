use clap::Parser;
use stratify::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
