use clap::Parser;
use zonewatch::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
