// ATCLI - AT Command Line Interface
use atcli::cli::args::Args;
use atcli::cli::commands::{execute_command, version_text};
use clap::Parser;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.version {
        println!("{}", version_text());
        return ExitCode::SUCCESS;
    }

    match execute_command(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
