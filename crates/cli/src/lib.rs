pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "rahnuma",
    about = "Rahnuma operator CLI",
    long_about = "Inspect configuration, check the model backend, and run single chat turns locally.",
    after_help = "Examples:\n  rahnuma config\n  rahnuma doctor --json\n  rahnuma ask \"آپ کیسے ہیں؟\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, backend reachability, and model availability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run one message through the chat pipeline and print the reply")]
    Ask {
        #[arg(help = "User message in Urdu")]
        message: String,
        #[arg(long = "history", help = "Prior conversation line; repeat for multiple turns")]
        history: Vec<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Ask { message, history } => commands::ask::run(&message, history),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
