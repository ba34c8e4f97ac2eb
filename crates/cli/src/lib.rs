pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "rollcall",
    about = "Rollcall operator CLI",
    long_about = "Check runtime readiness, inspect configuration, and preview roster sheets as the bot would render them.",
    after_help = "Examples:\n  rollcall doctor --json\n  rollcall config\n  rollcall preview --sheet 1AbC_d --tab Mooncrat\n  rollcall preview --demo"
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
    #[command(about = "Validate config, Slack token readiness, and optionally sheet access")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
        #[arg(long, help = "Spreadsheet id to probe for read access")]
        sheet: Option<String>,
        #[arg(long, help = "Tab to probe; defaults to sheets.default_tab")]
        tab: Option<String>,
    },
    #[command(about = "Render every party table of a roster sheet")]
    Preview {
        #[arg(long, required_unless_present = "demo", help = "Spreadsheet id to read")]
        sheet: Option<String>,
        #[arg(long, help = "Tab to read; defaults to sheets.default_tab")]
        tab: Option<String>,
        #[arg(long, help = "Render the built-in demo roster without contacting Google")]
        demo: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json, sheet, tab } => {
            commands::doctor::run(json, sheet.as_deref(), tab.as_deref())
        }
        Command::Preview { sheet, tab, demo } => {
            commands::preview::run(commands::preview::PreviewOptions { sheet, tab, demo })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
