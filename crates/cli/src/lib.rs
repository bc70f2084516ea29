pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "coursefinder",
    about = "Course finder operator CLI",
    long_about = "Apply migrations, load the demo catalog, inspect configuration, check readiness, \
                  and try messages against the course pipeline without Messenger.",
    after_help = "Examples:\n  coursefinder doctor --json\n  coursefinder seed\n  coursefinder ask --user u1 \"add CSE 344\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo course catalog (idempotent) and verify every course landed")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, webhook URL, classifier and database readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run one message through the pipeline with the keyword classifier")]
    Ask {
        #[arg(long, help = "Sender id whose course list is read and changed")]
        user: String,
        #[arg(required = true, help = "Message text, e.g. \"find CSE 344\"")]
        text: Vec<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Ask { user, text } => commands::ask::run(&user, &text.join(" ")),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
