pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "remedi",
    about = "Remedi operator CLI",
    long_about = "Operate Remedi migrations, demo data, readiness checks, and one-shot chat turns.",
    after_help = "Examples:\n  remedi doctor --json\n  remedi seed\n  remedi chat --user user-demo-001 \"I need Paracetamol\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo catalog, user, and prescriptions")]
    Seed,
    #[command(about = "Inspect effective configuration values with secrets redacted")]
    Config,
    #[command(about = "Validate config, provider credentials, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run one chat turn through the full pipeline and print the response")]
    Chat {
        #[arg(long, default_value = "user-demo-001", help = "User id to chat as")]
        user: String,
        #[arg(help = "The message to send")]
        message: String,
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
        Command::Chat { user, message } => commands::chat::run(&user, &message),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
