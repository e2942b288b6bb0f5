pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pheona_vapi::assistant::VoiceGender;

use crate::commands::create_agent::CreateAgentArgs;
use crate::commands::provision::ProvisionArgs;

#[derive(Debug, Parser)]
#[command(
    name = "pheona",
    about = "Pheona operator CLI",
    long_about = "Create voice agents and provision their phone numbers against the Vapi API.",
    after_help = "Examples:\n  pheona provision --assistant-id asst_123 --area-code 510\n  pheona create-agent --name \"Front Desk\" --system-prompt \"...\" --voice female\n  pheona config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a pheona.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Provision a phone number for an existing assistant and wait until it routes"
    )]
    Provision {
        #[arg(long)]
        assistant_id: String,
        #[arg(long, help = "Display name for the phone number")]
        label: Option<String>,
        #[arg(long = "area-code", help = "Preferred area code; repeat to try several in order")]
        area_codes: Vec<String>,
        #[arg(long)]
        poll_interval_secs: Option<u64>,
        #[arg(long)]
        deadline_secs: Option<u64>,
    },
    #[command(about = "Create an assistant and attach a phone number to it")]
    CreateAgent {
        #[arg(long)]
        name: String,
        #[arg(long)]
        system_prompt: String,
        #[arg(long, default_value = "Hello! How can I help you today?")]
        first_message: String,
        #[arg(long, default_value = "auto", help = "male | female | auto")]
        voice: VoiceGender,
        #[arg(long = "area-code")]
        area_codes: Vec<String>,
        #[arg(long, help = "Only create the assistant")]
        no_phone: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Provision {
            assistant_id,
            label,
            area_codes,
            poll_interval_secs,
            deadline_secs,
        } => commands::provision::run(ProvisionArgs {
            config_path: cli.config,
            assistant_id,
            label,
            area_codes,
            poll_interval_secs,
            deadline_secs,
        }),
        Command::CreateAgent {
            name,
            system_prompt,
            first_message,
            voice,
            area_codes,
            no_phone,
        } => commands::create_agent::run(CreateAgentArgs {
            config_path: cli.config,
            name,
            system_prompt,
            first_message,
            voice,
            area_codes,
            attach_phone: !no_phone,
        }),
        Command::Config => commands::config::run(cli.config.as_deref()),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
