//! t2r-cli - Talk to Refugee terminal client
//!
//! Sign in, find people to talk to, and chat from the terminal.

mod api;
mod auth;
mod cache;
mod chat;
mod config;
mod location;
mod models;
mod notify;
mod profile;
mod push;
mod tui;
mod validation;

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use models::{InterlocutorType, SearchFilters, SignUpForm};
use profile::ProfileChanges;
use tui::log_capture::LogBuffer;

#[derive(Parser)]
#[command(name = "t2r-cli")]
#[command(about = "Terminal client for Talk to Refugee", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: String,

        /// Password (prompted on stdin when omitted)
        #[arg(short, long)]
        password: Option<String>,

        /// Sign in again even if a valid token is stored
        #[arg(short, long)]
        force: bool,
    },

    /// Forget the stored token
    Logout,

    /// Show endpoints and sign-in state
    Status,

    /// Create an account
    Signup {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        /// Password (prompted on stdin when omitted)
        #[arg(long)]
        password: Option<String>,

        /// Short self description
        #[arg(long)]
        about: String,

        /// Date of birth, YYYY-MM-DD
        #[arg(long, value_parser = validation::parse_date)]
        birth_date: NaiveDate,

        /// State code, e.g. SP
        #[arg(long)]
        state: String,

        #[arg(long)]
        city: String,

        /// refugee, immigrant or collaborator
        #[arg(long = "type", value_parser = validation::parse_interlocutor_type)]
        kind: InterlocutorType,
    },

    /// Show or edit your profile
    Profile {
        #[command(subcommand)]
        action: Option<ProfileAction>,
    },

    /// Search people by location and name
    Search {
        /// State code, e.g. SP
        #[arg(long)]
        state: Option<String>,

        #[arg(long)]
        city: Option<String>,

        #[arg(long)]
        name: Option<String>,
    },

    /// List Brazilian states
    States,

    /// List the cities of a state
    Cities {
        /// State code, e.g. RJ
        uf: String,
    },

    /// List conversations
    Chats,

    /// Start a conversation with someone from `search`
    NewChat {
        /// Interlocutor ID
        interlocutor_id: String,
    },

    /// Read messages from a conversation
    Read {
        /// Conversation ID (from `chats` output)
        chat_id: String,
    },

    /// Send a message
    Send {
        /// Conversation ID (from `chats` output)
        chat_id: String,

        /// Message content
        message: String,
    },

    /// Print new-message events from the push channel
    Listen,

    /// Announce a new message in a conversation over the push channel
    Announce {
        chat_id: String,
    },

    /// Launch the terminal user interface
    Tui {
        /// Open this conversation first
        #[arg(long)]
        chat: Option<String>,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Show your profile (default)
    Show,

    /// Change profile fields
    Update {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        about: Option<String>,

        /// Date of birth, YYYY-MM-DD
        #[arg(long)]
        birth_date: Option<String>,

        /// State code, e.g. SP
        #[arg(long)]
        state: Option<String>,

        #[arg(long)]
        city: Option<String>,
    },
}

/// Read a password from stdin when it was not passed as an argument.
fn password_or_prompt(password: Option<String>) -> Result<String> {
    if let Some(p) = password {
        return Ok(p);
    }
    print!("Password: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging. The TUI owns the terminal, so its logs go to a buffer.
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());
    let logs = LogBuffer::new();
    if matches!(cli.command, Commands::Tui { .. }) {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(logs.clone()),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    match cli.command {
        Commands::Login {
            email,
            password,
            force,
        } => {
            let password = password_or_prompt(password)?;
            tracing::info!("Signing in...");
            auth::login(&email, &password, force).await?;
        }
        Commands::Logout => {
            auth::logout().await?;
        }
        Commands::Status => {
            auth::status().await?;
        }
        Commands::Signup {
            name,
            email,
            password,
            about,
            birth_date,
            state,
            city,
            kind,
        } => {
            let password = password_or_prompt(password)?;
            api::sign_up(SignUpForm {
                name,
                about_me: about,
                email,
                password,
                date_of_birth: birth_date,
                current_state: state.trim().to_uppercase(),
                current_city: city,
                interlocutor_type: kind,
            })
            .await?;
        }
        Commands::Profile { action } => match action.unwrap_or(ProfileAction::Show) {
            ProfileAction::Show => {
                api::show_profile().await?;
            }
            ProfileAction::Update {
                name,
                about,
                birth_date,
                state,
                city,
            } => {
                profile::update_profile(ProfileChanges {
                    name,
                    about_me: about,
                    date_of_birth: birth_date,
                    current_state: state,
                    current_city: city,
                })
                .await?;
            }
        },
        Commands::Search { state, city, name } => {
            api::search(SearchFilters {
                current_state: state,
                current_city: city,
                name,
            })
            .await?;
        }
        Commands::States => {
            let config = config::Config::load()?;
            location::list_states(&config.location_url).await?;
        }
        Commands::Cities { uf } => {
            let config = config::Config::load()?;
            location::list_cities(&config.location_url, &uf).await?;
        }
        Commands::Chats => {
            tracing::info!("Fetching conversations...");
            api::list_chats().await?;
        }
        Commands::NewChat { interlocutor_id } => {
            api::create_chat(&interlocutor_id).await?;
        }
        Commands::Read { chat_id } => {
            api::read_messages(&chat_id).await?;
        }
        Commands::Send { chat_id, message } => {
            tracing::info!("Sending message...");
            api::send_message(&chat_id, &message).await?;
        }
        Commands::Listen => {
            push::listen().await?;
        }
        Commands::Announce { chat_id } => {
            push::announce(&chat_id).await?;
        }
        Commands::Tui { chat } => {
            tui::run(chat, logs).await?;
        }
    }

    Ok(())
}
