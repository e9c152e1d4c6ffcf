//! drivesense - driver-safety fleet monitor
//!
//! Terminal front end for the drivesense services: sign in, manage the
//! driver roster and inspect each driver's event timeline with live gauges.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Session: $XDG_STATE_HOME/drivesense/session.json (~/.local/state/drivesense/session.json)
//! - Logs: $XDG_STATE_HOME/drivesense/ (~/.local/state/drivesense/)
//! - Config: $XDG_CONFIG_HOME/drivesense/config.toml (~/.config/drivesense/config.toml)

mod account;
mod drivers;
mod events;
mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use drivesense_core::api::Services;
use drivesense_core::{Config, Session, SessionStore};

#[derive(Parser)]
#[command(name = "drivesense")]
#[command(about = "Monitor a fleet of drivers from the terminal")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account and sign in
    Signup(account::SignupArgs),

    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Sign out
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Email a password reset token
    ForgotPassword {
        #[arg(long)]
        email: String,
    },

    /// Set a new password with a reset token
    ResetPassword {
        #[arg(long)]
        token: String,
        #[arg(long)]
        password: String,
    },

    /// View or edit the signed-in account
    #[command(subcommand)]
    Account(account::AccountCommand),

    /// Manage the driver roster
    #[command(subcommand)]
    Drivers(drivers::DriversCommand),

    /// Inspect a driver's event timeline
    #[command(subcommand)]
    Events(events::EventsCommand),
}

/// Everything a command needs once configuration is loaded.
pub struct App {
    pub config: Config,
    pub services: Services,
    pub sessions: SessionStore,
}

impl App {
    /// The signed-in session; commands that show user data require one.
    pub fn session(&self) -> Result<Session> {
        self.sessions.require().map_err(notify)
    }
}

/// Turn a core error into the message shown to the user.
pub fn notify(err: drivesense_core::Error) -> anyhow::Error {
    tracing::warn!(error = %err, "Command failed");
    anyhow::anyhow!(err.user_message())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging (to file, stdout is for command output)
    let _log_guard =
        drivesense_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let services = Services::new(&config.services).context("failed to create service clients")?;
    let ctx = App {
        config,
        services,
        sessions: SessionStore::open_default(),
    };

    match args.command {
        Command::Signup(signup) => account::signup(&ctx, signup).await,
        Command::Login { email, password } => account::login(&ctx, &email, &password).await,
        Command::Logout => account::logout(&ctx),
        Command::Whoami => account::whoami(&ctx),
        Command::ForgotPassword { email } => account::forgot_password(&ctx, &email).await,
        Command::ResetPassword { token, password } => {
            account::reset_password(&ctx, &token, &password).await
        }
        Command::Account(command) => account::run(&ctx, command).await,
        Command::Drivers(command) => drivers::run(&ctx, command).await,
        Command::Events(command) => events::run(&ctx, command).await,
    }
}
