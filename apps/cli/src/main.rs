//! HiveBooks CLI - sign in and manage your HiveBooks session from the terminal.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use commands::ProfileUpdate;

/// HiveBooks CLI - Sign in, manage your profile and check screen access.
#[derive(Parser)]
#[command(name = "hive")]
#[command(about = "HiveBooks CLI for authentication and profile management")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Backend API base URL. Defaults to the configured URL.
    #[arg(long, global = true)]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with email and password
    Login {
        /// Account email (prompted when omitted)
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Create an account and log in
    Register {
        /// Display name (prompted when omitted)
        #[arg(short, long)]
        name: Option<String>,
        /// Account email (prompted when omitted)
        #[arg(short, long)]
        email: Option<String>,
        /// Accept the terms of use without prompting
        #[arg(long)]
        accept_terms: bool,
    },

    /// Logout and clear the stored credential
    Logout,

    /// Check session status
    Status,

    /// Manage your profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Change your password
    Password,

    /// Check whether the current session may open a screen
    Open {
        /// Screen path, e.g. /feed or /admin/usuarios
        path: String,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Update profile fields on the server
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        photo_url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let ctx = match commands::Context::open(cli.api_url.as_deref(), cli.log_level.as_deref()) {
        Ok(ctx) => ctx,
        Err(e) => {
            output::print_error(&format!("{:#}", e), &cli.format);
            std::process::exit(1);
        }
    };

    let format = &cli.format;
    let result = match cli.command {
        Commands::Login { email } => commands::login(&ctx, email, format).await,
        Commands::Register {
            name,
            email,
            accept_terms,
        } => commands::register(&ctx, name, email, accept_terms, format).await,
        Commands::Logout => commands::logout(&ctx, format),
        Commands::Status => commands::status(&ctx, format).await,
        Commands::Profile { command } => match command {
            ProfileCommands::Update {
                name,
                email,
                bio,
                photo_url,
            } => {
                let update = ProfileUpdate {
                    name,
                    email,
                    bio,
                    photo_url,
                };
                commands::profile_update(&ctx, update, format).await
            }
        },
        Commands::Password => commands::change_password(&ctx, format).await,
        Commands::Open { path } => commands::open(&ctx, &path, format).await,
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Command failed");
        output::print_error(&format!("{:#}", e), format);
        std::process::exit(1);
    }
}
