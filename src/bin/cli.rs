use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use querydesk::{
    config::{McpConfig, SearchConfig},
    db,
    models::User,
    services::user_service::{CreateUserRequest, UpdatePasswordRequest},
    AppState,
};

#[derive(Parser)]
#[command(name = "querydesk-cli")]
#[command(about = "Local administration for a querydesk database", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User management commands
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Search history commands
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },

    /// Print the tools advertised by the MCP endpoint
    Tools,
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a new user
    Create {
        #[arg(short, long)]
        email: String,

        /// Password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,

        /// Mark email as verified
        #[arg(long)]
        verified: bool,
    },

    /// List users
    List {
        #[arg(short, long, default_value_t = 100)]
        limit: i64,

        #[arg(short = 'o', long, default_value_t = 0)]
        offset: i64,
    },

    /// Delete a user by email
    Delete {
        #[arg(short, long)]
        email: String,
    },

    /// Mark a user's email as verified
    Verify {
        #[arg(short, long)]
        email: String,
    },

    /// Set a new password for a user
    SetPassword {
        #[arg(short, long)]
        email: String,

        /// New password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },
}

#[derive(Subcommand)]
enum HistoryCommands {
    /// Show recent searches, newest first
    List {
        /// Only searches recorded for this user id
        #[arg(short, long)]
        user: Option<i64>,

        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },

    /// Delete one recorded search
    Delete { id: i64 },
}

fn prompt_password(prompt: &str) -> anyhow::Result<String> {
    use std::io::{self, Write};
    print!("{}: ", prompt);
    io::stdout().flush()?;
    rpassword::read_password().context("failed to read password")
}

/// Uses `given` as-is, otherwise prompts twice and requires a match
fn password_or_prompt(given: Option<String>, prompt: &str) -> anyhow::Result<String> {
    if let Some(password) = given {
        return Ok(password);
    }
    let password = prompt_password(prompt)?;
    let confirm = prompt_password("Confirm password")?;
    if password != confirm {
        bail!("passwords do not match");
    }
    Ok(password)
}

async fn user_by_email(state: &AppState, email: &str) -> anyhow::Result<User> {
    let email = email.trim().to_lowercase();
    match state.user_service.find_user_by_email(&email).await? {
        Some(user) => Ok(user),
        None => bail!("user '{}' not found", email),
    }
}

async fn run_user(state: &AppState, command: UserCommands) -> anyhow::Result<()> {
    let users = &state.user_service;

    match command {
        UserCommands::Create {
            email,
            password,
            verified,
        } => {
            let password = password_or_prompt(password, "Password")?;
            let user = users
                .create_user(CreateUserRequest {
                    email,
                    password,
                    password_confirm: None,
                    email_verified: verified,
                })
                .await
                .context("failed to create user")?;
            println!("Created user {} <{}>", user.id, user.email);
        }

        UserCommands::List { limit, offset } => {
            let listed = users.list_users(Some(limit), Some(offset)).await?;
            if listed.is_empty() {
                println!("No users found.");
                return Ok(());
            }
            println!("{:<6} {:<40} {:<9} {}", "ID", "Email", "Verified", "Created");
            for user in listed {
                println!(
                    "{:<6} {:<40} {:<9} {}",
                    user.id,
                    user.email,
                    if user.email_verified { "yes" } else { "no" },
                    user.created_at.as_deref().unwrap_or("-")
                );
            }
        }

        UserCommands::Delete { email } => {
            let user = user_by_email(state, &email).await?;
            users.delete_user(user.id).await?;
            println!("Deleted user {} <{}>", user.id, user.email);
        }

        UserCommands::Verify { email } => {
            let user = user_by_email(state, &email).await?;
            if user.email_verified {
                println!("User <{}> is already verified", user.email);
            } else {
                users.verify_user_email(user.id).await?;
                println!("Verified user <{}>", user.email);
            }
        }

        UserCommands::SetPassword { email, password } => {
            let user = user_by_email(state, &email).await?;
            let new_password = password_or_prompt(password, "New password")?;
            users
                .update_password(UpdatePasswordRequest {
                    user_id: user.id,
                    new_password,
                    new_password_confirm: None,
                })
                .await
                .context("failed to update password")?;
            println!("Password updated for <{}>", user.email);
        }
    }

    Ok(())
}

async fn run_history(state: &AppState, command: HistoryCommands) -> anyhow::Result<()> {
    let search = &state.search_service;

    match command {
        HistoryCommands::List { user, limit } => {
            let entries = search.list_history(user, limit, 0).await?;
            if entries.is_empty() {
                println!("No searches recorded.");
                return Ok(());
            }
            for entry in entries {
                println!(
                    "#{:<6} {:<20} {:>3} hits  {}",
                    entry.id, entry.created_at, entry.result_count, entry.query
                );
            }
        }

        HistoryCommands::Delete { id } => {
            search.delete_history(id).await?;
            println!("Deleted search #{}", id);
        }
    }

    Ok(())
}

fn print_tools(state: &AppState) {
    for tool in state.sessions.registry().list_tools() {
        println!(
            "{:<24} {}",
            tool.name,
            tool.description.as_deref().unwrap_or_default()
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let pool = db::create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let state = AppState::new(pool, McpConfig::from_env(), SearchConfig::from_env())?;

    match Cli::parse().command {
        Commands::User { command } => run_user(&state, command).await?,
        Commands::History { command } => run_history(&state, command).await?,
        Commands::Tools => print_tools(&state),
    }

    Ok(())
}
