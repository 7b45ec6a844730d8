//! Parley CLI — the main entry point.
//!
//! Commands:
//! - `onboard`  — Write a default config file
//! - `chat`     — Interactive or single-message conversation
//! - `calendar` — Inspect the configured calendar directly
//! - `threads`  — List, show or forget stored conversation threads

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "parley",
    about = "Parley — a conversational scheduling agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    Onboard,

    /// Chat with the agent
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Continue an existing thread
        #[arg(short, long)]
        thread: Option<String>,

        /// Print every intermediate step of a turn to stderr
        #[arg(long)]
        trace: bool,
    },

    /// Work with the configured calendar
    Calendar {
        #[command(subcommand)]
        action: CalendarAction,
    },

    /// Manage stored conversation threads
    Threads {
        #[command(subcommand)]
        action: ThreadsAction,
    },
}

#[derive(Subcommand)]
enum CalendarAction {
    /// List upcoming events
    List {
        /// How many events to show
        #[arg(short = 'n', long, default_value_t = 10)]
        max: u32,
    },

    /// Search events by free text
    Search {
        query: String,

        /// Lower bound (RFC 3339)
        #[arg(long)]
        from: Option<String>,

        /// Upper bound (RFC 3339)
        #[arg(long)]
        to: Option<String>,
    },

    /// Delete an event by id
    Delete { id: String },
}

#[derive(Subcommand)]
enum ThreadsAction {
    /// List stored threads
    List,

    /// Print a thread's transcript
    Show { id: String },

    /// Delete a thread
    Forget { id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat {
            message,
            thread,
            trace,
        } => commands::chat::run(message, thread, trace).await?,
        Commands::Calendar { action } => match action {
            CalendarAction::List { max } => commands::calendar::list(max).await?,
            CalendarAction::Search { query, from, to } => {
                commands::calendar::search(&query, from.as_deref(), to.as_deref()).await?
            }
            CalendarAction::Delete { id } => commands::calendar::delete(&id).await?,
        },
        Commands::Threads { action } => match action {
            ThreadsAction::List => commands::threads::list().await?,
            ThreadsAction::Show { id } => commands::threads::show(&id).await?,
            ThreadsAction::Forget { id } => commands::threads::forget(&id).await?,
        },
    }

    Ok(())
}
