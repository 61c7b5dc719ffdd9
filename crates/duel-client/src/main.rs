mod app;
mod channel;
mod countdown;
mod event;
mod input;
mod view;

use clap::{Parser, Subcommand};

use duel_common::setup::{DuelSettings, DEFAULT_QUESTION_COUNT, DEFAULT_STUDY_MINUTES};

use crate::app::{ClientOptions, Mode};

/// Study Duel - study a topic against a friend, then race through a quiz
#[derive(Parser, Debug)]
#[command(name = "duel-client", version, about)]
struct Args {
    /// Room service WebSocket URL
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:9001")]
    server: String,

    /// User id announced to the room service (random if omitted)
    #[arg(short, long)]
    user_id: Option<String>,

    /// Base URL used when printing the shareable duel link
    #[arg(long, default_value = "http://localhost:3000")]
    link_base: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new duel room
    Host {
        /// What you are studying
        #[arg(short, long)]
        topic: String,

        /// What the quiz should cover
        #[arg(long)]
        scope: String,

        /// Study time in minutes
        #[arg(short, long, default_value_t = DEFAULT_STUDY_MINUTES)]
        minutes: u32,

        /// Number of quiz questions
        #[arg(short, long, default_value_t = DEFAULT_QUESTION_COUNT)]
        questions: u32,
    },
    /// Join a duel by room code
    Join {
        room_code: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "duel_client=info,duel_common=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mode = match args.command {
        Command::Host {
            topic,
            scope,
            minutes,
            questions,
        } => {
            let mut settings = DuelSettings::new(topic, scope);
            settings.study_time_minutes = minutes;
            settings.question_count = questions;
            Mode::Host(settings)
        }
        Command::Join { room_code } => Mode::Join(room_code),
    };

    let options = ClientOptions {
        server: args.server,
        user_id: args
            .user_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        link_base: args.link_base,
        mode,
    };

    if let Err(e) = app::run(options).await {
        eprintln!("Error: {}", e);
    }

    Ok(())
}
