//! `parley chat` — Interactive or single-message conversation.

use futures::StreamExt;
use parley_agent::{Agent, TurnPhase, TurnSnapshot};
use parley_config::AppConfig;
use parley_core::message::{Message, ThreadId};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

pub async fn run(
    message: Option<String>,
    thread: Option<String>,
    trace: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Fail early with setup instructions when no key is configured
    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    export OPENAI_API_KEY=sk-...          (OpenAI)");
        eprintln!("    export OPENROUTER_API_KEY=sk-or-...   (OpenRouter)");
        eprintln!("    export PARLEY_API_KEY=...             (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let agent = Agent::from_config(&config)?;
    let thread_id = thread.map(ThreadId::from).unwrap_or_default();

    if let Some(msg) = message {
        // Single message mode
        if let Some(reply) = turn(&agent, &thread_id, &msg, trace).await? {
            println!("{reply}");
        }
        eprintln!("  (thread: {thread_id})");
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  Parley — Interactive Mode");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", agent.model());
    println!("  Calendar:  {} ({})", config.calendar.backend, config.calendar.time_zone);
    println!("  Thread:    {thread_id}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Ctrl+C cancels a running turn; type 'exit' to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        match turn(&agent, &thread_id, line, trace).await {
            Ok(Some(reply)) => {
                println!();
                for l in reply.lines() {
                    println!("  Parley > {l}");
                }
                println!();
            }
            Ok(None) => eprintln!("  [Cancelled]"),
            Err(e) => eprintln!("  [Error] {e}"),
        }
    }

    println!();
    println!("  Fair winds! (thread: {thread_id})");
    println!();
    Ok(())
}

/// Run one turn; `Ok(None)` means it was cancelled.
async fn turn(
    agent: &Agent,
    thread_id: &ThreadId,
    utterance: &str,
    trace: bool,
) -> Result<Option<String>, parley_agent::TurnError> {
    let cancel = CancellationToken::new();
    let on_interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut stream = agent.submit_turn_with_cancel(thread_id.clone(), utterance, cancel);
    let mut reply = None;
    while let Some(item) = stream.next().await {
        let snapshot = match item {
            Ok(snapshot) => snapshot,
            Err(e) => {
                on_interrupt.abort();
                return Err(e);
            }
        };
        if trace && let Some(line) = describe(&snapshot) {
            eprintln!("  · {line}");
        }
        if snapshot.phase == TurnPhase::Done {
            reply = snapshot.reply().map(str::to_string);
        }
    }

    on_interrupt.abort();
    Ok(reply)
}

/// One trace line for an intermediate snapshot.
fn describe(snapshot: &TurnSnapshot) -> Option<String> {
    match snapshot.phase {
        TurnPhase::AwaitingModel => match snapshot.latest()? {
            Message::ToolResult {
                name,
                content,
                is_error,
                ..
            } => Some(format!(
                "{name} {} {content}",
                if *is_error { "failed:" } else { "->" }
            )),
            _ => Some("asking the model".into()),
        },
        TurnPhase::ExecutingTools => {
            let calls = snapshot.latest()?.tool_calls();
            Some(
                calls
                    .iter()
                    .map(|c| format!("{}({})", c.name, c.arguments))
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        }
        TurnPhase::Done | TurnPhase::Cancelled => None,
    }
}
