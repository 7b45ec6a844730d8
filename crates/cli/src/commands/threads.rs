//! `parley threads` — Inspect and prune stored conversation threads.

use parley_config::AppConfig;
use parley_core::message::{Message, ThreadId};
use parley_threads::ThreadStore;

fn store() -> Result<ThreadStore, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(ThreadStore::new(parley_threads::build_from_config(&config.threads)))
}

pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let store = store()?;
    let mut ids = store.list().await?;
    if ids.is_empty() {
        println!("  No stored threads ({} backend).", store.backend_name());
        return Ok(());
    }
    ids.sort();
    for id in ids {
        match store.get(&id).await? {
            Some(state) => println!(
                "  {id}  turns={} messages={} updated={}",
                state.turn,
                state.len(),
                state.updated_at.format("%Y-%m-%d %H:%M")
            ),
            None => println!("  {id}"),
        }
    }
    Ok(())
}

pub async fn show(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = store()?;
    let Some(state) = store.get(&ThreadId::from(id)).await? else {
        return Err(format!("No thread named '{id}'").into());
    };
    for message in state.messages() {
        println!("{}", render(message));
    }
    Ok(())
}

pub async fn forget(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = store()?;
    if store.evict(&ThreadId::from(id)).await? {
        println!("  Forgot thread {id}");
    } else {
        println!("  No thread named '{id}'");
    }
    Ok(())
}

fn render(message: &Message) -> String {
    match message {
        Message::System { content } => format!("[system] {content}"),
        Message::User { content } => format!("[user] {content}"),
        Message::Assistant {
            content,
            tool_calls,
        } if !tool_calls.is_empty() => {
            let calls = tool_calls
                .iter()
                .map(|c| format!("{}#{}({})", c.name, c.id, c.arguments))
                .collect::<Vec<_>>()
                .join(", ");
            if content.is_empty() {
                format!("[assistant] calls {calls}")
            } else {
                format!("[assistant] {content} / calls {calls}")
            }
        }
        Message::Assistant { content, .. } => format!("[assistant] {content}"),
        Message::ToolResult {
            tool_call_id,
            name,
            content,
            is_error,
        } => format!(
            "[tool {name}#{tool_call_id}{}] {content}",
            if *is_error { " error" } else { "" }
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::message::ToolCall;
    use serde_json::json;

    #[test]
    fn renders_each_role() {
        assert_eq!(render(&Message::user("Hi")), "[user] Hi");
        assert_eq!(
            render(&Message::assistant_with_tools(
                "",
                vec![ToolCall::new("c1", "multiply", json!({"a": 2}))]
            )),
            r#"[assistant] calls multiply#c1({"a":2})"#
        );
        assert_eq!(
            render(&Message::tool_result("c1", "multiply", "Error: nope", true)),
            "[tool multiply#c1 error] Error: nope"
        );
    }
}
