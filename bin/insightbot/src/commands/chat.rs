use async_trait::async_trait;
use insightbot_agent::workflow::NO_RESPONSE;
use insightbot_agent::{Feedback, FeedbackSource};
use insightbot_core::RoutingState;
use std::io::{BufRead, Write};
use std::sync::Arc;

use super::client::is_quit_word;
use crate::engine::build_engine;

/// Blocking line read on the blocking pool. `None` on EOF or read error.
pub(crate) async fn prompt_line(prompt: &str) -> Option<String> {
    let prompt = prompt.to_string();
    tokio::task::spawn_blocking(move || {
        print!("{}", prompt);
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    })
    .await
    .ok()
    .flatten()
}

/// Shows the answer, then asks for a rating and comment on the terminal.
pub struct ConsoleFeedback;

#[async_trait]
impl FeedbackSource for ConsoleFeedback {
    async fn gather(&self, state: &RoutingState) -> Feedback {
        println!("\nAssistant: {}\n", state.result.as_deref().unwrap_or(NO_RESPONSE));
        let rating = prompt_line("Rate the answer (1-5): ").await.unwrap_or_default();
        let comment = prompt_line("Optional comment: ").await.unwrap_or_default();
        Feedback::from_input(&rating, &comment)
    }
}

/// Interactive local session with per-answer feedback.
pub async fn run() -> anyhow::Result<()> {
    let (engine, config) = build_engine(Arc::new(ConsoleFeedback))?;

    println!("insightbot interactive mode (model: {})", config.llm.model);
    println!("Type your question, or 'exit' to quit.\n");

    loop {
        let Some(input) = prompt_line("You: ").await else {
            break;
        };
        if input.is_empty() {
            continue;
        }
        if is_quit_word(&input) {
            break;
        }
        engine.run_cycle(&input).await;
    }

    println!("Goodbye!");
    Ok(())
}
