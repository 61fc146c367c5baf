use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use super::chat::prompt_line;

pub const QUIT_WORDS: [&str; 5] = ["exit", "quit", "bye", "close", "end"];
const IDLE_TIMEOUT: Duration = Duration::from_secs(240);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub fn is_quit_word(input: &str) -> bool {
    let lowered = input.trim().to_lowercase();
    QUIT_WORDS.contains(&lowered.as_str())
}

fn is_yes(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Render a gateway reply for the terminal.
fn describe_response(status: StatusCode, body: &str) -> String {
    if !status.is_success() {
        return format!("Server returned {}: {}", status.as_u16(), body);
    }
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["response"].as_str().map(str::to_string))
        .map(|r| format!("Bot: {}", r))
        .unwrap_or_else(|| "Bot: No response received.".to_string())
}

enum Turn {
    Line(String),
    Eof,
    Idle,
    Interrupted,
}

async fn next_turn(read: impl Future<Output = Option<String>>, idle: Duration) -> Turn {
    tokio::select! {
        read = tokio::time::timeout(idle, read) => match read {
            Ok(Some(line)) => Turn::Line(line),
            Ok(None) => Turn::Eof,
            Err(_) => Turn::Idle,
        },
        _ = tokio::signal::ctrl_c() => Turn::Interrupted,
    }
}

/// Exits directly: the pending stdin read on the blocking pool cannot be
/// cancelled and would hold up runtime shutdown until the next line.
fn close_abandoned_session(notice: &str) -> ! {
    println!("\n{}", notice);
    println!("\nSession closed. Goodbye!");
    std::process::exit(0)
}

/// Chat against a running `insightbot gateway`.
pub async fn run(url: String) -> anyhow::Result<()> {
    let base = url.trim_end_matches('/').to_string();
    let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

    println!("{}", "=".repeat(70));
    println!("insightbot remote client");
    println!("Connected to: {}", base);
    println!("Type your query below, or type 'exit' to quit.");
    println!("{}", "=".repeat(70));

    loop {
        let query = match next_turn(prompt_line("User: "), IDLE_TIMEOUT).await {
            Turn::Line(line) if line.is_empty() => continue,
            Turn::Line(line) => line,
            Turn::Eof => break,
            Turn::Idle => close_abandoned_session("Session closed automatically after 4 minutes of inactivity."),
            Turn::Interrupted => close_abandoned_session("Interrupted. Closing session gracefully..."),
        };

        if is_quit_word(&query) {
            let confirm = prompt_line("Do you really want to close the chat? (yes/no): ")
                .await
                .unwrap_or_default();
            if is_yes(&confirm) {
                println!("\nThank you for using insightbot!");
                break;
            }
            println!("Okay, continuing...\n");
            continue;
        }

        println!("Thinking...\n");
        let reply = http
            .get(format!("{}/chat", base))
            .query(&[("query", query.as_str())])
            .send()
            .await;
        match reply {
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                debug!(status = status.as_u16(), bytes = body.len(), "Gateway replied");
                println!("{}\n", describe_response(status, &body));
            }
            Err(e) if e.is_timeout() => println!("Network error: request timed out after {}s\n", REQUEST_TIMEOUT.as_secs()),
            Err(e) if e.is_connect() => println!("Network error: could not connect to {} ({})\n", base, e),
            Err(e) => println!("Network error: {}\n", e),
        }
    }

    println!("\nSession closed. Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quit_words() {
        for w in ["exit", "QUIT", " bye ", "Close", "end"] {
            assert!(is_quit_word(w), "{}", w);
        }
        assert!(!is_quit_word("exit now"));
        assert!(!is_quit_word("weekend"));
    }

    #[test]
    fn test_confirmation() {
        assert!(is_yes("Y"));
        assert!(is_yes(" yes "));
        assert!(!is_yes("no"));
        assert!(!is_yes(""));
    }

    #[tokio::test]
    async fn test_idle_turn_does_not_wait_for_input() {
        let started = std::time::Instant::now();
        let turn = next_turn(std::future::pending::<Option<String>>(), Duration::from_millis(50)).await;
        assert!(matches!(turn, Turn::Idle));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_turn_reads_line_and_eof() {
        let turn = next_turn(async { Some("leave policy".to_string()) }, IDLE_TIMEOUT).await;
        assert!(matches!(turn, Turn::Line(line) if line == "leave policy"));
        assert!(matches!(next_turn(async { None }, IDLE_TIMEOUT).await, Turn::Eof));
    }

    #[test]
    fn test_describe_response() {
        let ok = describe_response(StatusCode::OK, r#"{"query":"q","response":"20 days"}"#);
        assert_eq!(ok, "Bot: 20 days");
        assert_eq!(describe_response(StatusCode::OK, "{}"), "Bot: No response received.");
        assert_eq!(
            describe_response(StatusCode::BAD_REQUEST, r#"{"error":"missing query"}"#),
            r#"Server returned 400: {"error":"missing query"}"#
        );
    }
}
