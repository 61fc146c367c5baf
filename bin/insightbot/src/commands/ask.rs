use insightbot_agent::NoFeedback;
use std::sync::Arc;

use crate::engine::build_engine;

/// Answer one query and exit.
pub async fn run(message: String) -> anyhow::Result<()> {
    let (engine, _config) = build_engine(Arc::new(NoFeedback))?;
    let answer = engine.run_cycle(&message).await;
    println!("{}", answer);
    Ok(())
}
