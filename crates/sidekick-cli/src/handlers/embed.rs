//! Embed command handler.

use anyhow::{Result, bail};
use sidekick_runtime::EngineClient;

use crate::bootstrap::CliContext;
use crate::commands::EngineArgs;
use crate::handlers::serve::start_engine;

/// Print the embedding of `text` as a bracketed list.
pub async fn execute(ctx: &CliContext, model: &str, text: &str, args: &EngineArgs) -> Result<()> {
    start_engine(ctx, model, args).await?;

    let client = EngineClient::new(ctx.supervisor.clone());
    let Some(vector) = client.embed(text).await else {
        bail!("The engine returned no embedding; is the model an embedding model?");
    };

    let values: Vec<String> = vector.iter().map(ToString::to_string).collect();
    println!("[{}]", values.join(", "));
    eprintln!("{} dimensions", vector.len());
    Ok(())
}
