//! Serve command handler.

use anyhow::Result;
use sidekick_runtime::EngineState;
use sidekick_runtime::supervisor::ENGINE_HOST;
use tracing::{info, warn};

use crate::bootstrap::CliContext;
use crate::commands::EngineArgs;

/// Resolve `model`, start the engine with it and wait until it is healthy.
pub(crate) async fn start_engine(ctx: &CliContext, model: &str, args: &EngineArgs) -> Result<u16> {
    let model_path = ctx.resolve_model(model)?;
    let config = ctx.engine_config(&model_path, args)?;
    info!(model = %model_path.display(), port = config.port, "Starting engine");
    Ok(ctx.supervisor.start(config).await?)
}

/// Run the engine in the foreground until Ctrl-C or until it exits.
pub async fn execute(ctx: &CliContext, model: &str, args: &EngineArgs) -> Result<()> {
    let port = start_engine(ctx, model, args).await?;

    println!("Engine ready on http://{ENGINE_HOST}:{port}");
    println!("Press Ctrl+C to stop");

    let mut status = ctx.supervisor.subscribe();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => println!("Stopping engine..."),
        _ = status.wait_for(|s| s.state == EngineState::Stopped) => {
            warn!("Engine exited unexpectedly");
        }
    }

    ctx.supervisor.stop().await;
    Ok(())
}
