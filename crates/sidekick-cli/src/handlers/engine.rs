//! Engine install and status handlers.

use anyhow::Result;
use sidekick_download::{AcquireError, AcquireProgress};

use crate::bootstrap::CliContext;
use crate::presentation::percent_bar;

/// Download and unpack the engine. Ctrl-C cancels the download.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub async fn install(ctx: &CliContext, force: bool) -> Result<()> {
    if !force {
        if let Ok(binary) = ctx.engine_binary() {
            println!("Engine already installed: {}", binary.display());
            println!("Use --force to reinstall.");
            return Ok(());
        }
    }

    let bar = percent_bar();
    let report = {
        let bar = bar.clone();
        move |progress: AcquireProgress| {
            bar.set_position(progress.percent.clamp(0.0, 100.0) as u64);
            bar.set_message(progress.message);
        }
    };

    let acquire = ctx.installer.acquire(&ctx.config.engine_dir, &report);
    tokio::pin!(acquire);

    let result = tokio::select! {
        result = &mut acquire => result,
        _ = tokio::signal::ctrl_c() => {
            ctx.installer.cancel();
            acquire.await
        }
    };

    match result {
        Ok(binary) => {
            bar.finish_and_clear();
            println!("Engine installed: {}", binary.display());
            Ok(())
        }
        Err(AcquireError::Cancelled) => {
            bar.abandon_with_message("cancelled");
            println!("Engine install cancelled.");
            Ok(())
        }
        Err(e) => {
            bar.abandon_with_message("failed");
            Err(e.into())
        }
    }
}

/// Report whether an engine binary is installed.
pub fn status(ctx: &CliContext) -> Result<()> {
    match ctx.engine_binary() {
        Ok(binary) => println!("Engine installed: {}", binary.display()),
        Err(_) => {
            println!("Engine not installed under {}.", ctx.config.engine_dir.display());
            println!("Run 'sidekick engine install' to fetch it.");
        }
    }
    Ok(())
}
