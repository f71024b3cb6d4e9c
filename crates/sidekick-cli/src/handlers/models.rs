//! Model artifact command handlers.

use anyhow::Result;
use sidekick_core::{CatalogError, list_available, scan_local};
use sidekick_download::{TransferError, TransferProgress, partial_path};
use sidekick_runtime::remove_artifact;
use tokio_util::sync::CancellationToken;

use crate::bootstrap::CliContext;
use crate::presentation::{print_separator, transfer_bar, truncate_string, update_transfer_bar};

/// List the catalog, marking artifacts already on disk.
pub fn list(ctx: &CliContext) -> Result<()> {
    let models_dir = &ctx.config.models_dir;

    println!(
        "{:<24} {:<28} {:<7} {:<9} {:<10} Status",
        "ID", "Name", "Params", "Size", "Category"
    );
    print_separator(90);

    for entry in list_available() {
        let status = if entry.is_downloaded(models_dir) {
            "downloaded"
        } else if partial_path(&entry.local_path(models_dir)).is_file() {
            "partial"
        } else {
            "--"
        };
        println!(
            "{:<24} {:<28} {:<7} {:<9} {:<10} {}",
            entry.id,
            truncate_string(entry.name, 27),
            entry.parameters,
            entry.size_label,
            entry.category,
            status
        );
    }
    Ok(())
}

/// List artifact files in the models directory.
pub fn local(ctx: &CliContext) -> Result<()> {
    let models_dir = &ctx.config.models_dir;
    let artifacts = scan_local(models_dir)?;

    if artifacts.is_empty() {
        println!("No models found in {}.", models_dir.display());
        println!("Use 'sidekick models download <id>' to fetch one.");
        return Ok(());
    }

    println!("{:<48} Size", "File");
    print_separator(60);
    for artifact in artifacts {
        println!(
            "{:<48} {}",
            truncate_string(&artifact.name, 47),
            artifact.size_label
        );
    }
    Ok(())
}

/// Download a catalog artifact. Ctrl-C stops the transfer and keeps the
/// partial file so the next run resumes it.
pub async fn download(ctx: &CliContext, id: &str) -> Result<()> {
    let entry = sidekick_core::resolve(id)?;
    let destination = entry.local_path(&ctx.config.models_dir);

    if destination.is_file() {
        println!("{} is already downloaded: {}", entry.name, destination.display());
        return Ok(());
    }

    println!("Downloading {} ({})", entry.name, entry.size_label);
    let bar = transfer_bar(entry.filename);
    let report = {
        let bar = bar.clone();
        move |progress: TransferProgress| update_transfer_bar(&bar, &progress)
    };

    let cancel = CancellationToken::new();
    let transfer = ctx
        .transfer
        .download(entry.url, &destination, &cancel, &report);
    tokio::pin!(transfer);

    let result = tokio::select! {
        result = &mut transfer => result,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            transfer.await
        }
    };

    match result {
        Ok(path) => {
            bar.finish_and_clear();
            println!("Saved to {}", path.display());
            Ok(())
        }
        Err(TransferError::Cancelled) => {
            bar.abandon_with_message("cancelled");
            println!(
                "Download cancelled. Partial file kept at {}; run the same command to resume.",
                partial_path(&destination).display()
            );
            Ok(())
        }
        Err(e) => {
            bar.abandon_with_message("failed");
            Err(e.into())
        }
    }
}

/// Delete a downloaded artifact, stopping the engine first if it has it
/// loaded. A leftover partial download is removed as well.
pub async fn delete(ctx: &CliContext, name: &str) -> Result<()> {
    let models_dir = &ctx.config.models_dir;
    let path = sidekick_core::resolve(name)
        .map_or_else(|_| models_dir.join(name), |entry| entry.local_path(models_dir));

    let removed_partial = tokio::fs::remove_file(partial_path(&path)).await.is_ok();

    match remove_artifact(&ctx.supervisor, &path).await {
        Ok(()) => println!("Deleted {}", path.display()),
        Err(CatalogError::NotFound(_)) if removed_partial => {
            println!("Deleted partial download of {}", path.display());
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
