//! Paths command handler.

use anyhow::Result;

use crate::bootstrap::CliContext;

/// Print every resolved path in `key = value` form.
pub fn execute(ctx: &CliContext) -> Result<()> {
    let config = &ctx.config;
    println!("data_dir = {}", config.data_dir.display());
    println!("models_dir = {}", config.models_dir.display());
    println!("engine_dir = {}", config.engine_dir.display());
    match ctx.engine_binary() {
        Ok(binary) => println!("engine_binary = {}", binary.display()),
        Err(_) => println!("engine_binary = (not installed)"),
    }
    Ok(())
}
