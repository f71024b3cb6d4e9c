//! CLI entry point.

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use sidekick_cli::handlers::{self, chat::ChatArgs};
use sidekick_cli::{Cli, CliContext, CliOverrides, Commands, EngineCommand, ModelsCommand, bootstrap};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let ctx = bootstrap(CliOverrides {
        models_dir: cli.models_dir,
    })?;

    let result = dispatch(&ctx, command).await;
    ctx.supervisor.shutdown().await;
    result
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(ctx: &CliContext, command: Commands) -> Result<()> {
    match command {
        Commands::Models { command } => match command {
            ModelsCommand::List => handlers::models::list(ctx)?,
            ModelsCommand::Local => handlers::models::local(ctx)?,
            ModelsCommand::Download { id } => handlers::models::download(ctx, &id).await?,
            ModelsCommand::Delete { name } => handlers::models::delete(ctx, &name).await?,
        },
        Commands::Engine { command } => match command {
            EngineCommand::Install { force } => handlers::engine::install(ctx, force).await?,
            EngineCommand::Status => handlers::engine::status(ctx)?,
        },
        Commands::Serve { model, engine } => {
            handlers::serve::execute(ctx, &model, &engine).await?;
        }
        Commands::Chat {
            model,
            prompt,
            system,
            max_tokens,
            temperature,
            engine,
        } => {
            let args = ChatArgs {
                model,
                prompt,
                system,
                max_tokens,
                temperature,
                engine,
            };
            handlers::chat::execute(ctx, args).await?;
        }
        Commands::Embed {
            model,
            text,
            engine,
        } => {
            handlers::embed::execute(ctx, &model, &text, &engine).await?;
        }
        Commands::Paths => handlers::paths::execute(ctx)?,
    }
    Ok(())
}
