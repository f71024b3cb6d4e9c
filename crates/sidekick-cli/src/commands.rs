//! Commands enum and subcommands.

use clap::{Args, Subcommand};

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// List, download and delete model artifacts
    Models {
        #[command(subcommand)]
        command: ModelsCommand,
    },

    /// Install or inspect the inference engine
    Engine {
        #[command(subcommand)]
        command: EngineCommand,
    },

    /// Run the engine with a model until interrupted
    Serve {
        /// Catalog id, local file name or path of the model
        #[arg(short, long)]
        model: String,
        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Send a prompt and stream the reply to stdout
    Chat {
        /// Catalog id, local file name or path of the model
        #[arg(short, long)]
        model: String,
        /// The user prompt
        prompt: String,
        /// Optional system prompt
        #[arg(long)]
        system: Option<String>,
        /// Maximum tokens to generate
        #[arg(long)]
        max_tokens: Option<u32>,
        /// Sampling temperature
        #[arg(long)]
        temperature: Option<f32>,
        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Print the embedding vector of a text
    Embed {
        /// Catalog id, local file name or path of the model
        #[arg(short, long)]
        model: String,
        /// Text to embed
        text: String,
        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Show resolved data, models and engine paths
    Paths,
}

/// Model artifact commands.
#[derive(Subcommand)]
pub enum ModelsCommand {
    /// List models available for download
    List,

    /// List model files in the models directory
    Local,

    /// Download a model from the catalog
    Download {
        /// Catalog id (see `sidekick models list`)
        id: String,
    },

    /// Delete a downloaded model
    Delete {
        /// Catalog id or file name
        name: String,
    },
}

/// Engine management commands.
#[derive(Subcommand)]
pub enum EngineCommand {
    /// Download the latest engine release for this platform
    Install {
        /// Reinstall even if an engine is already present
        #[arg(short, long)]
        force: bool,
    },

    /// Show whether the engine is installed
    Status,
}

/// Engine launch overrides shared by the commands that start the engine.
#[derive(Args, Debug, Clone, Default)]
pub struct EngineArgs {
    /// Context size in tokens
    #[arg(long = "ctx-size")]
    pub ctx_size: Option<u32>,

    /// Worker threads
    #[arg(long)]
    pub threads: Option<usize>,

    /// Port for the engine
    #[arg(long)]
    pub port: Option<u16>,
}
