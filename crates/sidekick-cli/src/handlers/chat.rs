//! Chat command handler.

use std::io::Write;

use anyhow::{Result, bail};
use futures_util::StreamExt;
use sidekick_core::{ChatMessage, ChatOptions};
use sidekick_runtime::{EngineClient, StreamEnd, StreamEvent};

use crate::bootstrap::CliContext;
use crate::commands::EngineArgs;
use crate::handlers::serve::start_engine;

/// Arguments for the chat command.
#[derive(Debug, Clone)]
pub struct ChatArgs {
    pub model: String,
    pub prompt: String,
    pub system: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub engine: EngineArgs,
}

impl ChatArgs {
    fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(self.prompt.clone()));
        messages
    }

    fn options(&self) -> ChatOptions {
        let mut options = ChatOptions::default();
        if let Some(max_tokens) = self.max_tokens {
            options = options.with_max_tokens(max_tokens);
        }
        if let Some(temperature) = self.temperature {
            options = options.with_temperature(temperature);
        }
        options
    }
}

/// Stream one completion to stdout. Ctrl-C aborts the stream.
pub async fn execute(ctx: &CliContext, args: ChatArgs) -> Result<()> {
    start_engine(ctx, &args.model, &args.engine).await?;

    let client = EngineClient::new(ctx.supervisor.clone());
    let mut stream = client.chat_stream(&args.messages(), args.options());
    let mut stdout = std::io::stdout();

    let end = loop {
        tokio::select! {
            event = stream.next() => match event {
                Some(StreamEvent::Chunk(text)) => {
                    write!(stdout, "{text}")?;
                    stdout.flush()?;
                }
                Some(StreamEvent::End(end)) => break end,
                None => break StreamEnd::Failed("stream closed".to_string()),
            },
            _ = tokio::signal::ctrl_c() => stream.abort(),
        }
    };
    writeln!(stdout)?;

    match end {
        StreamEnd::Completed => Ok(()),
        StreamEnd::Aborted => {
            eprintln!("(interrupted)");
            Ok(())
        }
        StreamEnd::Failed(reason) => bail!("Chat failed: {reason}"),
    }
}
