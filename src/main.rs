//! converse-chat - terminal front end
//!
//! Reads one user input per line and prints the model's reply. `/image`
//! starts a multi-modal turn; `/quit` or end of input exits.

use clap::Parser;
use converse_chat::image::{ImageError, ImageLoader};
use converse_chat::llm::{AnthropicClient, LoggingClient};
use converse_chat::stream::BoxError;
use converse_chat::{ChatConfig, ContentBlock, Conversation, Message, ResponseMode, TurnDriver};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "converse-chat", version, about = "Multi-turn chat with a hosted model")]
struct Cli {
    /// Print replies as they are generated
    #[arg(long)]
    stream: bool,

    /// Model identifier (overrides CONVERSE_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Maximum tokens per reply (overrides CONVERSE_MAX_TOKENS)
    #[arg(long)]
    max_tokens: Option<u32>,

    /// System prompt sent with every request
    #[arg(long)]
    system: Option<String>,

    /// Send image URLs to the model instead of downloading them
    #[arg(long)]
    pass_image_urls: bool,
}

impl Cli {
    fn into_config(self, mut config: ChatConfig) -> ChatConfig {
        if self.stream {
            config.response_mode = ResponseMode::Streaming;
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = max_tokens;
        }
        if self.system.is_some() {
            config.system = self.system;
        }
        config.pass_image_urls |= self.pass_image_urls;
        config
    }
}

/// One line of user input
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Quit,
    Images(Vec<String>),
    Text(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line == "/quit" {
        return Input::Quit;
    }
    match line.strip_prefix("/image") {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => {
            Input::Images(rest.split_whitespace().map(str::to_string).collect())
        }
        _ => Input::Text(line.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout is the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "converse_chat=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = Cli::parse().into_config(ChatConfig::from_env());
    if config.api_key.is_none() {
        tracing::warn!("No API key configured. Set ANTHROPIC_API_KEY.");
    }
    tracing::info!(model = %config.model, mode = ?config.response_mode, "Starting session");

    let client = LoggingClient::new(AnthropicClient::new(&config)?);
    let driver = TurnDriver::new(client, config.response_mode);
    let images = ImageLoader::new(&config)?;
    let mut conversation = Conversation::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let Some(line) = prompt(&mut lines, "\nEnter your message: ").await? else {
            break;
        };

        let blocks = match parse_input(&line) {
            Input::Quit => break,
            Input::Text(text) => vec![ContentBlock::text(text)],
            Input::Images(locators) => {
                match image_turn(&images, &locators, &mut lines).await? {
                    Some(blocks) => blocks,
                    None => continue,
                }
            }
        };

        let cancel = CancellationToken::new();
        let watcher = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            }
        });

        let outcome = match driver.mode() {
            ResponseMode::Sync => driver
                .run_turn_cancellable(&mut conversation, blocks, &mut print_fragment, &cancel)
                .await
                .map(print_reply),
            ResponseMode::Streaming => {
                print!("[Assistant]: ");
                let outcome = driver
                    .run_turn_cancellable(&mut conversation, blocks, &mut print_fragment, &cancel)
                    .await
                    .map(|_| ());
                println!();
                outcome
            }
        };
        watcher.abort();

        if let Err(e) = outcome {
            report(&e);
            if conversation.discard_open_turn().is_some() {
                tracing::info!(turns = conversation.len(), "Discarded unanswered user turn");
            }
        }
    }

    Ok(())
}

async fn prompt(
    lines: &mut Lines<BufReader<Stdin>>,
    text: &str,
) -> std::io::Result<Option<String>> {
    print!("{text}");
    std::io::stdout().flush()?;
    tokio::select! {
        line = lines.next_line() => line,
        _ = tokio::signal::ctrl_c() => Ok(None),
    }
}

/// Load every image, then ask the question that follows them
async fn image_turn(
    images: &ImageLoader,
    locators: &[String],
    lines: &mut Lines<BufReader<Stdin>>,
) -> std::io::Result<Option<Vec<ContentBlock>>> {
    if locators.is_empty() {
        eprintln!("usage: /image <path or url> [<path or url>...]");
        return Ok(None);
    }

    let loaded = tokio::select! {
        loaded = load_images(images, locators) => loaded,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("image loading cancelled");
            return Ok(None);
        }
    };
    let mut blocks = match loaded {
        Ok(blocks) => blocks,
        Err(e) => {
            report(&e);
            return Ok(None);
        }
    };

    let Some(question) =
        prompt(lines, "\nWhat would you like to ask about the image(s)? : ").await?
    else {
        return Ok(None);
    };
    blocks.push(ContentBlock::text(question.trim()));
    Ok(Some(blocks))
}

async fn load_images(
    images: &ImageLoader,
    locators: &[String],
) -> Result<Vec<ContentBlock>, ImageError> {
    let mut blocks = Vec::with_capacity(locators.len() + 1);
    for locator in locators {
        blocks.push(images.block(locator).await?);
    }
    Ok(blocks)
}

fn print_fragment(fragment: &str) -> Result<(), BoxError> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(fragment.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn print_reply(message: &Message) {
    for block in &message.content {
        match block {
            ContentBlock::Text(text) => println!("{text}"),
            ContentBlock::Image { format, .. } => println!("[{} image]", format.media_type()),
        }
    }
}

fn report(err: &dyn std::error::Error) {
    eprintln!("error: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("/quit"), Input::Quit);
        assert_eq!(parse_input("  hello there \n"), Input::Text("hello there".into()));
        assert_eq!(parse_input(""), Input::Text(String::new()));
        assert_eq!(
            parse_input("/image a.png https://x.test/b.jpg"),
            Input::Images(vec!["a.png".into(), "https://x.test/b.jpg".into()])
        );
        assert_eq!(parse_input("/image"), Input::Images(vec![]));
        assert_eq!(parse_input("/imagery is nice"), Input::Text("/imagery is nice".into()));
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "converse-chat",
            "--stream",
            "--model",
            "claude-3-5-haiku-20241022",
            "--max-tokens",
            "256",
        ]);
        let config = cli.into_config(ChatConfig::default());
        assert_eq!(config.response_mode, ResponseMode::Streaming);
        assert_eq!(config.model, "claude-3-5-haiku-20241022");
        assert_eq!(config.max_tokens, 256);
        assert!(!config.pass_image_urls);
    }
}
