//! Interactive streaming chat in the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Chat through OpenRouter with the key from PARLEY_API_KEY or ./.parley
//! parley
//!
//! # Use DeepSeek directly with a custom persona
//! parley --provider deepseek --system-file persona.txt
//!
//! # Store a new API key and exit
//! parley --configure
//!
//! # Stream raw text without colors (useful for piping output)
//! parley --plain --no-color
//! ```
//!
//! # Commands
//!
//! - `/new` - Start over with only the system prompt
//! - `/stats` - Show session statistics
//! - `/help` - Show available commands
//! - `/exit` - Exit the application

use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;
use dialoguer::{Confirm, Password};
use indicatif::{ProgressBar, ProgressStyle};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use parley::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, MarkdownRenderer, PlainTextRenderer,
    Renderer, help_text, parse_command,
};
use parley::client::API_KEY_ENV;
use parley::{ChatClient, ClientOptions, CredentialSource, CredentialStore, Error, Transport};

/// Main entry point for the parley application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("parley [OPTIONS]");
    init_tracing(args.verbose);
    let configure = args.configure;

    let config = match ChatConfig::try_from(args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("parley: {err}");
            process::exit(1);
        }
    };
    let store = CredentialStore::new(API_KEY_ENV, Some(config.env_file.clone()));

    if configure {
        prompt_for_key(&store)?;
        return Ok(());
    }

    let api_key = match store.credential() {
        Some(key) => key,
        None => {
            eprintln!(
                "No API key found in {API_KEY_ENV} or {}.",
                config.env_file.display()
            );
            if !confirm("Configure one now?")? {
                eprintln!("An API key is required to chat.");
                process::exit(1);
            }
            prompt_for_key(&store)?
        }
    };

    let mut client = build_client(api_key, &config);
    if config.verify {
        loop {
            match verify(&client).await {
                Ok(()) => break,
                Err(err) if err.is_authentication() => {
                    eprintln!("Authentication failed. Your API key is invalid.");
                    if !confirm("Enter a new API key?")? {
                        process::exit(1);
                    }
                    let api_key = prompt_for_key(&store)?;
                    client = build_client(api_key, &config);
                }
                Err(err) => {
                    eprintln!("Could not reach {}: {err}", client.base_url());
                    process::exit(1);
                }
            }
        }
    }

    let model = client.model().to_string();
    let mut session = ChatSession::from_config(client, &config);

    // Flag for interrupt handling during streaming
    let interrupted = Arc::new(AtomicBool::new(false));

    // Set up Ctrl+C handler
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    let mut renderer: Box<dyn Renderer> = if config.markdown {
        Box::new(MarkdownRenderer::with_color(config.use_color).with_interrupt(interrupted.clone()))
    } else {
        Box::new(PlainTextRenderer::with_color(config.use_color).with_interrupt(interrupted.clone()))
    };
    let mut rl = DefaultEditor::new()?;

    println!("parley (model: {model} via {})", config.provider);
    println!("Type /help for commands, /exit to quit\n");

    loop {
        // Reset interrupt flag before each input
        interrupted.store(false, Ordering::Relaxed);

        match rl.readline("You: ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Exit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::New => {
                            session.reset();
                            renderer.print_info("Started a new conversation.");
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {line}");
                            }
                        }
                        ChatCommand::Stats => print_stats(&session, &model),
                        ChatCommand::Invalid(message) => renderer.print_error(&message),
                    }
                    continue;
                }

                if let Err(err) = session.send_streaming(line, renderer.as_mut()).await {
                    report(renderer.as_mut(), &err);
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "warn,parley=debug" } else { "error" })
    });
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn build_client(api_key: String, config: &ChatConfig) -> ChatClient {
    match ChatClient::with_options(Some(api_key), ClientOptions::from(config)) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("parley: {err}");
            process::exit(1);
        }
    }
}

async fn verify(client: &ChatClient) -> parley::Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Checking API key...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    let result = client.verify().await;
    spinner.finish_and_clear();
    result
}

fn confirm(prompt: &str) -> Result<bool, dialoguer::Error> {
    Confirm::new().with_prompt(prompt).default(true).interact()
}

fn prompt_for_key(store: &CredentialStore) -> Result<String, Box<dyn std::error::Error>> {
    let key = Password::new()
        .with_prompt("Enter your API key")
        .interact()?;
    let key = key.trim().to_string();
    // save() refuses empty keys and keys that would not survive the env file.
    let path = store.save(&key)?;
    println!("API key saved to {}.", path.display());
    Ok(key)
}

fn report(renderer: &mut dyn Renderer, err: &Error) {
    if err.is_authentication() {
        renderer.print_error("Authentication failed. Your API key is invalid.");
    } else {
        renderer.print_error(&format!("An unexpected error occurred: {err}"));
    }
}

fn print_stats<T: Transport>(session: &ChatSession<T>, model: &str) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!("      Model: {model}");
    println!("      Turns: {} ({} exchanges)", stats.turn_count, stats.exchanges);
    println!(
        "      Replies: {} submitted, {} completed, {} failed, {} empty, {} interrupted",
        stats.submitted, stats.completed, stats.failed, stats.empty, stats.abandoned
    );
    println!("      Empty replies: {:?}", session.empty_response_policy());
    if stats.awaiting_reply {
        println!("      Last message has no reply");
    }
}
