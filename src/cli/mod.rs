//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod render;

use std::error::Error;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

use crate::cli::render::{render_history, render_response, step_line};
use crate::core::config::data::path_display;
use crate::core::config::{Config, ConfigKey};
use crate::core::conversation::{ConversationEvent, ConversationStore};
use crate::core::credentials::{resolve_api_key, CredentialError};
use crate::core::gateway::AudioPayload;
use crate::core::keyring::{delete_api_key, store_api_key};
use crate::core::message::{ChatMessage, InputKind};
use crate::core::openai::{OpenAiClient, ProviderSettings};
use crate::core::orchestrator::FeedbackOrchestrator;
use crate::utils::logging::init_tracing;
use crate::utils::media::save_audio_reference;

#[derive(Parser)]
#[command(name = "repcoach")]
#[command(about = "A terminal fitness coach backed by the OpenAI API")]
#[command(
    long_about = "Repcoach answers fitness questions with a short reply, an optional workout \
plan, an illustrative image, a spoken cue, and follow-up suggestions.\n\n\
Authentication:\n\
  Use 'repcoach auth' to store an API key securely in your system keyring.\n\n\
Environment Variables:\n\
  OPENAI_API_KEY    Your OpenAI API key (takes precedence over the keyring)\n\
  OPENAI_BASE_URL   Custom API base URL (optional, defaults to https://api.openai.com/v1)\n\
  REPCOACH_LOG      Diagnostic log filter, e.g. 'repcoach=debug' (defaults to warn)\n\n\
Chat commands:\n\
  /pick <n>         Send the n-th suggested follow-up question\n\
  /history          Show the conversation so far\n\
  /clear            Forget the conversation\n\
  /quit             Leave the chat"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Chat model to use instead of the configured one
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Write diagnostic logs to the specified file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Save synthesized speech into this directory
    #[arg(long, global = true, value_name = "DIR")]
    pub audio_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a single question and print the coach's answer
    Ask {
        /// The question to ask
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
        /// Print the structured response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Transcribe a recorded question and answer it
    Listen {
        /// Audio file to transcribe (mp3, wav, m4a, ogg, webm)
        file: PathBuf,
        /// Print the structured response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start an interactive chat (default)
    Chat,
    /// Store an API key in the system keyring
    Auth,
    /// Remove the stored API key
    Deauth,
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: String,
        /// Value to set for the key
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        value: Vec<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
    /// Print the current configuration
    Config,
}

/// A line typed at the chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Submit(String),
    Pick(usize),
    History,
    Clear,
    Quit,
    Empty,
    Unknown(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ReplCommand::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return ReplCommand::Submit(line.to_string());
        };

        let mut parts = command.split_whitespace();
        match (parts.next().unwrap_or_default(), parts.next()) {
            ("quit" | "exit", None) => ReplCommand::Quit,
            ("clear", None) => ReplCommand::Clear,
            ("history", None) => ReplCommand::History,
            ("pick", Some(index)) => match index.parse::<usize>() {
                Ok(index) if index > 0 => ReplCommand::Pick(index),
                _ => ReplCommand::Unknown(line.to_string()),
            },
            _ => ReplCommand::Unknown(line.to_string()),
        }
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.log.as_deref())?;

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Auth => run_auth(),
        Commands::Deauth => {
            if delete_api_key()? {
                println!("✅ Removed the stored API key");
            } else {
                println!("No API key was stored");
            }
            Ok(())
        }
        Commands::Set { key, value } => {
            let key = ConfigKey::parse(&key)?;
            let value = value.join(" ");
            let mut config = Config::load()?;
            config.set_value(key, &value)?;
            config.save()?;
            println!("✅ Set {} to: {}", key.as_str(), value.trim());
            Ok(())
        }
        Commands::Unset { key } => {
            let key = ConfigKey::parse(&key)?;
            let mut config = Config::load()?;
            config.unset_value(key);
            config.save()?;
            println!("✅ Unset {}", key.as_str());
            Ok(())
        }
        Commands::Config => {
            let config = Config::load()?;
            config.print_all();
            println!();
            println!("Config file: {}", path_display(Config::config_path()?));
            Ok(())
        }
        Commands::Ask { prompt, json } => {
            let session = Session::connect(args.model, args.audio_dir)?;
            let content = prompt.join(" ");
            session.answer(&content, InputKind::Text, json).await
        }
        Commands::Listen { file, json } => {
            let mut session = Session::connect(args.model, args.audio_dir)?;
            let reply = session.listen(&file).await?;
            session.print_message(&reply, json)
        }
        Commands::Chat => {
            let session = Session::connect(args.model, args.audio_dir)?;
            session.repl().await
        }
    }
}

fn run_auth() -> Result<(), Box<dyn Error>> {
    print!("Enter your OpenAI API key: ");
    io::stdout().flush()?;
    let mut key = String::new();
    io::stdin().read_line(&mut key)?;
    let key = key.trim();
    if key.is_empty() {
        return Err("API key cannot be empty".into());
    }
    store_api_key(key)?;
    println!("✅ API key stored securely in the system keyring");
    Ok(())
}

fn exit_with_credential_error(err: &CredentialError) -> ! {
    eprintln!("{err}");
    let fixes = err.quick_fixes();
    if !fixes.is_empty() {
        eprintln!();
        eprintln!("💡 Quick fixes:");
        for fix in fixes {
            eprintln!("  • {fix}");
        }
    }
    std::process::exit(err.exit_code());
}

struct Session {
    orchestrator: FeedbackOrchestrator,
    store: ConversationStore,
    events: UnboundedReceiver<ConversationEvent>,
    audio_dir: Option<PathBuf>,
}

impl Session {
    fn connect(model: Option<String>, audio_dir: Option<PathBuf>) -> Result<Self, Box<dyn Error>> {
        let config = Config::load()?;
        let api_key = match resolve_api_key() {
            Ok(key) => key,
            Err(err) => exit_with_credential_error(&err),
        };

        let mut settings = ProviderSettings::from_config(&config);
        if let Some(model) = model.filter(|model| !model.trim().is_empty()) {
            settings.chat_model = model;
        }
        debug!(base_url = %settings.base_url, model = %settings.chat_model, "Connecting");

        let client = Arc::new(OpenAiClient::new(api_key, settings));
        let orchestrator = FeedbackOrchestrator::new(client.clone(), client)
            .with_step_delay(config.step_delay());
        let (store, events) = ConversationStore::new();

        Ok(Self {
            orchestrator,
            store,
            events,
            audio_dir,
        })
    }

    async fn transcribe(&self, file: &Path) -> Result<String, Box<dyn Error>> {
        let bytes = tokio::fs::read(file).await?;
        let extension = file.extension().and_then(|ext| ext.to_str());
        let payload = AudioPayload::from_extension(bytes, extension);
        let transcript = self.orchestrator.media().transcribe(payload).await?;
        let transcript = transcript.trim().to_string();
        if transcript.is_empty() {
            return Err(format!("No speech recognized in {}", path_display(file)).into());
        }
        Ok(transcript)
    }

    /// Transcribes a recording and submits the transcript as audio input.
    async fn listen(&mut self, file: &Path) -> Result<ChatMessage, Box<dyn Error>> {
        let transcript = self.transcribe(file).await?;
        eprintln!("🎙  {transcript}");
        Ok(self.submit(&transcript, InputKind::Audio).await)
    }

    /// Submits while echoing step changes to stderr as they happen.
    async fn submit(&mut self, content: &str, kind: InputKind) -> ChatMessage {
        let submission = self.store.submit(&self.orchestrator, content, kind);
        tokio::pin!(submission);
        loop {
            tokio::select! {
                message = &mut submission => {
                    while let Ok(event) = self.events.try_recv() {
                        report_progress(&event);
                    }
                    return message;
                }
                Some(event) = self.events.recv() => report_progress(&event),
            }
        }
    }

    fn save_audio(&self, message: &ChatMessage) -> Option<PathBuf> {
        let dir = self.audio_dir.as_deref()?;
        let audio = message.response.as_ref()?.audio_url.as_deref()?;
        match save_audio_reference(audio, dir, &message.id) {
            Ok(saved) => saved,
            Err(err) => {
                warn!(error = %err, "Could not save audio");
                eprintln!("⚠️  Could not save audio: {err}");
                None
            }
        }
    }

    fn print_message(&self, message: &ChatMessage, json: bool) -> Result<(), Box<dyn Error>> {
        let Some(response) = &message.response else {
            return Ok(());
        };
        let saved = self.save_audio(message);
        if json {
            println!("{}", serde_json::to_string_pretty(response)?);
        } else {
            println!("{}", render_response(response, saved.as_deref()));
        }
        Ok(())
    }

    async fn answer(mut self, content: &str, kind: InputKind, json: bool) -> Result<(), Box<dyn Error>> {
        let reply = self.submit(content, kind).await;
        self.print_message(&reply, json)
    }

    async fn repl(mut self) -> Result<(), Box<dyn Error>> {
        println!("💪 repcoach: ask about exercises, machines, or a plan. /quit to leave.");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("> ");
            io::stdout().flush()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };

            let content = match ReplCommand::parse(&line) {
                ReplCommand::Empty => continue,
                ReplCommand::Quit => break,
                ReplCommand::Clear => {
                    self.store.clear();
                    println!("Conversation cleared.");
                    continue;
                }
                ReplCommand::History => {
                    println!("{}", render_history(&self.store.messages()));
                    continue;
                }
                ReplCommand::Unknown(command) => {
                    println!("Unknown command: {command}");
                    continue;
                }
                ReplCommand::Pick(index) => {
                    let picked = self
                        .store
                        .latest_response()
                        .and_then(|response| response.suggestions)
                        .and_then(|suggestions| suggestions.get(index - 1).cloned());
                    match picked {
                        Some(suggestion) => {
                            println!("> {suggestion}");
                            suggestion
                        }
                        None => {
                            println!("No suggestion numbered {index}.");
                            continue;
                        }
                    }
                }
                ReplCommand::Submit(content) => content,
            };

            let reply = self.submit(&content, InputKind::Text).await;
            self.print_message(&reply, false)?;
            println!();
        }

        Ok(())
    }
}

fn report_progress(event: &ConversationEvent) {
    if let ConversationEvent::StepChanged(Some(step)) = event {
        eprintln!("{}", step_line(*step));
    }
}
