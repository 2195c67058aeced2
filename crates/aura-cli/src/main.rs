//! aura - terminal client for the AuraMind knowledge assistant

mod commands;
mod config;
mod credentials;
mod render;

use aura_chat::{AuthProvider, ChatSession, Error, ExchangeOutcome, HttpBackend};
use clap::Parser;
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use commands::{CommandResult, DEFAULT_TITLE};
use credentials::{ConfiguredAuth, CredentialStore, Credentials};
use render::AnswerPrinter;

/// aura - ask questions about your documents
#[derive(Parser, Debug)]
#[command(name = "aura")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Open an existing conversation by ID
    #[arg(long)]
    conversation: Option<i64>,

    /// Start a new conversation with this title
    #[arg(long)]
    new: Option<String>,

    /// List conversations and exit
    #[arg(long)]
    list: bool,

    /// Ask a single question and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Log in with this email address
    #[arg(long)]
    login: Option<String>,

    /// Forget the stored login
    #[arg(long)]
    logout: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("aura=debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cfg = config::Config::load();
    let backend = Arc::new(HttpBackend::new(cfg.api_url())?);
    let store = CredentialStore::open();

    if let Some(email) = args.login {
        return handle_login(&backend, &store, &email).await;
    }

    if args.logout {
        return handle_logout(&store);
    }

    let auth = Arc::new(ConfiguredAuth::new(cfg.token(), store));
    let Some(token) = auth.bearer_token() else {
        eprintln!("Error: Not logged in");
        eprintln!();
        eprintln!("Options:");
        eprintln!("  1. Login: aura --login <email>");
        eprintln!("  2. Set a token: export AURAMIND_TOKEN=your-token");
        std::process::exit(1);
    };

    if args.list {
        return list_conversations(&backend, &token).await;
    }

    let chat = Arc::new(
        ChatSession::new(backend.clone(), backend.clone(), auth)
            .with_retry_config(cfg.retry_config()),
    );

    if let Some(ref title) = args.new {
        new_conversation(&chat, &backend, title).await?;
    } else if let Some(id) = args.conversation {
        open_conversation(&chat, id).await?;
    }

    // Ctrl-C stops the answer; when idle it exits
    let handle = chat.handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if handle.is_busy() {
                handle.abort();
            } else {
                std::process::exit(130);
            }
        }
    });

    // Non-interactive mode
    if let Some(query) = args.command {
        if chat.session().is_draft() {
            new_conversation(&chat, &backend, DEFAULT_TITLE).await?;
        }
        return match ask(&chat, &query).await {
            Ok(ExchangeOutcome::Failed { .. }) => std::process::exit(1),
            Ok(_) => Ok(()),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        };
    }

    run_interactive(&chat, &backend).await
}

async fn run_interactive(chat: &Arc<ChatSession>, backend: &HttpBackend) -> anyhow::Result<()> {
    if io::IsTerminal::is_terminal(&io::stderr()) {
        match chat.conversation_id() {
            Some(id) => eprintln!("aura ({}) conversation {}", backend.base_url(), id),
            None => eprintln!("aura ({}) - /new to start, /help for commands", backend.base_url()),
        }
        eprintln!();
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(command) = commands::parse_command(input) {
            let result = match command {
                CommandResult::New(title) => new_conversation(chat, backend, &title).await,
                CommandResult::Open(id) => open_conversation(chat, id).await,
                CommandResult::List => match chat.session().token() {
                    Some(token) => list_conversations(backend, token).await,
                    None => Err(Error::AuthExpired.into()),
                },
                CommandResult::Close => {
                    chat.select_conversation(None).await.map_err(Into::into)
                }
                CommandResult::Message(msg) => {
                    println!("{}", msg);
                    Ok(())
                }
                CommandResult::Exit => break,
                CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                    Ok(())
                }
            };
            if let Err(e) = result {
                eprintln!("Error: {}", e);
                if is_auth_error(&e) {
                    break;
                }
            }
            println!();
            continue;
        }

        match ask(chat, input).await {
            Ok(_) => {}
            Err(e) if e.is_auth_expired() => break,
            Err(e) => eprintln!("{}", e),
        }
        println!();
    }

    Ok(())
}

/// Send one question and print the answer as it streams
async fn ask(chat: &Arc<ChatSession>, query: &str) -> aura_chat::Result<ExchangeOutcome> {
    let mut receiver = chat.subscribe();
    let printer = Arc::new(Mutex::new(AnswerPrinter::new(chat.snapshot().messages.len())));

    // Spawn snapshot handler
    let printer_task = {
        let printer = Arc::clone(&printer);
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(snapshot) => {
                        if let Some(text) = printer.lock().delta(&snapshot) {
                            print!("{}", text);
                            io::stdout().flush().ok();
                        }
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        })
    };

    let result = chat.send(query).await;
    printer_task.abort();
    print!("{}", printer.lock().finish(&chat.snapshot()));

    match &result {
        Ok(ExchangeOutcome::Truncated) => eprintln!("[answer incomplete]"),
        Ok(ExchangeOutcome::Cancelled) => eprintln!("[stopped]"),
        Ok(ExchangeOutcome::Failed { message }) => {
            tracing::debug!("Exchange failed: {}", message);
        }
        Ok(ExchangeOutcome::Completed | ExchangeOutcome::Superseded) | Err(_) => {}
    }
    result
}

async fn new_conversation(
    chat: &ChatSession,
    backend: &HttpBackend,
    title: &str,
) -> anyhow::Result<()> {
    let Some(token) = chat.session().token().map(str::to_string) else {
        return Err(Error::AuthExpired.into());
    };
    let conversation = backend.create_conversation(title, &token).await?;
    chat.start_conversation(conversation.id)?;
    println!("Started conversation {}: {}", conversation.id, conversation.title);
    Ok(())
}

async fn open_conversation(chat: &ChatSession, id: i64) -> anyhow::Result<()> {
    chat.select_conversation(Some(id)).await?;
    let snapshot = chat.snapshot();
    if snapshot.messages.is_empty() {
        println!("Conversation {} is empty.", id);
    } else {
        print!("{}", render::render_transcript(&snapshot.messages));
    }
    Ok(())
}

async fn list_conversations(backend: &HttpBackend, token: &str) -> anyhow::Result<()> {
    let conversations = backend.list_conversations(token).await?;
    if conversations.is_empty() {
        println!("No conversations yet. Start one with: aura --new <title>");
        return Ok(());
    }

    println!("{:<8} {:<22} Title", "ID", "Created");
    println!("{}", "-".repeat(60));
    for conversation in conversations {
        println!(
            "{:<8} {:<22} {}",
            conversation.id,
            conversation.created_at.as_deref().unwrap_or("-"),
            conversation.title
        );
    }
    println!("\nOpen with: aura --conversation <id>");
    Ok(())
}

fn is_auth_error(error: &anyhow::Error) -> bool {
    if let Some(e) = error.downcast_ref::<Error>() {
        return e.is_auth_expired();
    }
    matches!(
        error.downcast_ref::<aura_stream::Error>(),
        Some(e) if e.is_auth_expired()
    )
}

async fn handle_login(
    backend: &HttpBackend,
    store: &CredentialStore,
    email: &str,
) -> anyhow::Result<()> {
    let password = match std::env::var("AURAMIND_PASSWORD") {
        Ok(password) => password,
        Err(_) => {
            print!("Password for {}: ", email);
            io::stdout().flush()?;
            let mut input = String::new();
            io::stdin().read_line(&mut input)?;
            input.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    match backend.login(email, &password).await {
        Ok(token) => {
            store.save(&Credentials::new(email, token.access_token))?;
            println!("Logged in as {}", email);
            println!("Credentials saved to {}", store.path().display());
        }
        Err(e) => {
            eprintln!("Login failed: {}", e);
            std::process::exit(1);
        }
    }
    Ok(())
}

fn handle_logout(store: &CredentialStore) -> anyhow::Result<()> {
    match store.remove() {
        Ok(true) => println!("Logged out."),
        Ok(false) => println!("Not logged in."),
        Err(e) => {
            eprintln!("Logout failed: {}", e);
            std::process::exit(1);
        }
    }
    Ok(())
}
