use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    config::Config,
    models::message::Role,
    services::conversation::{Attachment, ChatController},
    state::AppState,
    storage::{FileStore, KeyValueStore, default_data_dir},
};

/// Pixel-art themed chat: HTTP gateway and terminal client.
#[derive(Parser, Debug)]
#[command(name = "pixel-chat", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Chat in the terminal, keeping history in a local store.
    Chat(ChatArgs),
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Directory of the local store.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    /// Model to start with.
    #[arg(long)]
    pub model: Option<String>,
}

/// One line of REPL input.
#[derive(Debug, PartialEq, Eq)]
pub enum ReplCommand {
    Say(String),
    Attach(PathBuf),
    New,
    History,
    Open(String),
    Delete(String),
    ClearHistory,
    Model(Option<String>),
    Theme,
    SignUp { email: String, name: Option<String> },
    Login(String),
    Logout,
    Profile { name: Option<String>, pic: Option<String> },
    Help,
    Quit,
    Invalid(String),
}

const HELP: &str = "\
commands:
  /attach <path>          attach a file to the next message
  /new                    start a new chat
  /history                list saved chats
  /open <id>              reopen a chat
  /delete <id>            delete a chat
  /clear-history          delete all chats
  /model [id]             show or select the model
  /theme                  toggle light/dark
  /signup <email> [name]  create a local profile
  /login <email>          select the stored profile
  /logout                 forget the profile
  /profile [name] [pic]   update name and picture
  /quit                   leave";

/// Parses one line of REPL input.
pub fn parse_line(line: &str) -> ReplCommand {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return ReplCommand::Say(line.to_string());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let arg = (!arg.is_empty()).then(|| arg.to_string());

    match (name, arg) {
        ("attach", Some(path)) => ReplCommand::Attach(PathBuf::from(path)),
        ("new", _) => ReplCommand::New,
        ("history", _) => ReplCommand::History,
        ("open", Some(id)) => ReplCommand::Open(id),
        ("delete", Some(id)) => ReplCommand::Delete(id),
        ("clear-history", _) => ReplCommand::ClearHistory,
        ("model", model) => ReplCommand::Model(model),
        ("theme", _) => ReplCommand::Theme,
        ("signup", Some(arg)) => {
            let (email, name) = split_first(&arg);
            ReplCommand::SignUp { email, name }
        }
        ("login", Some(email)) => ReplCommand::Login(email),
        ("logout", _) => ReplCommand::Logout,
        ("profile", arg) => {
            let (name, pic) = match arg {
                Some(arg) => {
                    let (name, pic) = split_first(&arg);
                    (Some(name), pic)
                }
                None => (None, None),
            };
            ReplCommand::Profile { name, pic }
        }
        ("help", _) => ReplCommand::Help,
        ("quit" | "exit", _) => ReplCommand::Quit,
        (other, _) => ReplCommand::Invalid(format!("unknown command or missing argument: /{other}")),
    }
}

fn split_first(arg: &str) -> (String, Option<String>) {
    match arg.split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_string(), Some(rest.trim().to_string())),
        None => (arg.to_string(), None),
    }
}

/// Runs the terminal client until `/quit` or end of input.
pub async fn run_chat(config: &Config, args: ChatArgs) -> Result<()> {
    let data_dir = args
        .data_dir
        .or_else(|| config.data_dir.clone())
        .unwrap_or_else(default_data_dir);
    let store = FileStore::open(&data_dir)
        .with_context(|| format!("Failed to open local store in {}", data_dir.display()))?;

    let state = AppState::new(config);
    let model = args.model.unwrap_or_else(|| config.default_model.clone());
    let mut chat = ChatController::open(Arc::clone(&state.gateway), store, model)?;

    if !state.gateway.is_configured() {
        println!("! OpenAI API key is not configured. Please add it to your .env file.");
    }
    match chat.user() {
        Some(user) => println!("PIXEL AI - signed in as {} ({} chats)", user.display_name(), chat.sessions().len()),
        None => println!("PIXEL AI - anonymous, chats are not saved (/signup or /login)"),
    }
    println!("model: {} | theme: {} | /help for commands", chat.model(), chat.theme());

    let mut pending: Option<Attachment> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            ReplCommand::Quit => break,
            ReplCommand::Say(text) => {
                if text.is_empty() && pending.is_none() {
                    continue;
                }
                println!("...");
                match chat.submit(&text, pending.take()).await {
                    Ok(reply) => println!("AI> {}", reply.content),
                    Err(e) => println!("! {}", e),
                }
            }
            ReplCommand::Attach(path) => match Attachment::from_path(&path) {
                Ok(file) => {
                    println!("attached {} ({})", file.name, file.mime_type);
                    pending = Some(file);
                }
                Err(e) => println!("! {}", e),
            },
            ReplCommand::New => {
                chat.new_chat();
                pending = None;
                println!("new chat");
            }
            ReplCommand::History => print_history(&chat),
            ReplCommand::Open(id) => {
                if chat.open_session(&id) {
                    for message in chat.transcript() {
                        let who = match message.role {
                            Role::User => "YOU",
                            Role::Assistant => "AI",
                            Role::System => "SYS",
                        };
                        println!("{}> {}", who, message.content);
                    }
                } else {
                    println!("! no chat with id {}", id);
                }
            }
            ReplCommand::Delete(id) => match chat.delete_session(&id) {
                Ok(true) => println!("deleted {}", id),
                Ok(false) => println!("! no chat with id {}", id),
                Err(e) => println!("! {}", e),
            },
            ReplCommand::ClearHistory => match chat.clear_history() {
                Ok(()) => println!("All chats cleared successfully!"),
                Err(e) => println!("! {}", e),
            },
            ReplCommand::Model(None) => println!("model: {}", chat.model()),
            ReplCommand::Model(Some(model)) => {
                chat.set_model(model);
                println!("model: {}", chat.model());
            }
            ReplCommand::Theme => match chat.toggle_theme() {
                Ok(theme) => println!("theme: {}", theme),
                Err(e) => println!("! {}", e),
            },
            ReplCommand::SignUp { email, name } => match chat.sign_up(&email, name.as_deref()) {
                Ok(user) => println!("welcome, {}", user.display_name()),
                Err(e) => println!("! {}", e),
            },
            ReplCommand::Login(email) => match chat.sign_in(&email) {
                Ok(user) => println!("signed in as {}", user.display_name()),
                Err(e) => println!("! {}", e),
            },
            ReplCommand::Logout => match chat.sign_out() {
                Ok(()) => println!("signed out"),
                Err(e) => println!("! {}", e),
            },
            ReplCommand::Profile { name, pic } => {
                match chat.update_profile(name.as_deref(), pic.as_deref()) {
                    Ok(_) => println!("Profile updated successfully!"),
                    Err(e) => println!("! {}", e),
                }
            }
            ReplCommand::Help => println!("{}", HELP),
            ReplCommand::Invalid(msg) => println!("! {}", msg),
        }
    }

    Ok(())
}

fn print_history<S: KeyValueStore>(chat: &ChatController<S>) {
    if chat.sessions().is_empty() {
        println!("no saved chats");
        return;
    }
    for session in chat.sessions() {
        let marker = if chat.current_chat_id() == Some(session.id.as_str()) { "*" } else { " " };
        println!(
            "{} {}  {}  {} ({} messages)",
            marker,
            session.id,
            session.created_at.format("%Y-%m-%d %H:%M"),
            session.title,
            session.messages.len()
        );
    }
}
