use std::borrow::Cow::{self, Borrowed, Owned};
use std::collections::HashMap;
use std::env;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use rustyline::Editor;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use tokio::runtime::Handle;

use deskchat_core::mention::{DraftBuffer, MentionToken, active_mention, storage_to_display};
use deskchat_core::search::{Debounce, MentionResolver, ResolverOutcome};
use deskchat_core::session::{
    ChatManager, ChatSession, SenderKind, SupporterContext, Transcript,
};
use deskchat_infrastructure::{HttpCompletionClient, HttpEntitySearch, TomlSessionRepository};

const SEARCH_URL_VAR: &str = "DESKCHAT_SEARCH_URL";
const COMPLETION_URL_VAR: &str = "DESKCHAT_COMPLETION_URL";
const DEFAULT_SEARCH_URL: &str = "http://127.0.0.1:8080/api/entity-search";
const DEFAULT_COMPLETION_URL: &str = "http://127.0.0.1:8080/api/chat-completions";

/// CLI helper for rustyline that provides completion, highlighting, and hints.
///
/// Tab inside an `@`-region runs the entity search and offers the candidates;
/// an accepted candidate's token is remembered so the submitted line can be
/// replayed into a [`DraftBuffer`] with its mentions intact.
struct CliHelper {
    commands: Vec<String>,
    resolver: Arc<MentionResolver>,
    runtime: Handle,
    accepted: Arc<Mutex<HashMap<String, MentionToken>>>,
    debounce: Mutex<Debounce>,
}

impl CliHelper {
    fn new(resolver: Arc<MentionResolver>, accepted: Arc<Mutex<HashMap<String, MentionToken>>>) -> Self {
        Self {
            commands: vec![
                "/new".to_string(),
                "/sessions".to_string(),
                "/open".to_string(),
                "/rename".to_string(),
                "/archive".to_string(),
                "/delete".to_string(),
            ],
            resolver,
            runtime: Handle::current(),
            accepted,
            debounce: Mutex::new(Debounce::new(Duration::from_millis(150))),
        }
    }

    fn mention_candidates(&self, query: &str) -> Vec<Pair> {
        if let Ok(mut debounce) = self.debounce.lock() {
            if !debounce.ready() {
                return vec![];
            }
        }
        let outcome = tokio::task::block_in_place(|| {
            self.runtime.block_on(self.resolver.resolve(query))
        });
        match outcome {
            ResolverOutcome::Candidates(candidates) => candidates
                .into_iter()
                .map(|candidate| {
                    let token = MentionToken::new(
                        candidate.kind,
                        &candidate.entity_id,
                        &candidate.display_name,
                    );
                    let display = match &candidate.secondary_text {
                        Some(extra) => {
                            format!("{} [{}] {}", candidate.display_name, candidate.kind, extra)
                        }
                        None => format!("{} [{}]", candidate.display_name, candidate.kind),
                    };
                    let replacement = token.display();
                    if let Ok(mut accepted) = self.accepted.lock() {
                        accepted.insert(replacement.clone(), token);
                    }
                    Pair {
                        display,
                        replacement,
                    }
                })
                .collect(),
            ResolverOutcome::Failed(err) => {
                tracing::warn!("entity search failed: {err}");
                vec![]
            }
            ResolverOutcome::Stale => vec![],
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let prefix = &line[..pos];

        if prefix.starts_with('/') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(prefix))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            return Ok((0, candidates));
        }

        if let Some(active) = active_mention(line, pos) {
            let candidates = self.mention_candidates(&active.query);
            return Ok((active.start, candidates));
        }

        Ok((0, vec![]))
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            return Owned(line.bright_cyan().to_string());
        }
        let accepted = match self.accepted.lock() {
            Ok(accepted) => accepted,
            Err(_) => return Borrowed(line),
        };
        if !accepted.keys().any(|form| line.contains(form.as_str())) {
            return Borrowed(line);
        }
        let mut highlighted = line.to_string();
        for form in accepted.keys() {
            if highlighted.contains(form.as_str()) {
                highlighted =
                    highlighted.replace(form.as_str(), &form.bright_yellow().to_string());
            }
        }
        Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let prefix = &line[..pos];

        if prefix.starts_with('/') && !prefix.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(prefix) && cmd.len() > prefix.len())
                .map(|cmd| cmd[prefix.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

/// Rebuilds a draft from a submitted line, restoring the mention spans for
/// every accepted candidate whose display form appears in the text.
fn draft_from_line(line: &str, accepted: &HashMap<String, MentionToken>) -> DraftBuffer {
    let mut draft = DraftBuffer::new();
    let mut i = 0;
    while i < line.len() {
        if line[i..].starts_with('@') {
            let matched = accepted
                .iter()
                .filter(|(form, _)| line[i..].starts_with(form.as_str()))
                .max_by_key(|(form, _)| form.len());
            if let Some((form, token)) = matched {
                let caret = draft.push_str("@");
                if draft.insert_mention(caret, token).is_ok() {
                    i += form.len();
                    continue;
                }
            }
        }
        let ch_len = line[i..]
            .chars()
            .next()
            .map(|c| c.len_utf8())
            .unwrap_or(1);
        draft.push_str(&line[i..i + ch_len]);
        i += ch_len;
    }
    draft
}

fn print_transcript(transcript: &Transcript) {
    for message in transcript.messages() {
        let text = storage_to_display(&message.content);
        match message.sender {
            SenderKind::User => {
                println!("{}", format!("> {text}").green());
            }
            SenderKind::Ai => {
                for line in text.lines() {
                    println!("{}", line.bright_blue());
                }
            }
        }
    }
}

fn print_sessions(sessions: &[ChatSession]) {
    if sessions.is_empty() {
        println!("{}", "No sessions yet. Start one with /new <title>.".bright_black());
        return;
    }
    for session in sessions {
        println!(
            "{}  {}  {}",
            session.id.bright_black(),
            session.title.bold(),
            format!("[{:?}]", session.status).to_lowercase().bright_black(),
        );
    }
}

/// The main entry point for the deskchat readline REPL.
///
/// Sets up a rustyline-based chat loop that:
/// 1. Wires the TOML session store and the HTTP search/completion clients
/// 2. Provides command completion plus Tab-completion of `@`-mentions
/// 3. Streams assistant replies to the terminal chunk by chunk
/// 4. Cancels an in-flight stream on Ctrl-C
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // ===== Backend Initialization =====
    let repository = Arc::new(TomlSessionRepository::default_location()?);
    let search_url = env::var(SEARCH_URL_VAR).unwrap_or_else(|_| DEFAULT_SEARCH_URL.to_string());
    let completion_url =
        env::var(COMPLETION_URL_VAR).unwrap_or_else(|_| DEFAULT_COMPLETION_URL.to_string());
    let resolver = Arc::new(MentionResolver::new(Arc::new(HttpEntitySearch::new(
        search_url,
    ))));
    let supporter = SupporterContext::new(
        env::var("DESKCHAT_SUPPORTER_ID").unwrap_or_else(|_| "local-supporter".to_string()),
        env::var("DESKCHAT_SUPPORTER_NAME").unwrap_or_else(|_| "Supporter".to_string()),
    );
    let manager = ChatManager::new(
        supporter,
        repository.clone(),
        repository,
        Arc::new(HttpCompletionClient::new(completion_url)),
    );

    // ===== REPL Setup =====
    let accepted = Arc::new(Mutex::new(HashMap::new()));
    let helper = CliHelper::new(Arc::clone(&resolver), Arc::clone(&accepted));
    let mut rl = Editor::new()?;
    rl.set_helper(Some(helper));

    println!("{}", "=== deskchat ===".bright_magenta().bold());
    println!(
        "{}",
        "Type a message, Tab after '@' to mention an entity, '/sessions' to list sessions, or 'quit' to exit."
            .bright_black()
    );
    println!();

    // Resume the session that was active last time, if any.
    let mut current: Option<(ChatSession, Transcript)> = None;
    if let Ok(Some(session)) = manager.active_session().await {
        match manager.open_session(&session.id).await {
            Ok((session, transcript)) => {
                println!("{}", format!("Resuming '{}'", session.title).bright_black());
                print_transcript(&transcript);
                current = Some((session, transcript));
            }
            Err(e) => tracing::warn!("could not resume active session: {e}"),
        }
    }

    // ===== Main REPL Loop =====
    loop {
        let readline = rl.readline(">> ");

        match readline {
            Ok(line) => {
                let trimmed = line.trim();

                if trimmed == "quit" || trimmed == "exit" {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);

                if let Some(rest) = trimmed.strip_prefix('/') {
                    let (command, argument) = match rest.split_once(' ') {
                        Some((command, argument)) => (command, argument.trim()),
                        None => (rest, ""),
                    };
                    if let Err(e) =
                        run_command(&manager, &mut current, command, argument).await
                    {
                        eprintln!("{}", format!("Error: {e}").red());
                    }
                    continue;
                }

                let Some((session, transcript)) = current.as_mut() else {
                    println!(
                        "{}",
                        "No session open. Use '/new <title>' to start one.".yellow()
                    );
                    continue;
                };

                let draft = {
                    let accepted = match accepted.lock() {
                        Ok(accepted) => accepted.clone(),
                        Err(_) => HashMap::new(),
                    };
                    draft_from_line(trimmed, &accepted)
                };

                let mut on_chunk = |chunk: &str| {
                    print!("{}", chunk.bright_blue());
                    let _ = std::io::stdout().flush();
                };
                let send = manager.send(session, transcript, &draft, &mut on_chunk);
                tokio::pin!(send);
                let result = loop {
                    tokio::select! {
                        result = &mut send => break result,
                        _ = tokio::signal::ctrl_c() => {
                            println!();
                            println!("{}", "Cancelling...".yellow());
                            manager.cancel();
                        }
                    }
                };
                println!();
                if let Err(e) = result {
                    eprintln!("{}", format!("Error: {e}").red());
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {err:?}").red());
                break;
            }
        }
    }

    Ok(())
}

/// Dispatches a `/command`. Session-scoped commands require an open session.
async fn run_command(
    manager: &ChatManager,
    current: &mut Option<(ChatSession, Transcript)>,
    command: &str,
    argument: &str,
) -> Result<()> {
    match command {
        "new" => {
            let title = if argument.is_empty() {
                "New conversation"
            } else {
                argument
            };
            let session = manager.create_session(title).await?;
            println!("{}", format!("Started '{}'", session.title).bright_green());
            *current = Some((session, Transcript::new()));
        }
        "sessions" => {
            let sessions = manager.list_sessions().await?;
            print_sessions(&sessions);
        }
        "open" => {
            if argument.is_empty() {
                println!("{}", "Usage: /open <session-id>".yellow());
                return Ok(());
            }
            let (session, transcript) = manager.open_session(argument).await?;
            println!("{}", format!("Opened '{}'", session.title).bright_green());
            print_transcript(&transcript);
            *current = Some((session, transcript));
        }
        "rename" => {
            let Some((session, _)) = current.as_mut() else {
                println!("{}", "No session open.".yellow());
                return Ok(());
            };
            if argument.is_empty() {
                println!("{}", "Usage: /rename <new title>".yellow());
                return Ok(());
            }
            *session = manager.rename_session(&session.id, argument).await?;
            println!("{}", format!("Renamed to '{}'", session.title).bright_green());
        }
        "archive" => {
            let Some((session, _)) = current.as_mut() else {
                println!("{}", "No session open.".yellow());
                return Ok(());
            };
            *session = manager.archive_session(&session.id).await?;
            println!("{}", "Session archived.".bright_green());
        }
        "delete" => {
            let Some((session, _)) = current.take() else {
                println!("{}", "No session open.".yellow());
                return Ok(());
            };
            manager.mark_deleted(&session.id).await?;
            println!("{}", "Session deleted.".bright_green());
        }
        _ => {
            println!("{}", "Unknown command".bright_black());
        }
    }
    Ok(())
}
