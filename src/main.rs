//! CodeCollab - multi-agent coding assistant
//!
//! A main developer model answers the programmer's request; on rejection
//! two helper models are consulted and their suggestions are merged into a
//! revised answer, looping until the programmer accepts.

mod budget;
mod config;
mod export;
mod llm;
mod prompt;
mod session;
mod state_machine;
mod store;

use config::Config;
use llm::{LoggingInvoker, ModelInvoker, OllamaInvoker};
use session::{SessionDriver, SessionHandle, SessionUpdate, TranscriptStore};
use state_machine::SessionContext;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use store::TranscriptDb;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct ActiveSession {
    name: String,
    handle: SessionHandle,
    driver_task: tokio::task::JoinHandle<()>,
    printer_task: tokio::task::JoinHandle<()>,
}

impl ActiveSession {
    fn close(self) {
        self.driver_task.abort();
        self.printer_task.abort();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codecollab=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Config::from_env();

    // Ensure the database directory exists
    if let Some(parent) = PathBuf::from(&cfg.db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %cfg.db_path, "opening transcript store");
    let db = TranscriptDb::open(&cfg.db_path)?;

    let ollama = OllamaInvoker::new(&cfg.ollama_url);
    match ollama.list_models().await {
        Ok(models) => tracing::info!(?models, "Ollama models available"),
        Err(e) => {
            tracing::warn!(error = %e, "could not list Ollama models; is the daemon running?");
        }
    }
    let invoker: Arc<dyn ModelInvoker> = Arc::new(LoggingInvoker::new(ollama));

    tracing::info!(
        main = %cfg.roster.main,
        helper1 = %cfg.roster.helper1,
        helper2 = %cfg.roster.helper2,
        "agent roster selected"
    );

    println!("CodeCollab - type /help for commands");

    let mut active: Option<ActiveSession> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        match line.split_whitespace().collect::<Vec<_>>().as_slice() {
            ["/help"] => {
                println!("/new <name>     start a conversation");
                println!("/open <name>    open a saved conversation");
                println!("/list           list saved conversations");
                println!("/delete <name>  delete a saved conversation");
                println!("/clear          clear the current conversation");
                println!("/export <path>  export the current conversation");
                println!("/quit           exit");
                println!("anything else is sent to the agents");
            }

            ["/new" | "/open", name] => {
                if let Some(old) = active.take() {
                    old.close();
                }
                active = Some(open_session(name, &db, &invoker, &cfg).await);
                println!("conversation '{name}' is active");
            }

            ["/list"] => {
                for name in db.list().await {
                    println!("{name}");
                }
            }

            ["/delete", name] => match db.delete_conversation(name) {
                Ok(()) => {
                    if active.as_ref().is_some_and(|s| s.name == *name) {
                        if let Some(old) = active.take() {
                            old.close();
                        }
                    }
                    println!("deleted '{name}'");
                }
                Err(e) => println!("error: {e}"),
            },

            ["/clear"] => {
                if let Some(old) = active.take() {
                    let name = old.name.clone();
                    old.close();
                    if let Err(e) =
                        db.save_transcript(&name, &[], &state_machine::SessionState::Initial)
                    {
                        println!("error: {e}");
                    }
                    active = Some(open_session(&name, &db, &invoker, &cfg).await);
                    println!("cleared '{name}'");
                } else {
                    println!("no active conversation");
                }
            }

            ["/export", path] => {
                if let Some(session) = &active {
                    let turns = db.load(&session.name).await;
                    match export::export_to_file(Path::new(path), &session.name, &turns) {
                        Ok(()) => println!("exported to {path}"),
                        Err(e) => println!("error: {e}"),
                    }
                } else {
                    println!("no active conversation");
                }
            }

            ["/quit"] => break,

            _ => {
                if let Some(session) = &active {
                    session.handle.submit(line.as_str()).await;
                } else {
                    println!("no active conversation - use /new <name> first");
                }
            }
        }
    }

    if let Some(session) = active.take() {
        session.close();
    }
    Ok(())
}

async fn open_session(
    name: &str,
    db: &TranscriptDb,
    invoker: &Arc<dyn ModelInvoker>,
    cfg: &Config,
) -> ActiveSession {
    let ctx = SessionContext::new(name, cfg.roster.clone(), cfg.windows.clone());
    let (driver, handle) = SessionDriver::open(ctx, db.clone(), Arc::clone(invoker)).await;

    // Replay the stored history so the user sees where they left off.
    for turn in driver.turns() {
        println!("\n{}\n{}", turn.role, turn.content);
    }

    let mut updates = handle.subscribe();
    let printer_task = tokio::spawn(async move {
        while let Ok(update) = updates.recv().await {
            match update {
                SessionUpdate::TurnAppended(turn) => {
                    println!("\n{}\n{}", turn.role, turn.content);
                }
                SessionUpdate::Error { message } => eprintln!("error: {message}"),
                SessionUpdate::StateChanged(_) => {}
            }
        }
    });
    let driver_task = tokio::spawn(driver.run());

    ActiveSession {
        name: name.to_string(),
        handle,
        driver_task,
        printer_task,
    }
}
