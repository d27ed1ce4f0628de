use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use client_core::{
    ClientConfig, ClientEvent, MutationOutcome, MutationTicket, RenderState, TodoCache, TodoClient,
};
use shared::domain::{TodoId, TodoOrder};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "TODO_SERVER_URL", default_value = "http://127.0.0.1:8123")]
    server_url: Url,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the list in display order.
    List,
    /// Mark a todo done or open.
    Done {
        id: i64,
        #[arg(action = ArgAction::Set)]
        done: bool,
    },
    /// Replace the display order; every id must appear once.
    Reorder {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Toggle a todo twice in quick succession and show where it settles.
    Race { id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let cli = Cli::parse();

    let client = TodoClient::connect(ClientConfig::new(cli.server_url));
    watch_events(&client);
    if let Err(err) = client.load_all().await {
        print_state(&client.render_state());
        return Err(err).context("failed to load todos from server");
    }

    match cli.command {
        Command::List => {}
        Command::Done { id, done } => {
            let ticket = client.set_done(TodoId(id), done);
            report(ticket).await?;
        }
        Command::Reorder { ids } => {
            let ticket = client.set_order(TodoOrder::from(ids))?;
            report(ticket).await?;
        }
        Command::Race { id } => {
            let id = TodoId(id);
            let Some(current) = client
                .snapshot()
                .and_then(|cache| cache.todo(id).map(|todo| todo.done))
            else {
                bail!("todo {id} does not exist");
            };
            let first = client.set_done(id, !current);
            let second = client.set_done(id, current);
            report(first).await?;
            report(second).await?;
        }
    }

    print_state(&client.render_state());
    Ok(())
}

fn watch_events(client: &Arc<TodoClient>) {
    let mut events = client.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ClientEvent::MutationFailed { resource, error }) => {
                    warn!(%resource, %error, "mutation failed");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event listener lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn report(ticket: MutationTicket) -> Result<()> {
    let resource = ticket.resource();
    match ticket.outcome().await? {
        MutationOutcome::Committed => info!(%resource, "committed"),
        MutationOutcome::Superseded => info!(%resource, "superseded by a newer update"),
        MutationOutcome::RolledBack(err) => warn!(%resource, error = %err, "rolled back"),
        MutationOutcome::Skipped => info!(%resource, "nothing to update"),
    }
    Ok(())
}

fn print_state(state: &RenderState) {
    match state {
        RenderState::Loading => println!("loading..."),
        RenderState::Ready(cache) => print_cache(cache),
        RenderState::LoadFailed(message) => println!("could not load todos: {message}"),
        RenderState::InvalidData(message) => println!("server sent invalid data: {message}"),
    }
}

fn print_cache(cache: &TodoCache) {
    for todo in cache.ordered_todos() {
        let mark = if todo.done { 'x' } else { ' ' };
        println!("[{mark}] {:>3}  {}", todo.id.0, todo.title);
    }
}
