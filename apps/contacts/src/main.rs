use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use contact_core::{ContactError, ContactEvent, ContactViewModel, ViewSnapshot, WriteKind};
use storage::Storage;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

mod commands;
mod config;
mod render;
mod writes;

use commands::{parse_command, Command, HELP};
use config::{load_settings, normalize_database_url};
use render::{render, OutputFormat};
use writes::PendingWrites;

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(about = "Interactive contact list backed by SQLite")]
struct Args {
    #[arg(long, default_value = "contacts.toml")]
    config: PathBuf,
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long)]
    grace_period_ms: Option<u64>,
    /// Print each snapshot as one JSON line.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = load_settings(&args.config)?;
    if let Some(url) = args.database_url {
        settings.database_url = url;
    }
    if let Some(ms) = args.grace_period_ms {
        settings.grace_period_ms = ms;
    }

    tracing_subscriber::fmt()
        .with_env_filter(settings.log_filter.as_str())
        .with_writer(std::io::stderr)
        .init();

    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    storage
        .health_check()
        .await
        .context("database health check failed")?;
    info!(%database_url, grace_period_ms = settings.grace_period_ms, "contact store ready");

    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    let view_model = Arc::new(ContactViewModel::new(
        Arc::new(storage),
        settings.view_model_config(),
    ));

    let renderer = tokio::spawn(render_loop(Arc::clone(&view_model), format));

    if format == OutputFormat::Text {
        println!("{HELP}");
    }

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut writes = PendingWrites::default();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            Some((kind, result)) = writes.next_finished() => {
                if let Err(err) = result {
                    report_write_failure(kind, &err);
                }
                continue;
            }
        };
        let Some(line) = line else {
            break;
        };

        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };

        let event = match command {
            Command::Event(event) => event,
            Command::Delete(id) => {
                let snapshot = view_model.snapshot();
                match snapshot.contacts.iter().find(|c| c.id == Some(id)) {
                    Some(contact) => ContactEvent::DeleteContact(contact.clone()),
                    None => {
                        eprintln!("no listed contact with id {id}");
                        continue;
                    }
                }
            }
            Command::Help => {
                println!("{HELP}");
                continue;
            }
            Command::Quit => break,
        };

        if let Some(pending) = view_model.on_event(event) {
            writes.track(pending);
        }
    }

    if !writes.is_empty() {
        info!("waiting for pending writes");
    }
    for (kind, err) in writes.drain().await {
        report_write_failure(kind, &err);
    }
    renderer.abort();
    info!("exiting");
    Ok(())
}

async fn render_loop(view_model: Arc<ContactViewModel<Storage>>, format: OutputFormat) {
    loop {
        let mut subscription = view_model.subscribe();
        print_snapshot(&subscription.current(), format);

        let fault = loop {
            match subscription.changed().await {
                Ok(snapshot) => print_snapshot(&snapshot, format),
                Err(err) => break err,
            }
        };

        eprintln!("{fault}");
        drop(subscription);
        tokio::time::sleep(RESUBSCRIBE_DELAY).await;
    }
}

fn print_snapshot(snapshot: &ViewSnapshot, format: OutputFormat) {
    match render(snapshot, format) {
        Ok(out) => println!("{out}"),
        Err(err) => warn!(error = %err, "failed to render snapshot"),
    }
}

fn report_write_failure(kind: WriteKind, err: &ContactError) {
    eprintln!("{kind:?} failed: {err}");
}
