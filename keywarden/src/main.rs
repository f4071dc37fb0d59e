#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;

use std::sync::Arc;

use anyhow::Context;
use args::{Args, Command};
use async_trait::async_trait;
use clap::Parser;
use keywarden_client::{AdminApi, AdminClient};
use keywarden_config::Config;
use keywarden_core::{CookieErrorStore, ErrorEvent, ErrorInput, ErrorStore, FileCookieJar, SystemClock, extract_permission};
use keywarden_notifier::{Effect, ErrorPoller, NotifyingStore, PermissionRepair, Reload, RepairOutcome};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;

    // Initialize telemetry
    let _telemetry_guard = keywarden_telemetry::init(&config.telemetry)?;

    tracing::debug!(config_path = %args.config.display(), "configuration loaded");

    let jar = Arc::new(FileCookieJar::new(&config.store.jar_path));
    let store = Arc::new(NotifyingStore::new(Arc::new(CookieErrorStore::from_config(
        &config.store,
        jar,
        Arc::new(SystemClock),
    ))));

    match args.command {
        Command::List { json } => list(store.as_ref(), json)?,
        Command::Record {
            message,
            warning,
            status,
            context,
            url,
            method,
        } => {
            let mut input = if warning {
                ErrorInput::warning(message)
            } else {
                ErrorInput::error(message)
            };
            if let Some(status) = status {
                input = input.with_status(status);
            }
            if let Some(context) = context {
                input = input.with_context(context);
            }
            if let Some(url) = url {
                input = input.with_request(url, method);
            }

            let event = store.record(input);
            println!("{}", event.id);
        }
        Command::Dismiss { id } => store.dismiss(&id),
        Command::Clear => store.dismiss_all(),
        Command::Fix { id } => fix(&config, store, &id).await?,
        Command::Request { method, path, body } => send_request(&config, store, &method, &path, body.as_deref()).await?,
        Command::Permission { method, url, status } => match extract_permission(Some(status), &url, &method) {
            Some(descriptor) => println!("{}", serde_json::to_string_pretty(&descriptor)?),
            None => println!("no permission implied by status {status}"),
        },
        Command::Watch => watch(&config, store).await?,
    }

    Ok(())
}

fn admin_client(config: &Config, store: Arc<NotifyingStore>) -> anyhow::Result<Arc<AdminClient>> {
    let client = AdminClient::from_config(&config.api)
        .context("failed to build admin client")?
        .with_error_store(store);

    Ok(Arc::new(client))
}

fn list(store: &dyn ErrorStore, json: bool) -> anyhow::Result<()> {
    let errors = store.list();

    if json {
        println!("{}", serde_json::to_string_pretty(&errors)?);
        return Ok(());
    }

    if errors.is_empty() {
        println!("no errors");
        return Ok(());
    }

    for event in &errors {
        print_event(event);
    }

    Ok(())
}

fn print_event(event: &ErrorEvent) {
    let status = event.status.map_or_else(|| "-".to_owned(), |s| s.to_string());
    println!("{}  {:<14} {:>3}  {}", event.id, event.code, status, event.message);

    if let Some(descriptor) = event.permission() {
        println!("    missing {} ({})", descriptor.resource, descriptor.description);
    }
}

async fn fix(config: &Config, store: Arc<NotifyingStore>, id: &str) -> anyhow::Result<()> {
    let Some(event) = store.list().into_iter().find(|e| e.id == id) else {
        anyhow::bail!("no live error with id '{id}'");
    };

    let api: Arc<dyn AdminApi> = admin_client(config, Arc::clone(&store))?;
    let reloader = Arc::new(SessionReload { api: Arc::clone(&api) });
    let repair = PermissionRepair::new(api, store, reloader, &config.repair);

    match repair.repair_event(&event).await? {
        RepairOutcome::Granted(granted) => {
            println!(
                "granted permission {} to role '{}'{}",
                granted.permission_id,
                config.repair.role,
                if granted.created { " (created)" } else { "" }
            );
            granted.reload.await.context("reload task failed")?;
        }
        RepairOutcome::AlreadyInProgress => println!("repair already in progress"),
        RepairOutcome::NotRepairable => anyhow::bail!("error '{id}' is not a permission failure"),
        RepairOutcome::NoPermission => anyhow::bail!("no permission could be found or created"),
        RepairOutcome::RoleNotFound => anyhow::bail!("role '{}' does not exist", config.repair.role),
    }

    Ok(())
}

async fn send_request(
    config: &Config,
    store: Arc<NotifyingStore>,
    method: &str,
    path: &str,
    body: Option<&str>,
) -> anyhow::Result<()> {
    let client = admin_client(config, store)?;
    let method = reqwest::Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid method '{method}'"))?;
    let body = body
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("request body is not valid JSON")?;

    let response = client.request(method, path, body.as_ref()).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}

async fn watch(config: &Config, store: Arc<NotifyingStore>) -> anyhow::Result<()> {
    let wake = store.changed();
    let handle = ErrorPoller::new(store, config.poller.interval).with_wake(wake).spawn();
    let mut rx = handle.subscribe();

    tracing::info!(interval = ?config.poller.interval, "watching for errors");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }

                let view = rx.borrow_and_update().clone();
                if view.effect == Effect::Reveal {
                    println!("{} error(s)", view.count());
                    for event in &view.errors {
                        print_event(event);
                    }
                }
            }
        }
    }

    handle.shutdown().await;
    tracing::info!("watch stopped");

    Ok(())
}

/// Re-fetches the session so new grants are picked up
struct SessionReload {
    api: Arc<dyn AdminApi>,
}

#[async_trait]
impl Reload for SessionReload {
    async fn reload(&self) {
        match self.api.current_session().await {
            Ok(session) => tracing::info!(
                user = %session.label(),
                permissions = session.permissions.len(),
                "session reloaded"
            ),
            Err(e) => tracing::warn!(error = %e, "failed to reload session"),
        }
    }
}

/// Wait for a shutdown signal (`SIGINT` or `SIGTERM`)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
