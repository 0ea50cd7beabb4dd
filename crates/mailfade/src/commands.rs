//! Subcommand implementations.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use mailfade_api::{MailClient, MessageSummary};
use mailfade_core::{
    CleanupConfig, CleanupService, InboxConfig, InboxPhase, InboxService, MailProvider, Store,
};
use tracing::warn;

use crate::{Cli, Command};

/// Dispatch the parsed command line.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let db_path = resolve_db_path(cli.db)?;
    let store = Arc::new(Store::open(&db_path).await?);

    let client = MailClient::new(&cli.api).context("invalid provider base URL")?;
    let provider: Arc<dyn MailProvider> = Arc::new(client);

    let inbox_config = InboxConfig {
        ttl: chrono::Duration::seconds(cli.ttl_secs),
        ..InboxConfig::default()
    };

    match cli.command {
        Command::New { watch } => {
            let mut service =
                restored_service(Arc::clone(&provider), Arc::clone(&store), inbox_config).await?;
            let account = service.create_inbox().await?;
            println!("{}", account.address);
            println!("expires {}", account.expires_at.format("%H:%M:%S"));
            if watch {
                watch_loop(&mut service, &provider, &store).await?;
            }
        }
        Command::Status => {
            let service =
                restored_service(Arc::clone(&provider), Arc::clone(&store), inbox_config).await?;
            match service.phase() {
                InboxPhase::Active => {
                    println!("{} ({})", service.address().unwrap_or("?"), service.phase());
                    if let Some(remaining) = service.time_remaining() {
                        println!("expires in {}", format_remaining(remaining));
                    }
                }
                phase => println!("{phase}"),
            }
        }
        Command::Messages => {
            let mut service =
                restored_service(Arc::clone(&provider), Arc::clone(&store), inbox_config).await?;
            require_active(&service)?;
            let messages = service.refresh_messages().await?;
            if messages.is_empty() {
                println!("no messages");
            }
            for message in messages {
                print_summary(message);
            }
        }
        Command::Read { id } => {
            let mut service =
                restored_service(Arc::clone(&provider), Arc::clone(&store), inbox_config).await?;
            require_active(&service)?;
            let message = service.read_message(&id).await?;
            println!("From: {}", message.from.address);
            println!("Subject: {}", message.subject);
            if let Some(at) = message.created_at {
                println!("Date: {at}");
            }
            println!();
            if let Some(text) = &message.text {
                println!("{text}");
            } else if message.html.is_empty() {
                println!("(empty message)");
            } else {
                println!("({} HTML part(s), no plain text)", message.html.len());
            }
        }
        Command::DeleteMessage { id } => {
            let mut service =
                restored_service(Arc::clone(&provider), Arc::clone(&store), inbox_config).await?;
            require_active(&service)?;
            service.delete_message(&id).await?;
            println!("deleted {id}");
        }
        Command::Delete => {
            let mut service =
                restored_service(Arc::clone(&provider), Arc::clone(&store), inbox_config).await?;
            require_active(&service)?;
            let address = service.address().unwrap_or("?").to_string();
            service.delete_inbox().await?;
            println!("deleted {address}");
        }
        Command::Watch => {
            let mut service =
                restored_service(Arc::clone(&provider), Arc::clone(&store), inbox_config).await?;
            require_active(&service)?;
            watch_loop(&mut service, &provider, &store).await?;
        }
        Command::Cleanup => {
            let service = Arc::new(CleanupService::new(
                provider,
                store,
                CleanupConfig::default(),
            ));
            match service.sweep().await? {
                Some(report) => println!(
                    "scanned {}, deleted {}, failed {} ({} ms)",
                    report.scanned, report.deleted, report.failed, report.duration_ms
                ),
                None => println!("a sweep is already running"),
            }
        }
        Command::Stats => {
            let stats = match store.cleanup().load_stats().await? {
                Some(stats) => stats,
                None => store.accounts().stats(Utc::now()).await?,
            };
            println!("accounts: {}", stats.total_accounts);
            println!("expired:  {}", stats.expired_accounts);
            println!("deleted:  {}", stats.deleted_accounts);
            println!("failed:   {}", stats.failed_accounts);
            match stats.last_run_at {
                Some(at) => println!("last sweep: {at}"),
                None => println!("last sweep: never"),
            }
        }
        Command::Audit { limit } => {
            let entries = store.audit().recent(limit).await?;
            if entries.is_empty() {
                println!("no audit entries");
            }
            for entry in entries {
                match &entry.detail {
                    Some(detail) => println!(
                        "{} {:<18} {} ({detail})",
                        entry.at.format("%Y-%m-%d %H:%M:%S"),
                        entry.action,
                        entry.account_id
                    ),
                    None => println!(
                        "{} {:<18} {}",
                        entry.at.format("%Y-%m-%d %H:%M:%S"),
                        entry.action,
                        entry.account_id
                    ),
                }
            }
        }
        Command::Reset => {
            store.reset().await?;
            println!("local state wiped");
        }
    }

    Ok(())
}

/// Build the inbox service and reload any persisted session.
async fn restored_service(
    provider: Arc<dyn MailProvider>,
    store: Arc<Store>,
    config: InboxConfig,
) -> anyhow::Result<InboxService> {
    let mut service = InboxService::new(provider, store, config);
    service.restore_session().await?;
    Ok(service)
}

fn require_active(service: &InboxService) -> anyhow::Result<()> {
    anyhow::ensure!(
        service.phase() == InboxPhase::Active,
        "no active inbox; run `mailfade new` first"
    );
    Ok(())
}

/// Poll for mail and count down to expiry; a background cleanup
/// scheduler sweeps expired accounts while we watch.
async fn watch_loop(
    service: &mut InboxService,
    provider: &Arc<dyn MailProvider>,
    store: &Arc<Store>,
) -> anyhow::Result<()> {
    let cleanup = Arc::new(CleanupService::new(
        Arc::clone(provider),
        Arc::clone(store),
        CleanupConfig::default(),
    ));
    let scheduler = cleanup.start();

    println!(
        "watching {} (Ctrl-C to stop)",
        service.address().unwrap_or("?")
    );

    let mut known: HashSet<String> = service.messages().iter().map(|m| m.id.clone()).collect();
    loop {
        let Some(deadline) = service.expiry_deadline() else {
            break;
        };

        tokio::select! {
            () = tokio::time::sleep_until(deadline) => {
                if service.expire_if_due().await {
                    println!("inbox expired");
                    break;
                }
            }
            () = tokio::time::sleep(service.poll_interval()) => {
                match service.refresh_messages().await {
                    Ok(messages) => {
                        let fresh: Vec<MessageSummary> = messages
                            .iter()
                            .filter(|m| !known.contains(&m.id))
                            .cloned()
                            .collect();
                        for message in &fresh {
                            print_summary(message);
                            notify_new_mail(message);
                            known.insert(message.id.clone());
                        }
                    }
                    Err(e) if e.is_account_gone() => {
                        println!("inbox no longer exists on the provider");
                        break;
                    }
                    Err(e) => warn!("Poll failed: {e}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    scheduler.stop().await;
    Ok(())
}

fn print_summary(message: &MessageSummary) {
    let marker = if message.seen { ' ' } else { '*' };
    println!(
        "{marker} {}  {:<30}  {}",
        message.id, message.from.address, message.subject
    );
}

fn notify_new_mail(message: &MessageSummary) {
    let result = notify_rust::Notification::new()
        .summary(&format!("New mail: {}", message.subject))
        .body(&format!("From {}", message.from.address))
        .show();
    if let Err(e) = result {
        tracing::debug!("Desktop notification failed: {e}");
    }
}

fn resolve_db_path(db: Option<PathBuf>) -> anyhow::Result<String> {
    let path = match db {
        Some(path) => path,
        None => dirs::data_dir()
            .context("could not determine the user data directory")?
            .join("mailfade")
            .join("mailfade.db"),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    Ok(path.to_string_lossy().into_owned())
}

fn format_remaining(remaining: chrono::Duration) -> String {
    let total = remaining.num_seconds();
    format!("{}m{:02}s", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(chrono::Duration::seconds(605)), "10m05s");
        assert_eq!(format_remaining(chrono::Duration::zero()), "0m00s");
    }
}
