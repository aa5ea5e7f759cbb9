//! Foreground processing of a single file.

use console::style;
use tokio::sync::watch;
use uuid::Uuid;

use crate::config::Settings;
use crate::models::{FileDescriptor, OutcomeStatus};
use crate::orchestrator::Orchestrator;

/// Run one orchestration instance and print its outcome as JSON.
pub async fn cmd_process(
    settings: &Settings,
    name: &str,
    uri: Option<&str>,
    container: Option<&str>,
) -> anyhow::Result<()> {
    let container = container.unwrap_or(&settings.storage.source_container);
    let uri = match uri {
        Some(uri) => uri.to_string(),
        None => settings.storage.blob_uri(container, name),
    };
    let file = FileDescriptor::new(name, container, uri);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let orchestrator = Orchestrator::from_settings(settings)?.with_shutdown(shutdown_rx);
    let instance_id = Uuid::new_v4().simple().to_string();

    println!(
        "{} Processing {} (instance {})",
        style("→").cyan(),
        file.name,
        style(&instance_id).dim()
    );
    let outcome = orchestrator.process(file, &instance_id).await;

    match outcome.status {
        OutcomeStatus::Completed => println!(
            "  {} Completed: {}",
            style("✓").green(),
            outcome.persisted_location.as_deref().unwrap_or("-")
        ),
        OutcomeStatus::Skipped => println!(
            "  {} Skipped: {}",
            style("-").yellow(),
            outcome.error.as_deref().unwrap_or_default()
        ),
        OutcomeStatus::Failed => eprintln!(
            "  {} Failed: {}",
            style("✗").red(),
            outcome.error.as_deref().unwrap_or_default()
        ),
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if outcome.status == OutcomeStatus::Failed {
        anyhow::bail!("orchestration {} failed", instance_id);
    }
    Ok(())
}
