//! Batch command handlers: run, status, cancel, delete, export.

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use ogen_runtime::{results_to_csv, wiring, BatchOrchestrator, BulkDeletionOrchestrator, ProductCache};
use ogen_schemas::{new_batch_id, OrderBatch};

use super::{load_settings, load_template, pg_stores, stores_from_env};

// ---------------------------------------------------------------------------
// batch run
// ---------------------------------------------------------------------------

/// Validate the template, persist it with a pending batch, run to a terminal
/// state and print the summary JSON. Ctrl-C requests cancellation; the wave
/// in flight still completes.
pub async fn batch_run(template: &str, config_paths: &[String]) -> Result<()> {
    let config = load_template(template)?;
    let settings = load_settings(config_paths)?;
    config
        .validate(&settings.limits)
        .context("CONFIG_INVALID: template")?;

    let remote = wiring::remote_from_settings(&settings)?;
    let stores = stores_from_env().await?;

    let rec = stores
        .configurations
        .create_configuration(config.clone())
        .await?;
    let batch_id = new_batch_id();
    let order_count = settings.limits.clamp_order_count(config.order_count);
    stores
        .batches
        .create_batch(OrderBatch::new_pending(&batch_id, Some(rec.id), order_count))
        .await?;
    eprintln!("batch_id={} order_count={}", batch_id, order_count);

    let batches = stores.batches.clone();
    let cancel_id = batch_id.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("cancel requested batch_id={}", cancel_id);
            if let Err(e) = batches.request_cancel(&cancel_id).await {
                eprintln!("WARN: cancel failed: {}", e);
            }
        }
    });

    let cache = Arc::new(ProductCache::new(remote.clone()));
    let orchestrator =
        BatchOrchestrator::new(remote, stores.batches.clone(), cache, Arc::new(settings));
    let outcome = orchestrator.run_batch(&config, &batch_id).await;
    ctrl_c.abort();

    let summary = outcome.with_context(|| format!("batch {} aborted", batch_id))?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// batch status / cancel
// ---------------------------------------------------------------------------

pub async fn batch_status(batch_id: &str) -> Result<()> {
    let stores = pg_stores().await?;
    let b = stores
        .batches
        .get_batch(batch_id)
        .await?
        .with_context(|| format!("batch '{}' not found", batch_id))?;
    println!("batch_id={}", b.batch_id);
    println!("status={}", b.status);
    println!("progress={}", b.progress);
    println!("order_count={}", b.order_count);
    println!("succeeded={}", b.succeeded_count());
    println!("failed={}", b.failed_count());
    println!("cancel_signal={}", b.cancel_signal.as_str());
    println!("error_message={}", b.error_message.as_deref().unwrap_or(""));
    println!("created_at_utc={}", b.created_at.to_rfc3339());
    println!(
        "completed_at_utc={}",
        b.completed_at.map(|t| t.to_rfc3339()).unwrap_or_default()
    );
    Ok(())
}

pub async fn batch_cancel(batch_id: &str) -> Result<()> {
    let stores = pg_stores().await?;
    let b = stores.batches.request_cancel(batch_id).await?;
    println!(
        "cancel_requested=true batch_id={} status={}",
        b.batch_id, b.status
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// batch delete
// ---------------------------------------------------------------------------

pub async fn batch_delete(
    batch_ids: &[String],
    purge_remote: bool,
    config_paths: &[String],
) -> Result<()> {
    let settings = load_settings(config_paths)?;
    let remote = wiring::remote_from_settings(&settings)?;
    let stores = pg_stores().await?;

    let deleter = BulkDeletionOrchestrator::new(remote, stores.batches, settings.deletion);
    let report = deleter.delete_batches(batch_ids, purge_remote).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.failed > 0 {
        anyhow::bail!("{} of {} batches failed to delete", report.failed, batch_ids.len());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// batch export
// ---------------------------------------------------------------------------

pub async fn batch_export(batch_id: &str, out: &str) -> Result<()> {
    let stores = pg_stores().await?;
    let b = stores
        .batches
        .get_batch(batch_id)
        .await?
        .with_context(|| format!("batch '{}' not found", batch_id))?;
    let csv = results_to_csv(&b.results)?;
    fs::write(out, csv).with_context(|| format!("write export failed: {}", out))?;
    println!("exported=true batch_id={} rows={} out={}", batch_id, b.results.len(), out);
    Ok(())
}
