//! Stored-document commands.

use std::time::Duration;

use console::style;

use crate::cli::helpers::{format_bytes, truncate, AppContext};
use crate::config::Settings;
use crate::storage::BlobStore;

/// List documents stored for a tender.
pub async fn cmd_documents(settings: &Settings, tender_id: i64) -> anyhow::Result<()> {
    let ctx = AppContext::open(settings.clone())?;
    let docs = ctx.repo.documents_for_tender(tender_id)?;

    if docs.is_empty() {
        println!(
            "{} No documents stored for tender {}",
            style("!").yellow(),
            tender_id
        );
        return Ok(());
    }

    println!(
        "{:<6} {:<20} {:<6} {:<10} {:<10} {:<7} {}",
        "ID", "Category", "Type", "Size", "Status", "Parent", "Name"
    );
    println!("{}", "-".repeat(100));
    for doc in &docs {
        println!(
            "{:<6} {:<20} {:<6} {:<10} {:<10} {:<7} {}",
            doc.id,
            truncate(&doc.doc_type, 20),
            doc.file_type,
            format_bytes(doc.file_size),
            doc.processing_status.as_str(),
            doc.parent_doc_id
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string()),
            truncate(&doc.original_filename, 40)
        );
    }
    println!("\n{} document(s)", docs.len());
    Ok(())
}

/// Queue documents for analysis.
pub async fn cmd_queue(settings: &Settings, ids: &[i64], batch: bool) -> anyhow::Result<()> {
    let ctx = AppContext::open(settings.clone())?;
    let queue = ctx.queue();

    if batch {
        let queued = queue.enqueue_many(ids).await?;
        println!(
            "{} Queued {} of {} document(s)",
            style("✓").green(),
            queued.len(),
            ids.len()
        );
        return Ok(());
    }

    let mut failures = 0;
    for &id in ids {
        match queue.enqueue(id).await {
            Ok(doc) => println!(
                "  {} {:<6} {}",
                style("✓").green(),
                id,
                truncate(&doc.original_filename, 60)
            ),
            Err(e) => {
                failures += 1;
                println!("  {} {:<6} {}", style("✗").red(), id, e);
            }
        }
    }
    if failures > 0 {
        anyhow::bail!("{} document(s) could not be queued", failures);
    }
    Ok(())
}

/// Print a signed URL for a stored document.
pub async fn cmd_signed_url(settings: &Settings, doc_id: i64, expires: u64) -> anyhow::Result<()> {
    let ctx = AppContext::open(settings.clone())?;
    let doc = ctx
        .repo
        .document(doc_id)?
        .ok_or_else(|| anyhow::anyhow!("Document not found: {}", doc_id))?;
    let path = doc
        .storage_path
        .ok_or_else(|| anyhow::anyhow!("Document {} has no stored file", doc_id))?;

    let url = ctx.blobs.signed_url(&path, Duration::from_secs(expires))?;
    println!("{}", url);
    eprintln!(
        "{} Valid for {}s ({})",
        style("✓").green(),
        expires,
        format_bytes(doc.file_size)
    );
    Ok(())
}
