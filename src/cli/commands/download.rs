//! Single-URL download and link resolution commands.

use console::style;

use crate::cli::helpers::{format_bytes, spinner, truncate, AppContext};
use crate::config::Settings;

/// Download one URL into a tender category.
pub async fn cmd_download(
    settings: &Settings,
    tender_id: i64,
    category: &str,
    url: &str,
    name: Option<&str>,
    ext: Option<&str>,
) -> anyhow::Result<()> {
    let ctx = AppContext::open(settings.clone())?;
    let processor = ctx.processor(false).await?;

    let bar = spinner(format!("Downloading {}", truncate(url, 60)));
    let outcome = processor
        .download_and_store(tender_id, category, url, name, ext)
        .await;
    bar.finish_and_clear();

    let outcome = match outcome {
        Ok(o) => o,
        Err(e) => {
            println!("{} Download failed: {}", style("✗").red(), e);
            return Err(e.into());
        }
    };

    println!(
        "{} Stored {} file(s), {}",
        style("✓").green(),
        outcome.files_count,
        format_bytes(outcome.total_size)
    );
    for file in &outcome.files {
        let marker = if file.is_zip_parent {
            style("archive").yellow()
        } else if file.is_extracted {
            style("extracted").cyan()
        } else {
            style("file").dim()
        };
        println!(
            "  {:<6} {:<10} {:<20} {}",
            file.document_id,
            marker,
            file.doc_type,
            truncate(&file.file_name, 60)
        );
    }
    Ok(())
}

/// Print the attachment links of a content page.
pub async fn cmd_resolve(settings: &Settings, url: &str) -> anyhow::Result<()> {
    let ctx = AppContext::open(settings.clone())?;
    let processor = ctx.processor(false).await?;

    let links = processor.resolve_all_download_urls(url).await;
    if links.is_empty() {
        println!("{} No download links found", style("!").yellow());
        return Ok(());
    }

    println!("{} Found {} link(s)", style("✓").green(), links.len());
    for link in links {
        println!(
            "  {:<40} {}",
            truncate(link.name.as_deref().unwrap_or("-"), 40),
            link.url
        );
    }
    Ok(())
}
