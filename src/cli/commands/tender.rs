//! Tender registration and processing commands.

use console::style;

use crate::cli::helpers::{format_bytes, spinner, truncate, AppContext};
use crate::config::Settings;
use crate::models::{DocumentLinks, Tender};
use crate::services::TenderResult;

/// Register (or replace the links of) a tender.
pub async fn cmd_add_tender(
    settings: &Settings,
    id: i64,
    links_json: &str,
    title: Option<String>,
) -> anyhow::Result<()> {
    let links: DocumentLinks = serde_json::from_str(links_json)
        .map_err(|e| anyhow::anyhow!("Invalid --links JSON: {}", e))?;
    let ctx = AppContext::open(settings.clone())?;

    let mut tender = Tender::new(id, links);
    tender.title = title;
    ctx.repo.insert_tender(&tender)?;

    println!(
        "{} Saved tender {} with {} categories",
        style("✓").green(),
        id,
        tender.document_links.len()
    );
    for (code, link) in &tender.document_links {
        println!(
            "  {:<24} {}",
            code,
            truncate(link.url().unwrap_or("-"), 80)
        );
    }
    Ok(())
}

/// Acquire all documents of a tender.
pub async fn cmd_process(
    settings: &Settings,
    tender_id: i64,
    use_browser: bool,
    summary: bool,
) -> anyhow::Result<()> {
    let ctx = AppContext::open(settings.clone())?;
    let processor = ctx.processor(use_browser).await?;

    let bar = spinner(format!("Processing tender {}", tender_id));
    let result = processor.process_tender(tender_id).await;
    bar.finish_and_clear();
    let result = result?;

    if summary {
        print_summary(&result);
    } else {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}

fn print_summary(result: &TenderResult) {
    println!(
        "\n{}",
        style(format!("Tender {}", result.tender_id)).bold()
    );
    println!("{}", "-".repeat(40));

    if let Some(message) = &result.message {
        println!("{} {}", style("!").yellow(), message);
        return;
    }

    for outcome in &result.downloaded {
        println!(
            "  {} {:<24} {} file(s), {}",
            style("✓").green(),
            outcome.doc_type,
            outcome.files_count,
            format_bytes(outcome.total_size)
        );
    }
    for content in &result.content_scraped {
        let unit = if content.format == "json_table" { "rows" } else { "chars" };
        println!(
            "  {} {:<24} {} {} ({})",
            style("✓").green(),
            content.doc_type,
            content.size,
            unit,
            content.column.as_deref().unwrap_or("document")
        );
    }
    for skip in &result.skipped {
        println!(
            "  {} {:<24} {}",
            style("-").dim(),
            skip.doc_type,
            style(&skip.reason).dim()
        );
    }
    for failure in &result.failed {
        println!(
            "  {} {:<24} {}",
            style("✗").red(),
            failure.doc_type,
            truncate(&failure.reason, 80)
        );
    }

    println!(
        "\n{} downloaded, {} scraped, {} skipped, {} failed",
        style(result.downloaded.len()).green(),
        style(result.content_scraped.len()).green(),
        result.skipped.len(),
        style(result.failed.len()).red()
    );
}
