//! Initialize command.

use console::style;

use crate::cli::helpers::AppContext;
use crate::config::Settings;

/// Create the storage directory and database schema.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    let ctx = AppContext::open(settings.clone())?;

    println!(
        "{} Database ready at {}",
        style("✓").green(),
        ctx.repo.db_path().display()
    );
    println!(
        "{} Storage ready at {}",
        style("✓").green(),
        ctx.blobs.root().display()
    );
    if settings.cookies_file.is_none() {
        println!(
            "{} No cookies file configured; member-only pages may be unavailable",
            style("!").yellow()
        );
    }

    Ok(())
}
