//! Screen access check.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::{anyhow, Result};
use hive_session::{guard, Access, Route};

/// Resolve the session and report whether `path` may be opened.
pub async fn open(ctx: &Context, path: &str, format: &OutputFormat) -> Result<()> {
    let route = Route::parse(path).ok_or_else(|| anyhow!("Unknown screen: {}", path))?;

    ctx.manager.initialize().await;
    let access = guard(&route, &ctx.manager.snapshot());
    tracing::debug!(route = %route, access = ?access, "Route guard evaluated");

    match format {
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "route": route,
            "decision": access,
        })),
        OutputFormat::Text => match &access {
            Access::Allow => println!("{}: allowed", route),
            Access::Pending => println!("{}: session still resolving", route),
            Access::Redirect(to) => println!("{}: redirected to {}", route, to),
        },
    }
    Ok(())
}
