//! Data cache commands

use anyhow::Result;
use colored::Colorize;

use super::CommandContext;
use crate::output::{color_flag, print_info, print_json, print_success, OutputFormat};

/// Show cache status for the selected region
pub fn show_info(ctx: &CommandContext) -> Result<()> {
    ctx.require_region()?;
    let info = ctx.registry.cache().info(&ctx.region);

    match ctx.format {
        OutputFormat::Json => print_json(&info),
        OutputFormat::Table => {
            println!("{}", format!("Cache: {}", ctx.region).bold());
            println!("{}", "=".repeat(60));
            if !info.cached {
                print_info("Nothing cached for this region");
                return Ok(());
            }

            println!("Valid:       {}", color_flag(info.valid));
            if let Some(cached_at) = info.cached_at {
                println!("Cached at:   {}", cached_at.format("%Y-%m-%d %H:%M UTC"));
            }
            println!("Data points: {}", info.data_points);
            if let Some(range) = &info.date_range {
                let fmt = |d: Option<chrono::DateTime<chrono::Utc>>| {
                    d.map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_else(|| "?".to_string())
                };
                println!("Date range:  {} to {}", fmt(range.start), fmt(range.end));
            }
        }
    }

    Ok(())
}

/// Remove cached data for the selected region
pub fn clear(ctx: &CommandContext) -> Result<()> {
    ctx.require_region()?;
    ctx.registry.cache().clear(&ctx.region);
    print_success(&format!("Cleared cached data for {}", ctx.region));
    Ok(())
}
