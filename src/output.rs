use crate::error::Result;
use crate::migrate::{StoreOutcome, UpgradeSummary};
use clap::ValueEnum;
use colored::Colorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Pretty,
    Minimal,
}

pub fn print_summary(summary: &UpgradeSummary, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(summary)?),
        Format::Pretty => {
            let mode = if summary.dry_run { "dry-run" } else { "apply" };
            println!("{} {}", "upgrade".bold(), format!("({mode})").dimmed());
            println!("  {} {}", "repo:".dimmed(), summary.repo.display());
            println!("  {} {}", "version:".dimmed(), summary.version);
            if summary.stores.is_empty() {
                println!("\n{}", "No badger stores in the datastore spec.".green());
            }
            for store in &summary.stores {
                println!("\n{}", store.path.display().to_string().bold());
                match &store.outcome {
                    StoreOutcome::AlreadyCurrent => {
                        println!("  {}", "already current".green());
                    }
                    StoreOutcome::WouldMigrate { from } => {
                        println!("  {} {}", "would migrate from:".dimmed(), from);
                    }
                    StoreOutcome::Migrated {
                        from,
                        entries,
                        backup,
                    } => {
                        println!("  {} {}", "migrated from:".dimmed(), from);
                        println!("  {} {}", "entries:".dimmed(), entries);
                        println!(
                            "  {} {}",
                            "backup:".dimmed(),
                            backup.display().to_string().yellow()
                        );
                    }
                }
            }
        }
        Format::Minimal => {
            for store in &summary.stores {
                println!("{}", minimal_line(store));
            }
        }
    }
    Ok(())
}

fn minimal_line(store: &crate::migrate::StoreReport) -> String {
    let (outcome, detail) = match &store.outcome {
        StoreOutcome::AlreadyCurrent => ("current", "-".to_string()),
        StoreOutcome::WouldMigrate { from } => ("pending", from.clone()),
        StoreOutcome::Migrated {
            entries, backup, ..
        } => ("migrated", format!("{entries} {}", backup.display())),
    };
    format!("{:9} {} {}", outcome, store.path.display(), detail)
}
