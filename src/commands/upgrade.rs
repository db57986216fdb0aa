use std::path::Path;

use crate::error::Result;
use crate::migrate::{UpgradeOptions, Upgrader};
use crate::output::{Format, print_summary};
use crate::report::StderrReporter;

pub fn run(repo_root: &Path, dry_run: bool, format: Format) -> Result<()> {
    let reporter = StderrReporter;
    let options = UpgradeOptions {
        dry_run,
        ..UpgradeOptions::default()
    };

    let summary = Upgrader::new(repo_root, &reporter)
        .with_options(options)
        .run()?;

    print_summary(&summary, format)
}
