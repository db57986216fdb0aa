use std::path::PathBuf;

use clap::Parser;
use ds_upgrade::error::{Result, UpgradeError};
use ds_upgrade::output::Format;

#[derive(Parser)]
#[command(
    name = "ds-upgrade",
    version,
    about = "Upgrade a repository's badger datastores to the current on-disk format"
)]
struct Cli {
    /// Repository root (default: $IPFS_PATH, then ~/.ipfs)
    #[arg(long)]
    repo: Option<PathBuf>,
    /// Resolve and probe stores without migrating anything
    #[arg(long)]
    dry_run: bool,
    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    format: Format,
    /// Shorthand for --format pretty
    #[arg(long, hide = true)]
    pretty: bool,
}

fn run(cli: Cli, format: Format) -> Result<()> {
    let root = match cli.repo.or_else(ds_upgrade::location::resolve_repo_root) {
        Some(root) => root,
        None => {
            return Err(UpgradeError::io(
                ds_upgrade::location::DEFAULT_REPO_DIR,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no repository given and neither IPFS_PATH nor HOME is set",
                ),
            ));
        }
    };
    log::debug!(
        "ds-upgrade {} ({}), repository root: {}",
        env!("CARGO_PKG_VERSION"),
        ds_upgrade::build_info::git_sha().unwrap_or("unknown build"),
        root.display()
    );
    ds_upgrade::commands::upgrade::run(&root, cli.dry_run, format)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let format = if cli.pretty {
        Format::Pretty
    } else {
        cli.format
    };
    if let Err(e) = run(cli, format) {
        match format {
            Format::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "error": e.code(),
                        "message": e.to_string()
                    })
                );
            }
            _ => eprintln!("error: {e}"),
        }
        std::process::exit(1);
    }
}
