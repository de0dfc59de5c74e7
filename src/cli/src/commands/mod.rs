//! CLI command definitions and dispatch.

mod history;
mod image_tag;
mod images;
mod load;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use imgstore_core::StoreConfig;
use imgstore_runtime::ImageStore;

/// imgstore: a content-addressed image store.
#[derive(Parser)]
#[command(name = "imgstore", version, about)]
pub struct Cli {
    /// Root directory of the image store
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Path to a YAML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Load images from a tar archive or STDIN
    Load(load::LoadArgs),
    /// List images
    Images(images::ImagesArgs),
    /// Create a tag that refers to an existing image
    Tag(image_tag::ImageTagArgs),
    /// Show the lineage of an image
    History(history::HistoryArgs),
}

impl Cli {
    /// Effective store config: file and environment, then `--root`.
    pub fn store_config(&self) -> imgstore_core::Result<StoreConfig> {
        let mut config = StoreConfig::resolve(self.config.as_deref())?;
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        Ok(config)
    }
}

/// Open the image store described by `config`.
pub(crate) fn open_image_store(config: StoreConfig) -> Result<ImageStore, Box<dyn std::error::Error>> {
    let store = ImageStore::open(config)?;
    Ok(store)
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli, config: StoreConfig) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Load(args) => load::execute(args, config).await,
        Command::Images(args) => images::execute(args, config).await,
        Command::Tag(args) => image_tag::execute(args, config).await,
        Command::History(args) => history::execute(args, config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "imgstore",
            "images",
            "--root",
            "/tmp/store",
            "-q",
        ])
        .unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/store")));
        assert!(matches!(cli.command, Command::Images(ref a) if a.quiet));
    }

    #[test]
    fn test_root_flag_overrides_config() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = tmp.path().join("config.yaml");
        std::fs::write(&file, "root: /from/file\nlog_filter: debug\n").unwrap();

        let cli = Cli::try_parse_from([
            "imgstore",
            "--config",
            file.to_str().unwrap(),
            "--root",
            "/from/flag",
            "images",
        ])
        .unwrap();
        let config = cli.store_config().unwrap();
        assert_eq!(config.root, PathBuf::from("/from/flag"));
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn test_parse_tag_command() {
        let cli = Cli::try_parse_from(["imgstore", "tag", "-f", "src", "lib:v1"]).unwrap();
        match cli.command {
            Command::Tag(args) => {
                assert!(args.force);
                assert_eq!(args.image, "src");
                assert_eq!(args.target, "lib:v1");
            }
            _ => panic!("expected tag command"),
        }
    }

    #[test]
    fn test_parse_load_defaults_to_stdin() {
        let cli = Cli::try_parse_from(["imgstore", "load"]).unwrap();
        match cli.command {
            Command::Load(args) => {
                assert!(args.input.is_none());
                assert!(!args.quiet);
            }
            _ => panic!("expected load command"),
        }
    }
}
