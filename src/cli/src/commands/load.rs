//! `imgstore load` command: load images from a tar archive or STDIN.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use imgstore_core::StoreConfig;
use imgstore_runtime::ImageLoader;

#[derive(Args)]
pub struct LoadArgs {
    /// Read from a tar archive file instead of STDIN
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Suppress the load output
    #[arg(short, long)]
    pub quiet: bool,
}

pub async fn execute(args: LoadArgs, config: StoreConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(super::open_image_store(config)?);
    let loader = ImageLoader::new(store);

    let mut progress: Box<dyn Write + Send> = if args.quiet {
        Box::new(io::sink())
    } else {
        Box::new(io::stdout())
    };

    let result = match args.input {
        Some(path) => {
            let file = File::open(&path)
                .map_err(|e| format!("Failed to open {}: {e}", path.display()))?;
            loader.load(BufReader::new(file), progress.as_mut()).await
        }
        None => loader.load(io::stdin(), progress.as_mut()).await,
    };

    let pool = loader.store().pool();
    tracing::debug!(stats = ?pool.stats(), "Transfer pool after load");
    pool.drain().await;

    result?;
    progress.flush()?;
    Ok(())
}
