//! `imgstore tag` command: create a tag that refers to an existing image.

use std::io::Write;

use clap::Args;
use imgstore_core::{parse_repository_tag, StoreConfig};
use imgstore_runtime::ImageStore;

#[derive(Args)]
pub struct ImageTagArgs {
    /// Move the tag if it already refers to another image
    #[arg(short, long)]
    pub force: bool,

    /// Source image, by ID or `repo[:tag]`
    pub image: String,

    /// Target reference (`repo[:tag]`, tag defaults to `latest`)
    pub target: String,
}

pub async fn execute(args: ImageTagArgs, config: StoreConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_image_store(config)?;
    let mut stdout = std::io::stdout();
    tag_image(&store, &args, &mut stdout)?;
    stdout.flush()?;
    Ok(())
}

fn tag_image(store: &ImageStore, args: &ImageTagArgs, out: &mut dyn Write) -> imgstore_core::Result<()> {
    let (repo, tag) = parse_repository_tag(&args.target);
    store.set_load(&repo, &tag, &args.image, args.force, out)
}
