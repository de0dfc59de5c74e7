//! `imgstore history` command: show the lineage of an image.

use clap::Args;
use imgstore_core::{ImageMetadata, StoreConfig};
use imgstore_runtime::ImageStore;

use crate::output;

#[derive(Args)]
pub struct HistoryArgs {
    /// Image ID or `repo[:tag]`
    pub image: String,

    /// Only show image IDs
    #[arg(short, long)]
    pub quiet: bool,

    /// Don't truncate output
    #[arg(long)]
    pub no_trunc: bool,
}

pub async fn execute(args: HistoryArgs, config: StoreConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_image_store(config)?;
    let lineage = lineage(&store, &args.image)?;

    if args.quiet {
        for image in &lineage {
            println!("{}", output::display_id(&image.id, args.no_trunc));
        }
        return Ok(());
    }

    let mut table = output::new_table(&["IMAGE", "CREATED", "SIZE", "COMMENT"]);
    for image in &lineage {
        let created = output::format_created(image.created.as_ref());
        let size = output::format_bytes(store.graph().layer_size(&image.id).unwrap_or(0));
        let comment = image.comment.as_deref().unwrap_or_default();
        let comment = if args.no_trunc {
            comment.to_string()
        } else {
            output::truncate_str(comment, 45)
        };

        table.add_row([
            output::display_id(&image.id, args.no_trunc),
            created.as_str(),
            size.as_str(),
            comment.as_str(),
        ]);
    }

    println!("{table}");
    Ok(())
}

/// The image named by `name` followed by each of its ancestors, root last.
fn lineage(store: &ImageStore, name: &str) -> imgstore_core::Result<Vec<ImageMetadata>> {
    let mut image = store.lookup_image(name)?;
    let mut chain = Vec::new();
    while !image.is_root() {
        let parent = store.graph().get(&image.parent)?;
        chain.push(std::mem::replace(&mut image, parent));
    }
    chain.push(image);
    Ok(chain)
}
