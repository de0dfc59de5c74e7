//! `imgstore images` command.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use clap::Args;
use imgstore_core::{ImageMetadata, StoreConfig};
use imgstore_runtime::ImageStore;

use crate::output;

#[derive(Args)]
pub struct ImagesArgs {
    /// Only show image IDs
    #[arg(short, long)]
    pub quiet: bool,

    /// Show all images (default hides intermediate images)
    #[arg(short, long)]
    pub all: bool,

    /// Don't truncate image IDs
    #[arg(long)]
    pub no_trunc: bool,
}

pub async fn execute(args: ImagesArgs, config: StoreConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_image_store(config)?;
    let rows = collect_rows(&store, args.all)?;

    if args.quiet {
        let mut seen = HashSet::new();
        for row in &rows {
            if seen.insert(row.id.as_str()) {
                println!("{}", output::display_id(&row.id, args.no_trunc));
            }
        }
        return Ok(());
    }

    let mut table = output::new_table(&["REPOSITORY", "TAG", "IMAGE ID", "CREATED", "SIZE"]);
    for row in &rows {
        let created = output::format_created(row.created.as_ref());
        let size = output::format_bytes(row.size);
        table.add_row([
            row.repository.as_str(),
            row.tag.as_str(),
            output::display_id(&row.id, args.no_trunc),
            created.as_str(),
            size.as_str(),
        ]);
    }

    println!("{table}");
    Ok(())
}

/// One line of the listing.
#[derive(Debug, Clone, PartialEq)]
struct ImageRow {
    repository: String,
    tag: String,
    id: String,
    created: Option<DateTime<Utc>>,
    /// Total layer size of the image and all its ancestors
    size: u64,
}

/// Rows for every tag, plus untagged images. Untagged images with children
/// are intermediate and only listed when `all` is set.
///
/// Newest images come first; ties are ordered by repository and tag.
fn collect_rows(store: &ImageStore, all: bool) -> imgstore_core::Result<Vec<ImageRow>> {
    let images = store.graph().map()?;
    let parents: HashSet<&str> = images.values().map(|image| image.parent.as_str()).collect();

    let mut tagged = HashSet::new();
    let mut rows = Vec::new();
    for (repository, tags) in store.tags().repositories() {
        for (tag, id) in tags {
            let Some(image) = images.get(&id) else {
                tracing::warn!(repository = %repository, tag = %tag, id = %id, "Tag refers to a missing image");
                continue;
            };
            tagged.insert(id.clone());
            rows.push(ImageRow {
                repository: repository.clone(),
                tag,
                size: virtual_size(store, &images, image),
                created: image.created,
                id,
            });
        }
    }

    for (id, image) in &images {
        if tagged.contains(id) || (!all && parents.contains(id.as_str())) {
            continue;
        }
        rows.push(ImageRow {
            repository: output::NONE.to_string(),
            tag: output::NONE.to_string(),
            id: id.clone(),
            created: image.created,
            size: virtual_size(store, &images, image),
        });
    }

    rows.sort_by(|a, b| {
        b.created
            .cmp(&a.created)
            .then_with(|| a.repository.cmp(&b.repository))
            .then_with(|| a.tag.cmp(&b.tag))
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(rows)
}

/// Sum of layer sizes from `image` up to its root. Unreadable sizes count as
/// zero.
fn virtual_size(
    store: &ImageStore,
    images: &HashMap<String, ImageMetadata>,
    image: &ImageMetadata,
) -> u64 {
    let mut total = 0;
    let mut current = Some(image);
    while let Some(image) = current {
        total += store.graph().layer_size(&image.id).unwrap_or(0);
        current = if image.is_root() {
            None
        } else {
            images.get(&image.parent)
        };
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn id(c: char) -> String {
        c.to_string().repeat(64)
    }

    fn register(store: &ImageStore, id: &str, parent: &str, created: &str, layer: &[u8]) {
        let mut image = ImageMetadata::new(id, parent);
        image.created = Some(created.parse().unwrap());
        store
            .graph()
            .register(&image, &mut Cursor::new(layer.to_vec()))
            .unwrap();
    }

    fn fixture() -> (TempDir, ImageStore) {
        let tmp = TempDir::new().unwrap();
        let store = ImageStore::open(StoreConfig::with_root(tmp.path())).unwrap();
        register(&store, &id('a'), "", "2024-01-01T00:00:00Z", b"base");
        register(&store, &id('b'), &id('a'), "2024-02-01T00:00:00Z", b"child-layer");
        register(&store, &id('c'), "", "2024-03-01T00:00:00Z", b"x");
        store.tags().set("lib", "v1", &id('b'), false).unwrap();
        store.tags().set("lib", "latest", &id('b'), false).unwrap();
        (tmp, store)
    }

    #[test]
    fn test_rows_hide_intermediate_images() {
        let (_tmp, store) = fixture();
        let rows = collect_rows(&store, false).unwrap();

        let listed: Vec<(&str, &str, &str)> = rows
            .iter()
            .map(|r| (r.repository.as_str(), r.tag.as_str(), r.id.as_str()))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("<none>", "<none>", id('c').as_str()),
                ("lib", "latest", id('b').as_str()),
                ("lib", "v1", id('b').as_str()),
            ]
        );
    }

    #[test]
    fn test_rows_all_includes_intermediate() {
        let (_tmp, store) = fixture();
        let rows = collect_rows(&store, true).unwrap();

        assert_eq!(rows.len(), 4);
        assert_eq!(rows.last().unwrap().id, id('a'));
    }

    #[test]
    fn test_size_includes_ancestors() {
        let (_tmp, store) = fixture();
        let rows = collect_rows(&store, true).unwrap();

        let child = rows.iter().find(|r| r.id == id('b')).unwrap();
        assert_eq!(child.size, (b"base".len() + b"child-layer".len()) as u64);
    }

    #[test]
    fn test_empty_store() {
        let tmp = TempDir::new().unwrap();
        let store = ImageStore::open(StoreConfig::with_root(tmp.path())).unwrap();
        assert!(collect_rows(&store, true).unwrap().is_empty());
    }
}
