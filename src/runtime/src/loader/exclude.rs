//! Exclusion planning: images already in the graph are never extracted.

use imgstore_core::error::Result;

use crate::graph::ImageGraph;

/// Top-level archive names to skip during extraction, one per resident image.
///
/// Each pattern is an image ID and matches a top-level directory name
/// exactly. The list is sorted.
pub fn plan_excludes(graph: &dyn ImageGraph) -> Result<Vec<String>> {
    let mut patterns: Vec<String> = graph.map()?.into_keys().collect();
    patterns.sort();
    Ok(patterns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::FsGraph;
    use imgstore_core::image::ImageMetadata;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn id(c: char) -> String {
        c.to_string().repeat(64)
    }

    #[test]
    fn test_empty_graph_excludes_nothing() {
        let tmp = TempDir::new().unwrap();
        let graph = FsGraph::new(tmp.path()).unwrap();
        assert!(plan_excludes(&graph).unwrap().is_empty());
    }

    #[test]
    fn test_excludes_every_resident_image_sorted() {
        let tmp = TempDir::new().unwrap();
        let graph = FsGraph::new(tmp.path()).unwrap();
        for (c, parent) in [('c', String::new()), ('a', id('c')), ('b', id('a'))] {
            graph
                .register(&ImageMetadata::new(id(c), parent), &mut Cursor::new(Vec::new()))
                .unwrap();
        }

        assert_eq!(plan_excludes(&graph).unwrap(), vec![id('a'), id('b'), id('c')]);
    }
}
