// ABOUTME: Page tree discovery and block-tree fetching over a PageSource
// ABOUTME: Uses explicit work-lists so deep nesting never grows the call stack

use crate::api::PageSource;
use crate::block::{self, Block};
use crate::cancel::CancelToken;
use crate::model::{PageNode, PageTree, RawBlock, RawPage, SkippedPage};
use crate::Result;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::collections::HashSet;
use tracing::{debug, info, warn};

struct Pending {
    id: String,
    parent: String,
    title_hint: Option<String>,
}

/// Walk the hierarchy under `root_id`, one level at a time, fetching the
/// siblings of each level concurrently on `pool`.
///
/// Only page metadata and top-level blocks are fetched here. An inaccessible
/// root is fatal; inaccessible descendants are recorded in `skipped`.
pub fn discover(
    source: &dyn PageSource,
    root_id: &str,
    pool: &ThreadPool,
    cancel: &CancelToken,
) -> Result<PageTree> {
    cancel.check()?;
    let root_page = source.get_page(root_id)?;
    let root_blocks = source.list_children(root_id)?;
    let root = page_node(&root_page, None, &root_blocks);
    info!(root = %root.title, children = root.children.len(), "discovered root page");

    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(root.id.clone());
    let mut frontier = pending_children(&root.id, &root_blocks, &mut seen);
    let mut tree = PageTree::new(root);

    while !frontier.is_empty() {
        cancel.check()?;
        let results: Vec<Result<Option<(RawPage, Vec<RawBlock>)>>> = pool.install(|| {
            frontier
                .par_iter()
                .map(|p| fetch_summary(source, &p.id, cancel))
                .collect()
        });

        let mut next = Vec::new();
        for (pending, result) in frontier.into_iter().zip(results) {
            match result {
                Ok(Some((page, blocks))) => {
                    let node = page_node(&page, Some(pending.parent), &blocks);
                    debug!(page = %node.id, title = %node.title, "discovered page");
                    next.extend(pending_children(&node.id, &blocks, &mut seen));
                    tree.push(node, blocks);
                }
                Ok(None) => debug!(page = %pending.id, "skipping archived page"),
                Err(e) if e.is_skippable() => {
                    warn!(page = %pending.id, "skipping inaccessible page: {}", e);
                    tree.skipped.push(SkippedPage {
                        page_id: pending.id,
                        title: pending.title_hint,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        frontier = next;
    }

    Ok(tree)
}

fn fetch_summary(
    source: &dyn PageSource,
    page_id: &str,
    cancel: &CancelToken,
) -> Result<Option<(RawPage, Vec<RawBlock>)>> {
    cancel.check()?;
    let page = source.get_page(page_id)?;
    if page.is_trashed() {
        return Ok(None);
    }
    cancel.check()?;
    let blocks = source.list_children(page_id)?;
    Ok(Some((page, blocks)))
}

fn page_node(page: &RawPage, parent: Option<String>, blocks: &[RawBlock]) -> PageNode {
    PageNode {
        id: page.id.clone(),
        title: page.title(),
        last_edited: page.last_edited_time,
        url: page.url.clone(),
        parent,
        children: blocks
            .iter()
            .filter(|b| b.kind == "child_page")
            .map(|b| b.id.clone())
            .collect(),
    }
}

fn pending_children(parent: &str, blocks: &[RawBlock], seen: &mut HashSet<String>) -> Vec<Pending> {
    blocks
        .iter()
        .filter(|b| b.kind == "child_page")
        .filter(|b| seen.insert(b.id.clone()))
        .map(|b| Pending {
            id: b.id.clone(),
            parent: parent.to_string(),
            title_hint: b.child_page_title(),
        })
        .collect()
}

struct ArenaNode {
    raw: RawBlock,
    children: Vec<usize>,
}

fn needs_children(raw: &RawBlock) -> bool {
    raw.has_children && !raw.is_subpage()
}

/// Fetch and decode the full block tree of a page.
///
/// `top_level` reuses blocks already fetched during discovery. Nested blocks
/// go into an arena whose children always sit at higher indices than their
/// parent, so decoding in reverse index order sees children first.
pub fn fetch_blocks(
    source: &dyn PageSource,
    page_id: &str,
    top_level: Option<&[RawBlock]>,
    cancel: &CancelToken,
) -> Result<Vec<Block>> {
    let top_level = match top_level {
        Some(blocks) => blocks.to_vec(),
        None => {
            cancel.check()?;
            source.list_children(page_id)?
        }
    };

    let root_count = top_level.len();
    let mut arena: Vec<ArenaNode> = top_level
        .into_iter()
        .map(|raw| ArenaNode {
            raw,
            children: Vec::new(),
        })
        .collect();

    let mut work: Vec<usize> = (0..root_count)
        .rev()
        .filter(|&i| needs_children(&arena[i].raw))
        .collect();

    while let Some(idx) = work.pop() {
        cancel.check()?;
        let children = match source.list_children(&arena[idx].raw.id) {
            Ok(children) => children,
            Err(e) if e.is_skippable() => {
                warn!(page = page_id, block = %arena[idx].raw.id, "skipping inaccessible block children: {}", e);
                continue;
            }
            Err(e) => return Err(e),
        };

        let start = arena.len();
        arena.extend(children.into_iter().map(|raw| ArenaNode {
            raw,
            children: Vec::new(),
        }));
        let end = arena.len();
        arena[idx].children = (start..end).collect();
        work.extend((start..end).rev().filter(|&i| needs_children(&arena[i].raw)));
    }

    let mut decoded: Vec<Option<Block>> = vec![None; arena.len()];
    for idx in (0..arena.len()).rev() {
        let node = &arena[idx];
        let children: Vec<Block> = node
            .children
            .iter()
            .filter_map(|&c| decoded[c].take())
            .collect();
        let rows: Vec<RawBlock> = if node.raw.kind == "table" {
            node.children.iter().map(|&c| arena[c].raw.clone()).collect()
        } else {
            Vec::new()
        };
        decoded[idx] = Some(block::decode(&node.raw, children, &rows));
    }

    Ok(decoded
        .into_iter()
        .take(root_count)
        .flatten()
        .collect())
}
