// ABOUTME: Maps pages to output directories and renders the root index
// ABOUTME: Slugs are deterministic; collisions get the page's short id appended

use crate::model::PageTree;
use crate::state::{Fingerprint, SyncState};
use crate::storage::{read_frontmatter, Paths, PAGE_FILE_NAME};
use crate::util::{short_id, slugify};
use std::collections::{HashMap, HashSet};

pub fn disambiguated(base: &str, page_id: &str) -> String {
    format!("{}-{}", base, short_id(page_id))
}

/// `dir` is `base` or one of the names `base` is widened to on collision.
fn derived_from(dir: &str, base: &str, page_id: &str) -> bool {
    if dir == base {
        return true;
    }
    let stem = disambiguated(base, page_id);
    match dir.strip_prefix(stem.as_str()) {
        Some("") => true,
        Some(rest) => rest
            .strip_prefix('-')
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit())),
        None => false,
    }
}

/// Assign an output directory (relative to the output root) to every page.
///
/// Pages in `pinned` keep their recorded directory unconditionally. Other
/// recorded pages keep theirs while it still matches their title. Remaining
/// pages take the plain slug unless another page or a foreign directory on
/// disk already holds it.
pub fn assign_dirs(
    tree: &PageTree,
    state: &SyncState,
    paths: &Paths,
    pinned: &HashSet<String>,
) -> HashMap<String, String> {
    let mut assigned = HashMap::new();
    let mut taken: HashSet<String> = state
        .pages
        .iter()
        .filter(|(id, _)| !tree.contains(id))
        .map(|(_, record)| record.output_dir.clone())
        .collect();

    for page in &tree.pages {
        let Some(record) = state.pages.get(&page.id) else {
            continue;
        };
        let base = slugify(&page.title);
        let still_valid =
            derived_from(&record.output_dir, &base, &page.id) || pinned.contains(&page.id);
        if still_valid && taken.insert(record.output_dir.clone()) {
            assigned.insert(page.id.clone(), record.output_dir.clone());
        }
    }

    for page in &tree.pages {
        if assigned.contains_key(&page.id) {
            continue;
        }
        let base = slugify(&page.title);
        let free = |dir: &str| !taken.contains(dir) && !is_foreign(paths, dir, &page.id);
        let dir = if free(&base) {
            base
        } else {
            // Another title may already slug to the widened name.
            let stem = disambiguated(&base, &page.id);
            let mut dir = stem.clone();
            let mut n = 2;
            while !free(&dir) {
                dir = format!("{}-{}", stem, n);
                n += 1;
            }
            dir
        };
        taken.insert(dir.clone());
        assigned.insert(page.id.clone(), dir);
    }

    assigned
}

/// A directory exists at `dir` that this page did not write.
fn is_foreign(paths: &Paths, dir: &str, page_id: &str) -> bool {
    let path = paths.page_dir(dir);
    if !path.exists() {
        return false;
    }
    match read_frontmatter(&path.join(PAGE_FILE_NAME)) {
        Ok(Some(fm)) => fm.page_id != page_id,
        _ => true,
    }
}

/// Relative links between page READMEs, keyed by page id.
pub fn page_links(dirs: &HashMap<String, String>) -> HashMap<String, String> {
    dirs.iter()
        .map(|(id, dir)| (id.clone(), format!("../{}/{}", dir, PAGE_FILE_NAME)))
        .collect()
}

/// Root README listing every synced page as a nested list.
pub fn render_index(tree: &PageTree, state: &SyncState) -> String {
    let title = if tree.root.title.is_empty() {
        "Notion mirror"
    } else {
        tree.root.title.as_str()
    };
    let mut out = format!(
        "# {}\n\n> Mirrored from Notion by notion-mirror. Edits here are overwritten on the next sync.\n\n",
        title
    );

    let mut lines = Vec::new();
    let mut stack: Vec<(&str, usize)> = tree
        .root
        .children
        .iter()
        .rev()
        .map(|id| (id.as_str(), 0))
        .collect();
    while let Some((id, depth)) = stack.pop() {
        let (Some(page), Some(record)) = (tree.get(id), state.pages.get(id)) else {
            continue;
        };
        let date = match &record.fingerprint {
            Fingerprint::LastEdited(ts) => *ts,
            Fingerprint::ContentHash(_) => record.synced_at,
        };
        lines.push(format!(
            "{}- [{}]({}/{}) · _updated {}_",
            "  ".repeat(depth),
            escape_link_text(&page.title),
            record.output_dir,
            PAGE_FILE_NAME,
            date.format("%Y-%m-%d")
        ));
        stack.extend(page.children.iter().rev().map(|c| (c.as_str(), depth + 1)));
    }

    if lines.is_empty() {
        out.push_str("_No pages synced yet._\n");
    } else {
        out.push_str(&lines.join("\n"));
        out.push('\n');
    }
    out
}

fn escape_link_text(text: &str) -> String {
    let text = if text.is_empty() { "Untitled" } else { text };
    text.replace('[', "\\[").replace(']', "\\]")
}
