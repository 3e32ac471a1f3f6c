// ABOUTME: Decides which pages need re-sync by comparing fingerprints
// ABOUTME: Builds the ChangeSet snapshot consumed by the orchestrator and composer

use crate::block::Block;
use crate::model::PageNode;
use crate::render::{render_markdown, RenderContext};
use crate::state::{Fingerprint, SyncRecord};
use crate::util::sha256_hex;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeKind {
    New,
    ContentUpdated,
    ImagesAdded,
    Unchanged,
}

impl ChangeKind {
    pub fn needs_sync(self) -> bool {
        self != ChangeKind::Unchanged
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChangeKind::New => "new",
            ChangeKind::ContentUpdated => "content-updated",
            ChangeKind::ImagesAdded => "images-added",
            ChangeKind::Unchanged => "unchanged",
        };
        f.write_str(label)
    }
}

/// Classify one page.
///
/// | prior | fingerprint | force | result |
/// |---|---|---|---|
/// | none | - | - | new |
/// | some | differs | - | content-updated |
/// | some | same | set | content-updated |
/// | some | same | unset, pending assets | images-added |
/// | some | same | unset | unchanged |
pub fn classify(prior: Option<&SyncRecord>, current: &Fingerprint, force: bool) -> ChangeKind {
    let Some(record) = prior else {
        return ChangeKind::New;
    };
    if record.fingerprint != *current || force {
        ChangeKind::ContentUpdated
    } else if !record.pending_assets.is_empty() {
        ChangeKind::ImagesAdded
    } else {
        ChangeKind::Unchanged
    }
}

/// The cheap fingerprint available from page metadata alone.
pub fn timestamp_fingerprint(page: &PageNode) -> Option<Fingerprint> {
    page.last_edited.map(Fingerprint::LastEdited)
}

/// Fallback fingerprint: hash of the rendering with media written as stable
/// keys, so rotating signed URLs do not register as edits.
pub fn content_fingerprint(blocks: &[Block]) -> Fingerprint {
    let ctx = RenderContext {
        stable_media: true,
        ..Default::default()
    };
    Fingerprint::ContentHash(sha256_hex(render_markdown(blocks, &ctx).as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub page_id: String,
    pub title: String,
    pub slug: String,
    pub kind: ChangeKind,
}

/// Every discovered page tagged with its change kind, in tree order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub entries: Vec<ChangeEntry>,
    /// True when no page had ever been synced before this run.
    pub first_sync: bool,
}

impl ChangeSet {
    pub fn pending(&self) -> impl Iterator<Item = &ChangeEntry> {
        self.entries.iter().filter(|e| e.kind.needs_sync())
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    pub fn is_empty(&self) -> bool {
        self.pending_count() == 0
    }

    pub fn get(&self, page_id: &str) -> Option<&ChangeEntry> {
        self.entries.iter().find(|e| e.page_id == page_id)
    }

    /// Narrow to the given page ids, keeping order. Used after processing to
    /// drop pages that turned out to need no write.
    pub fn retain_pages(&self, written: &[String]) -> ChangeSet {
        ChangeSet {
            entries: self
                .entries
                .iter()
                .filter(|e| e.kind.needs_sync() && written.contains(&e.page_id))
                .cloned()
                .collect(),
            first_sync: self.first_sync,
        }
    }
}
