// ABOUTME: Sync orchestration: discovery, change detection, page writes, commit
// ABOUTME: Workers render pages in parallel; one coordinator owns state and index

use crate::{
    api::PageSource,
    assets::{resolve_assets, AssetFailure},
    block::Block,
    cancel::CancelToken,
    commit::{compose, CommitMessage},
    detect::{classify, content_fingerprint, timestamp_fingerprint, ChangeEntry, ChangeKind, ChangeSet},
    error::SinkError,
    fetch::{discover, fetch_blocks},
    layout::{assign_dirs, page_links, render_index},
    model::{PageNode, PageTree, SkippedPage},
    render::{render_markdown, RenderContext},
    sink::VcsSink,
    state::{Fingerprint, StateStore, SyncRecord, SyncState},
    storage::{remove_dir_if_exists, write_atomic, Paths},
    Error, Frontmatter, Result,
};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub const GENERATOR: &str = concat!("notion-mirror ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub force: bool,
    pub dry_run: bool,
    pub push: bool,
    pub concurrency: usize,
    pub progress: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            force: false,
            dry_run: false,
            push: true,
            concurrency: 4,
            progress: false,
        }
    }
}

/// Outcome of one run, printed by the CLI and inspected by tests.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Every discovered page with its classification.
    pub changes: ChangeSet,
    /// Page ids whose README was (or, in dry-run, would be) written.
    pub written: Vec<String>,
    pub skipped: Vec<SkippedPage>,
    /// Failed downloads keyed by page id; the page links the remote URL.
    pub asset_failures: Vec<(String, AssetFailure)>,
    pub commit: Option<CommitMessage>,
    pub committed: bool,
    pub pushed: bool,
    pub dry_run: bool,
}

impl SyncReport {
    /// Completed, but some pages or assets are missing from the output.
    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty() || !self.asset_failures.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        let verb = if self.dry_run { "would sync" } else { "synced" };
        let _ = writeln!(
            out,
            "{} {} of {} pages ({} unchanged)",
            verb,
            self.written.len(),
            self.changes.entries.len(),
            self.changes.entries.len() - self.changes.pending_count()
        );
        for skipped in &self.skipped {
            let _ = writeln!(
                out,
                "skipped {} ({}): {}",
                skipped.title.as_deref().unwrap_or("untitled"),
                skipped.page_id,
                skipped.reason
            );
        }
        for (page_id, failure) in &self.asset_failures {
            let _ = writeln!(
                out,
                "asset left remote on {}: {} ({})",
                page_id, failure.source, failure.error
            );
        }
        match (&self.commit, self.committed) {
            (Some(msg), true) => {
                let _ = writeln!(out, "committed: {}", msg.subject);
            }
            (Some(msg), false) if self.dry_run => {
                let _ = writeln!(out, "would commit: {}", msg.subject);
            }
            _ => {}
        }
        if self.pushed {
            let _ = writeln!(out, "pushed");
        }
        out
    }
}

/// Result of rendering one page on a worker.
struct PageOutcome {
    page_id: String,
    record: SyncRecord,
    failures: Vec<AssetFailure>,
    wrote: bool,
}

/// Run one sync of the tree under `root_id` into `paths.root`.
pub fn sync_all(
    source: &dyn PageSource,
    store: &dyn StateStore,
    sink: Option<&dyn VcsSink>,
    paths: &Paths,
    root_id: &str,
    opts: &SyncOptions,
    cancel: &CancelToken,
) -> Result<SyncReport> {
    let mut state = store.load()?;
    if let Some(previous) = state.root_page_id.as_deref() {
        if previous != root_id {
            warn!(previous, current = root_id, "root page differs from the last run");
        }
    }

    let pool = build_pool(opts.concurrency)?;

    info!("discovering page tree");
    let tree = discover(source, root_id, &pool, cancel)?;
    info!(pages = tree.pages.len(), skipped = tree.skipped.len(), "discovery complete");

    // Pages without a timestamp are classified by content, so fetch them now.
    let (prefetched, unreadable) = prefetch_untimed(source, &tree, &pool, cancel)?;

    let mut kinds = HashMap::new();
    let mut fingerprints = HashMap::new();
    for page in &tree.pages {
        let fingerprint = match timestamp_fingerprint(page) {
            Some(fp) => fp,
            None => match prefetched.get(&page.id) {
                Some(blocks) => content_fingerprint(blocks),
                None => continue,
            },
        };
        let kind = classify(state.pages.get(&page.id), &fingerprint, opts.force);
        debug!(page = %page.id, %kind, %fingerprint, "classified");
        kinds.insert(page.id.clone(), kind);
        fingerprints.insert(page.id.clone(), fingerprint);
    }

    let pinned: HashSet<String> = kinds
        .iter()
        .filter(|(_, kind)| !kind.needs_sync())
        .map(|(id, _)| id.clone())
        .collect();
    let dirs = assign_dirs(&tree, &state, paths, &pinned);

    let changes = ChangeSet {
        entries: tree
            .pages
            .iter()
            .filter_map(|page| {
                Some(ChangeEntry {
                    page_id: page.id.clone(),
                    title: page.title.clone(),
                    slug: dirs.get(&page.id)?.clone(),
                    kind: *kinds.get(&page.id)?,
                })
            })
            .collect(),
        first_sync: state.is_empty(),
    };

    let mut report = SyncReport {
        skipped: tree.skipped.iter().cloned().chain(unreadable).collect(),
        dry_run: opts.dry_run,
        ..Default::default()
    };

    if opts.dry_run {
        for entry in changes.pending() {
            println!("would {} {} -> {}/README.md", action(entry.kind), entry.title, entry.slug);
        }
        report.written = changes.pending().map(|e| e.page_id.clone()).collect();
        report.commit = compose(&changes);
        report.changes = changes;
        return Ok(report);
    }

    let carried = store.load_pending()?;
    if changes.is_empty() && carried.is_none() {
        info!("no page changed since the last run");
        report.changes = changes;
        return Ok(report);
    }
    if let Some(carried) = &carried {
        info!(pages = carried.entries.len(), "retrying commit left over from an earlier run");
    }

    paths.ensure_dirs()?;
    let mut touched: Vec<PathBuf> = move_renamed(&changes, &state, paths)?;

    let links = page_links(&dirs);
    let work: Vec<&ChangeEntry> = changes.pending().collect();
    let progress = progress_bar(work.len(), opts.progress);

    let results: Vec<(String, Result<PageOutcome>)> = pool.install(|| {
        work.par_iter()
            .map(|entry| {
                let job = PageJob {
                    entry,
                    prior: state.pages.get(&entry.page_id),
                    fingerprint: fingerprints.get(&entry.page_id),
                    prefetched: prefetched.get(&entry.page_id).map(Vec::as_slice),
                };
                let outcome = process_page(source, &tree, job, paths, &links, cancel);
                progress.inc(1);
                (entry.page_id.clone(), outcome)
            })
            .collect()
    });
    progress.finish_and_clear();

    let mut fatal = None;
    for (page_id, result) in results {
        match result {
            Ok(outcome) => {
                if outcome.wrote {
                    touched.push(paths.page_dir(&outcome.record.output_dir));
                    report.written.push(outcome.page_id.clone());
                }
                report.asset_failures.extend(
                    outcome
                        .failures
                        .into_iter()
                        .map(|f| (outcome.page_id.clone(), f)),
                );
                state.pages.insert(outcome.page_id, outcome.record);
            }
            Err(e) if e.is_skippable() => {
                warn!(page = %page_id, "page disappeared during sync: {}", e);
                report.skipped.push(SkippedPage {
                    title: tree.get(&page_id).map(|p| p.title.clone()),
                    page_id,
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                warn!(page = %page_id, "page failed: {}", e);
                if fatal.is_none() {
                    fatal = Some(e);
                }
            }
        }
    }

    // Everything written so far is owed a commit until one lands.
    let mut pending = carried.unwrap_or_default();
    pending.absorb(&changes.retain_pages(&report.written), &touched, &paths.root);
    state.root_page_id = Some(root_id.to_string());

    if let Some(e) = fatal {
        store.save(&state)?;
        if !pending.is_empty() {
            store.save_pending(&pending)?;
        }
        return Err(e);
    }

    write_atomic(
        &paths.index_file,
        render_index(&tree, &state).as_bytes(),
        &paths.tmp_dir,
    )?;

    let previous_run = state.last_run;
    state.last_run = Some(Utc::now());
    store.save(&state)?;

    report.changes = changes;
    report.commit = compose(&pending.changes());

    let Some(sink) = sink else {
        store.clear_pending()?;
        return Ok(report);
    };
    let Some(message) = report.commit.as_ref() else {
        store.clear_pending()?;
        return Ok(report);
    };

    store.save_pending(&pending)?;
    let mut commit_paths = pending.absolute_paths(&paths.root);
    commit_paths.extend([
        paths.index_file.clone(),
        paths.state_file.clone(),
        paths.state_dir.join(".gitignore"),
    ]);
    match sink.commit(&commit_paths, message) {
        Ok(()) => {
            info!(subject = %message.subject, "committed");
            report.committed = true;
        }
        Err(SinkError::NothingStaged) => info!("nothing staged; skipping commit"),
        Err(e) => {
            // The run did not finish, so the last successful run stands.
            state.last_run = previous_run;
            store.save(&state)?;
            return Err(e.into());
        }
    }
    store.clear_pending()?;

    if report.committed && opts.push {
        match sink.push() {
            Ok(()) => report.pushed = true,
            Err(SinkError::NoRemote) => warn!("no git remote configured; skipping push"),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(report)
}

fn build_pool(concurrency: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(concurrency.max(1))
        .thread_name(|i| format!("notion-mirror-{}", i))
        .build()
        .map_err(|e| Error::Config(format!("could not start worker pool: {}", e)))
}

fn action(kind: ChangeKind) -> &'static str {
    match kind {
        ChangeKind::New => "add",
        ChangeKind::ImagesAdded => "add images to",
        _ => "update",
    }
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("[{bar:40}] {pos}/{len} pages") {
        pb.set_style(style.progress_chars("##-"));
    }
    pb
}

/// Fetch full block trees for pages that carry no last-edited timestamp.
/// Pages that vanished since discovery are returned as skips.
fn prefetch_untimed(
    source: &dyn PageSource,
    tree: &PageTree,
    pool: &ThreadPool,
    cancel: &CancelToken,
) -> Result<(HashMap<String, Vec<Block>>, Vec<SkippedPage>)> {
    let untimed: Vec<&PageNode> = tree
        .pages
        .iter()
        .filter(|p| p.last_edited.is_none())
        .collect();
    if untimed.is_empty() {
        return Ok((HashMap::new(), Vec::new()));
    }
    debug!(pages = untimed.len(), "fetching untimed pages for content fingerprints");

    let results: Vec<(&PageNode, Result<Vec<Block>>)> = pool.install(|| {
        untimed
            .par_iter()
            .map(|page| {
                let top = tree.top_blocks.get(&page.id).map(Vec::as_slice);
                (*page, fetch_blocks(source, &page.id, top, cancel))
            })
            .collect()
    });

    let mut blocks = HashMap::new();
    let mut skipped = Vec::new();
    for (page, result) in results {
        match result {
            Ok(b) => {
                blocks.insert(page.id.clone(), b);
            }
            Err(e) if e.is_skippable() => {
                warn!(page = %page.id, "skipping unreadable page: {}", e);
                skipped.push(SkippedPage {
                    page_id: page.id.clone(),
                    title: Some(page.title.clone()),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }
    Ok((blocks, skipped))
}

/// Move the directories of renamed pages to their new slug. Moves go through
/// the temp directory first so two pages may swap names in one run.
fn move_renamed(changes: &ChangeSet, state: &SyncState, paths: &Paths) -> Result<Vec<PathBuf>> {
    let mut staged = Vec::new();
    for entry in changes.pending() {
        let Some(prior) = state.pages.get(&entry.page_id) else {
            continue;
        };
        if prior.output_dir == entry.slug {
            continue;
        }
        let from = paths.page_dir(&prior.output_dir);
        if !from.is_dir() {
            continue;
        }
        let parked = paths.tmp_dir.join(format!("move-{}", crate::util::short_id(&entry.page_id)));
        remove_dir_if_exists(&parked)?;
        fs::rename(&from, &parked)?;
        info!(from = %prior.output_dir, to = %entry.slug, "page renamed");
        staged.push((from, parked, paths.page_dir(&entry.slug)));
    }

    let mut touched = Vec::new();
    for (from, parked, to) in staged {
        remove_dir_if_exists(&to)?;
        fs::rename(&parked, &to)?;
        touched.push(from);
        touched.push(to);
    }
    Ok(touched)
}

struct PageJob<'a> {
    entry: &'a ChangeEntry,
    prior: Option<&'a SyncRecord>,
    fingerprint: Option<&'a Fingerprint>,
    prefetched: Option<&'a [Block]>,
}

fn process_page(
    source: &dyn PageSource,
    tree: &PageTree,
    job: PageJob<'_>,
    paths: &Paths,
    links: &HashMap<String, String>,
    cancel: &CancelToken,
) -> Result<PageOutcome> {
    let entry = job.entry;
    let page = tree.get(&entry.page_id).ok_or_else(|| Error::NotFound {
        page_id: entry.page_id.clone(),
        status: 404,
    })?;

    let fetched;
    let blocks: &[Block] = match job.prefetched {
        Some(blocks) => blocks,
        None => {
            let top = tree.top_blocks.get(&page.id).map(Vec::as_slice);
            fetched = fetch_blocks(source, &page.id, top, cancel)?;
            &fetched
        }
    };

    let images_dir = paths.images_dir(&entry.slug);
    let resolved = resolve_assets(source, blocks, job.prior, &images_dir, &paths.tmp_dir)?;

    if entry.kind == ChangeKind::ImagesAdded && resolved.downloaded == 0 {
        if let Some(prior) = job.prior {
            debug!(page = %page.id, "asset retry downloaded nothing; leaving page as is");
            return Ok(PageOutcome {
                page_id: page.id.clone(),
                record: SyncRecord {
                    pending_assets: resolved.pending(),
                    ..prior.clone()
                },
                failures: resolved.failed,
                wrote: false,
            });
        }
    }

    if let Some(prior) = job.prior {
        for stale in prior
            .assets
            .iter()
            .filter(|a| !resolved.assets.iter().any(|r| r.file == a.file))
        {
            match fs::remove_file(images_dir.join(&stale.file)) {
                Ok(()) => debug!(page = %page.id, asset = %stale.file, "removed stale asset"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    let ctx = RenderContext {
        media: Some(&resolved.links),
        pages: Some(links),
        stable_media: false,
    };
    let document = to_markdown(page, blocks, &ctx)?;
    write_atomic(&paths.page_file(&entry.slug), document.as_bytes(), &paths.tmp_dir)?;
    debug!(page = %page.id, dir = %entry.slug, kind = %entry.kind, "wrote page");

    let fingerprint = match job.fingerprint {
        Some(fp) => fp.clone(),
        None => content_fingerprint(blocks),
    };
    Ok(PageOutcome {
        page_id: page.id.clone(),
        record: SyncRecord {
            title: page.title.clone(),
            fingerprint,
            output_dir: entry.slug.clone(),
            pending_assets: resolved.pending(),
            assets: resolved.assets,
            synced_at: Utc::now(),
        },
        failures: resolved.failed,
        wrote: true,
    })
}

/// Frontmatter, title heading, and rendered body of one page README.
pub fn to_markdown(page: &PageNode, blocks: &[Block], ctx: &RenderContext) -> Result<String> {
    let frontmatter = Frontmatter {
        page_id: page.id.clone(),
        title: Some(page.title.clone()).filter(|t| !t.is_empty()),
        last_edited: page.last_edited,
        source_url: page.url.clone(),
        generator: GENERATOR.into(),
    };

    let frontmatter_yaml = serde_yaml::to_string(&frontmatter).map_err(|e| {
        Error::Filesystem(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to serialize frontmatter: {}", e),
        ))
    })?;

    let title = if page.title.trim().is_empty() {
        "Untitled"
    } else {
        page.title.trim()
    };
    let body = render_markdown(blocks, ctx);

    let mut out = format!("---\n{}---\n\n# {}\n", frontmatter_yaml, title);
    if !body.is_empty() {
        out.push('\n');
        out.push_str(&body);
    }
    Ok(out)
}

/// Human-readable summary of the persisted state. Performs no fetch.
pub fn status(store: &dyn StateStore) -> Result<String> {
    let state = store.load()?;
    let mut out = String::new();
    let Some(last_run) = state.last_run else {
        out.push_str("No sync has run yet.\n");
        return Ok(out);
    };

    let _ = writeln!(out, "Last run:  {}", last_run.to_rfc3339());
    if let Some(root) = &state.root_page_id {
        let _ = writeln!(out, "Root page: {}", root);
    }
    let _ = writeln!(out, "Pages:     {}", state.pages.len());
    if let Some(pending) = store.load_pending()? {
        let _ = writeln!(
            out,
            "Uncommitted: {} pages from an interrupted run (committed on the next sync)",
            pending.entries.len()
        );
    }
    for (id, record) in &state.pages {
        let _ = write!(
            out,
            "  {}  {}  [{}]  {}",
            record.output_dir, record.title, id, record.fingerprint
        );
        if !record.pending_assets.is_empty() {
            let _ = write!(out, "  ({} assets pending)", record.pending_assets.len());
        }
        out.push('\n');
    }
    Ok(out)
}

#[derive(Debug, Default)]
pub struct CleanReport {
    pub removed_dirs: Vec<String>,
    pub removed_index: bool,
}

/// Delete every recorded page directory, the generated index, and the state.
///
/// An unreadable state file is still cleared; its directories cannot be
/// known and are left in place.
pub fn clean(store: &dyn StateStore, paths: &Paths) -> Result<CleanReport> {
    let state = match store.load() {
        Ok(state) => state,
        Err(e @ Error::StateCorruption { .. }) => {
            warn!("state unreadable, clearing it without removing page directories: {}", e);
            SyncState::default()
        }
        Err(e) => return Err(e),
    };

    let mut report = CleanReport::default();
    for record in state.pages.values() {
        if remove_dir_if_exists(&paths.page_dir(&record.output_dir))? {
            debug!(dir = %record.output_dir, "removed page directory");
            report.removed_dirs.push(record.output_dir.clone());
        }
    }
    if paths.index_file.is_file() {
        fs::remove_file(&paths.index_file)?;
        report.removed_index = true;
    }
    store.clear()?;
    remove_dir_if_exists(&paths.tmp_dir)?;
    info!(dirs = report.removed_dirs.len(), "clean complete");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::TextRun;
    use crate::state::MemoryStateStore;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn page(title: &str) -> PageNode {
        PageNode {
            id: "1f2e3d4c-0000-0000-0000-000000000000".into(),
            title: title.into(),
            last_edited: Some("2025-06-01T12:00:00Z".parse().unwrap()),
            url: Some("https://www.notion.so/1f2e3d4c".into()),
            parent: Some("root".into()),
            children: vec![],
        }
    }

    fn record(dir: &str) -> SyncRecord {
        SyncRecord {
            title: dir.into(),
            fingerprint: Fingerprint::LastEdited("2025-06-01T12:00:00Z".parse().unwrap()),
            output_dir: dir.into(),
            assets: vec![],
            pending_assets: vec!["https://s3/x/a.png".into()],
            synced_at: "2025-06-02T00:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn test_to_markdown_layout() {
        let blocks = vec![Block::Paragraph {
            text: vec![TextRun::plain("Hello")],
            children: vec![],
        }];
        let doc = to_markdown(&page("Onboarding"), &blocks, &RenderContext::default()).unwrap();

        assert!(doc.starts_with("---\npage_id: "));
        assert!(doc.contains("1f2e3d4c-0000-0000-0000-000000000000"));
        assert!(doc.contains("title: Onboarding\n"));
        assert!(doc.ends_with("---\n\n# Onboarding\n\nHello\n"));
    }

    #[test]
    fn test_to_markdown_empty_page() {
        let doc = to_markdown(&page(""), &[], &RenderContext::default()).unwrap();
        assert!(doc.ends_with("---\n\n# Untitled\n"));
    }

    #[test]
    fn test_status_without_runs() {
        let store = MemoryStateStore::default();
        assert_eq!(status(&store).unwrap(), "No sync has run yet.\n");
    }

    #[test]
    fn test_status_lists_pages() {
        let mut state = SyncState::default();
        state.last_run = Some("2025-06-02T00:00:00Z".parse().unwrap());
        state.root_page_id = Some("root".into());
        state.pages.insert("p1".into(), record("guides"));
        let store = MemoryStateStore::with_state(state);

        let out = status(&store).unwrap();
        assert!(out.contains("Last run:  2025-06-02T00:00:00+00:00"));
        assert!(out.contains("Pages:     1"));
        assert!(out.contains("  guides  guides  [p1]  edited 2025-06-01T12:00:00+00:00  (1 assets pending)"));
    }

    #[test]
    fn test_status_reports_uncommitted_pages() {
        let mut state = SyncState::default();
        state.last_run = Some("2025-06-02T00:00:00Z".parse().unwrap());
        state.pages.insert("p1".into(), record("guides"));
        let store = MemoryStateStore::with_state(state);
        store
            .save_pending(&crate::state::PendingCommit {
                first_sync: false,
                entries: vec![ChangeEntry {
                    page_id: "p1".into(),
                    title: "Guides".into(),
                    slug: "guides".into(),
                    kind: ChangeKind::ContentUpdated,
                }],
                paths: vec!["guides".into()],
            })
            .unwrap();

        let out = status(&store).unwrap();
        assert!(out.contains("Uncommitted: 1 pages from an interrupted run"));
    }

    #[test]
    fn test_clean_removes_recorded_dirs_index_and_state() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::new(temp.path().to_path_buf());
        paths.ensure_dirs().unwrap();
        fs::create_dir_all(temp.path().join("guides/images")).unwrap();
        fs::create_dir_all(temp.path().join("hand-written")).unwrap();
        fs::write(&paths.index_file, "# Index\n").unwrap();

        let mut state = SyncState::default();
        state.pages.insert("p1".into(), record("guides"));
        let store = MemoryStateStore::with_state(state);

        let report = clean(&store, &paths).unwrap();
        assert_eq!(report.removed_dirs, vec!["guides".to_string()]);
        assert!(report.removed_index);
        assert!(!temp.path().join("guides").exists());
        assert!(temp.path().join("hand-written").exists());
        assert!(store.snapshot().is_none());
    }

    #[test]
    fn test_clean_tolerates_corrupt_state() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::new(temp.path().to_path_buf());
        paths.ensure_dirs().unwrap();
        fs::write(&paths.state_file, "{broken").unwrap();
        let store = crate::state::FileStateStore::new(paths.state_file.clone(), paths.tmp_dir.clone());

        clean(&store, &paths).unwrap();
        assert!(!paths.state_file.exists());
    }

    #[test]
    fn test_report_partial_and_summary() {
        let mut report = SyncReport::default();
        assert!(!report.is_partial());
        report.skipped.push(SkippedPage {
            page_id: "p9".into(),
            title: Some("Secret".into()),
            reason: "Page p9 is not accessible (HTTP 403)".into(),
        });
        assert!(report.is_partial());
        assert!(report.summary().contains("skipped Secret (p9)"));
    }
}
