// ABOUTME: Builds semantic commit messages from the set of changed pages
// ABOUTME: Template chosen by cardinality; an empty ChangeSet yields no commit

use crate::detect::{ChangeEntry, ChangeKind, ChangeSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMessage {
    pub subject: String,
    pub body: Option<String>,
}

impl fmt::Display for CommitMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.subject)?;
        if let Some(body) = &self.body {
            write!(f, "\n\n{}", body)?;
        }
        Ok(())
    }
}

fn scope(kind: ChangeKind) -> &'static str {
    match kind {
        ChangeKind::New => "feat",
        _ => "docs",
    }
}

fn describe(entry: &ChangeEntry) -> String {
    let title = if entry.title.trim().is_empty() {
        entry.slug.as_str()
    } else {
        entry.title.trim()
    };
    match entry.kind {
        ChangeKind::New => format!("add {}", title),
        ChangeKind::ImagesAdded => format!("add images to {}", title),
        _ => format!("update {}", title),
    }
}

fn enumerate(entries: &[&ChangeEntry], with_kind: bool) -> String {
    entries
        .iter()
        .map(|e| {
            if with_kind {
                format!("- {} ({})", e.slug, e.kind)
            } else {
                format!("- {}", e.slug)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compose the commit message for `changes`, or `None` when nothing changed.
pub fn compose(changes: &ChangeSet) -> Option<CommitMessage> {
    let pending: Vec<&ChangeEntry> = changes.pending().collect();
    if pending.is_empty() {
        return None;
    }

    if changes.first_sync {
        return Some(CommitMessage {
            subject: format!(
                "feat: initial sync of {} topic{}",
                pending.len(),
                if pending.len() == 1 { "" } else { "s" }
            ),
            body: Some(enumerate(&pending, false)),
        });
    }

    if let [only] = pending.as_slice() {
        return Some(CommitMessage {
            subject: format!("{}({}): {}", scope(only.kind), only.slug, describe(only)),
            body: None,
        });
    }

    let all_new = pending.iter().all(|e| e.kind == ChangeKind::New);
    Some(CommitMessage {
        subject: format!(
            "{}: sync updates across {} topics",
            if all_new { "feat" } else { "docs" },
            pending.len()
        ),
        body: Some(enumerate(&pending, true)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(slug: &str, kind: ChangeKind) -> ChangeEntry {
        ChangeEntry {
            page_id: format!("id-{}", slug),
            title: slug.replace('-', " "),
            slug: slug.into(),
            kind,
        }
    }

    fn set(entries: Vec<ChangeEntry>, first_sync: bool) -> ChangeSet {
        ChangeSet {
            entries,
            first_sync,
        }
    }

    #[test]
    fn test_empty_change_set_has_no_commit() {
        assert!(compose(&set(vec![], false)).is_none());
        assert!(compose(&set(vec![entry("a", ChangeKind::Unchanged)], false)).is_none());
        assert!(compose(&set(vec![], true)).is_none());
    }

    #[test]
    fn test_single_page_template() {
        let msg = compose(&set(
            vec![
                entry("faq", ChangeKind::Unchanged),
                entry("release-notes", ChangeKind::ContentUpdated),
            ],
            false,
        ))
        .unwrap();
        assert_eq!(msg.subject, "docs(release-notes): update release notes");
        assert!(msg.body.is_none());

        let msg = compose(&set(vec![entry("faq", ChangeKind::New)], false)).unwrap();
        assert_eq!(msg.subject, "feat(faq): add faq");

        let msg = compose(&set(vec![entry("faq", ChangeKind::ImagesAdded)], false)).unwrap();
        assert_eq!(msg.subject, "docs(faq): add images to faq");
    }

    #[test]
    fn test_multi_page_template_enumerates_exactly_changed() {
        let msg = compose(&set(
            vec![
                entry("alpha", ChangeKind::ContentUpdated),
                entry("beta", ChangeKind::Unchanged),
                entry("gamma", ChangeKind::New),
                entry("delta", ChangeKind::ImagesAdded),
            ],
            false,
        ))
        .unwrap();
        assert_eq!(msg.subject, "docs: sync updates across 3 topics");
        assert_eq!(
            msg.body.as_deref(),
            Some("- alpha (content-updated)\n- gamma (new)\n- delta (images-added)")
        );
    }

    #[test]
    fn test_initial_sync_template() {
        let msg = compose(&set(
            vec![
                entry("one", ChangeKind::New),
                entry("two", ChangeKind::New),
                entry("three", ChangeKind::New),
            ],
            true,
        ))
        .unwrap();
        assert_eq!(msg.subject, "feat: initial sync of 3 topics");
        assert_eq!(msg.body.as_deref(), Some("- one\n- two\n- three"));
        assert_eq!(
            msg.to_string(),
            "feat: initial sync of 3 topics\n\n- one\n- two\n- three"
        );
    }
}
