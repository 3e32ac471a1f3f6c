// ABOUTME: Finds image and file references and downloads them next to the page
// ABOUTME: Deterministic hash-derived names; failed downloads keep the remote URL

use crate::api::PageSource;
use crate::block::{Block, MediaSource};
use crate::state::{AssetRecord, SyncRecord};
use crate::storage::{write_atomic, IMAGES_DIR_NAME};
use crate::util::sha256_hex;
use crate::Result;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFailure {
    pub source: String,
    pub url: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct ResolvedAssets {
    /// Media key -> path relative to the page README.
    pub links: BTreeMap<String, String>,
    /// Every asset now present on disk for the page.
    pub assets: Vec<AssetRecord>,
    pub downloaded: usize,
    pub failed: Vec<AssetFailure>,
}

impl ResolvedAssets {
    pub fn pending(&self) -> Vec<String> {
        self.failed.iter().map(|f| f.source.clone()).collect()
    }
}

/// Image and file references in document order, one per media key.
pub fn collect_media(blocks: &[Block]) -> Vec<&MediaSource> {
    let mut seen = HashSet::new();
    let mut media = Vec::new();
    let mut stack: Vec<&Block> = blocks.iter().rev().collect();
    while let Some(block) = stack.pop() {
        if let Some(source) = block.media() {
            if seen.insert(source.key.as_str()) {
                media.push(source);
            }
        }
        stack.extend(block.children().iter().rev());
    }
    media
}

/// `<first 16 hex of sha256(key)>.<ext>`, stable across signed-URL rotation.
pub fn asset_file_name(source: &MediaSource) -> String {
    let hash = sha256_hex(source.key.as_bytes());
    format!("{}.{}", &hash[..16], extension(&source.key))
}

fn extension(key: &str) -> String {
    key.rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".into())
}

/// Make every media reference in `blocks` local where possible.
///
/// Assets recorded in `prior` whose file still exists are reused; others are
/// downloaded into `images_dir`. A failed download is logged and recorded in
/// `failed`, never returned as an error.
pub fn resolve_assets(
    source: &dyn PageSource,
    blocks: &[Block],
    prior: Option<&SyncRecord>,
    images_dir: &Path,
    tmp_dir: &Path,
) -> Result<ResolvedAssets> {
    let mut resolved = ResolvedAssets::default();

    for media in collect_media(blocks) {
        let file = prior
            .and_then(|r| r.asset(&media.key))
            .map(|a| a.file.clone())
            .unwrap_or_else(|| asset_file_name(media));
        let target = images_dir.join(&file);

        if target.exists() {
            debug!(asset = %file, "asset already present");
        } else {
            match source.download(&media.url) {
                Ok(bytes) => {
                    write_atomic(&target, &bytes, tmp_dir)?;
                    resolved.downloaded += 1;
                    debug!(asset = %file, bytes = bytes.len(), "downloaded asset");
                }
                Err(e) => {
                    warn!(source = %media.key, "asset download failed, keeping remote URL: {}", e);
                    resolved.failed.push(AssetFailure {
                        source: media.key.clone(),
                        url: media.url.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
            }
        }

        resolved
            .links
            .insert(media.key.clone(), format!("{}/{}", IMAGES_DIR_NAME, file));
        resolved.assets.push(AssetRecord {
            source: media.key.clone(),
            file,
        });
    }

    Ok(resolved)
}
