// ABOUTME: Closed set of block variants and decoding from raw API payloads
// ABOUTME: Anything the decoder does not recognise becomes Block::Unsupported

use crate::model::{RawBlock, RawRichText};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Style {
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
    pub strikethrough: bool,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub style: Style,
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        TextRun {
            text: text.into(),
            style: Style::default(),
        }
    }
}

/// Where a media block points. `key` drops the query string so signed URLs
/// that rotate on every fetch still identify the same asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSource {
    pub url: String,
    pub key: String,
}

impl MediaSource {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let key = url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string();
        MediaSource { url, key }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph {
        text: Vec<TextRun>,
        children: Vec<Block>,
    },
    Heading {
        level: u8,
        text: Vec<TextRun>,
        children: Vec<Block>,
    },
    BulletedItem {
        text: Vec<TextRun>,
        children: Vec<Block>,
    },
    NumberedItem {
        text: Vec<TextRun>,
        children: Vec<Block>,
    },
    ToDo {
        text: Vec<TextRun>,
        checked: bool,
        children: Vec<Block>,
    },
    Toggle {
        text: Vec<TextRun>,
        children: Vec<Block>,
    },
    Quote {
        text: Vec<TextRun>,
        children: Vec<Block>,
    },
    Callout {
        icon: Option<String>,
        text: Vec<TextRun>,
        children: Vec<Block>,
    },
    Code {
        language: String,
        text: String,
    },
    Table {
        has_column_header: bool,
        rows: Vec<Vec<Vec<TextRun>>>,
    },
    Image {
        source: MediaSource,
        caption: Vec<TextRun>,
    },
    File {
        source: MediaSource,
        name: String,
    },
    ChildPage {
        id: String,
        title: String,
    },
    Divider,
    Unsupported {
        kind: String,
        id: String,
    },
}

impl Block {
    pub fn children(&self) -> &[Block] {
        match self {
            Block::Paragraph { children, .. }
            | Block::Heading { children, .. }
            | Block::BulletedItem { children, .. }
            | Block::NumberedItem { children, .. }
            | Block::ToDo { children, .. }
            | Block::Toggle { children, .. }
            | Block::Quote { children, .. }
            | Block::Callout { children, .. } => children,
            _ => &[],
        }
    }

    fn children_mut(&mut self) -> Option<&mut Vec<Block>> {
        match self {
            Block::Paragraph { children, .. }
            | Block::Heading { children, .. }
            | Block::BulletedItem { children, .. }
            | Block::NumberedItem { children, .. }
            | Block::ToDo { children, .. }
            | Block::Toggle { children, .. }
            | Block::Quote { children, .. }
            | Block::Callout { children, .. } => Some(children),
            _ => None,
        }
    }

    pub fn media(&self) -> Option<&MediaSource> {
        match self {
            Block::Image { source, .. } | Block::File { source, .. } => Some(source),
            _ => None,
        }
    }
}

// Deep trees are torn down from a work-list; the derived drop would recurse
// once per nesting level.
impl Drop for Block {
    fn drop(&mut self) {
        let mut pending = match self.children_mut() {
            Some(children) if !children.is_empty() => std::mem::take(children),
            _ => return,
        };
        while let Some(mut block) = pending.pop() {
            if let Some(children) = block.children_mut() {
                pending.append(children);
            }
        }
    }
}

/// Decode a raw block whose children have already been decoded.
///
/// `children` holds the decoded children in source order; for tables these
/// are ignored in favour of `raw_rows`, the raw `table_row` children.
pub fn decode(raw: &RawBlock, children: Vec<Block>, raw_rows: &[RawBlock]) -> Block {
    decode_known(raw, children, raw_rows).unwrap_or_else(|| unsupported(raw))
}

fn unsupported(raw: &RawBlock) -> Block {
    Block::Unsupported {
        kind: raw.kind.clone(),
        id: raw.id.clone(),
    }
}

fn decode_known(raw: &RawBlock, children: Vec<Block>, raw_rows: &[RawBlock]) -> Option<Block> {
    let payload = raw.payload();
    let block = match raw.kind.as_str() {
        "paragraph" => Block::Paragraph {
            text: rich_text(payload?, "rich_text")?,
            children,
        },
        "heading_1" | "heading_2" | "heading_3" => Block::Heading {
            level: raw.kind.as_bytes()[raw.kind.len() - 1] - b'0',
            text: rich_text(payload?, "rich_text")?,
            children,
        },
        "bulleted_list_item" => Block::BulletedItem {
            text: rich_text(payload?, "rich_text")?,
            children,
        },
        "numbered_list_item" => Block::NumberedItem {
            text: rich_text(payload?, "rich_text")?,
            children,
        },
        "to_do" => {
            let payload = payload?;
            Block::ToDo {
                text: rich_text(payload, "rich_text")?,
                checked: payload.get("checked").and_then(Value::as_bool).unwrap_or(false),
                children,
            }
        }
        "toggle" => Block::Toggle {
            text: rich_text(payload?, "rich_text")?,
            children,
        },
        "quote" => Block::Quote {
            text: rich_text(payload?, "rich_text")?,
            children,
        },
        "callout" => {
            let payload = payload?;
            Block::Callout {
                icon: payload
                    .get("icon")
                    .and_then(|icon| icon.get("emoji"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                text: rich_text(payload, "rich_text")?,
                children,
            }
        }
        "code" => {
            let payload = payload?;
            Block::Code {
                language: payload
                    .get("language")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                text: plain(&rich_text(payload, "rich_text")?),
            }
        }
        "table" => {
            let payload = payload?;
            let mut rows = Vec::with_capacity(raw_rows.len());
            for row in raw_rows.iter().filter(|r| r.kind == "table_row") {
                let cells = row.payload()?.get("cells")?.as_array()?;
                rows.push(
                    cells
                        .iter()
                        .map(|cell| runs_from_value(cell))
                        .collect::<Option<Vec<_>>>()?,
                );
            }
            Block::Table {
                has_column_header: payload
                    .get("has_column_header")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                rows,
            }
        }
        "image" => {
            let payload = payload?;
            Block::Image {
                source: MediaSource::new(file_url(payload)?),
                caption: rich_text(payload, "caption").unwrap_or_default(),
            }
        }
        "file" | "pdf" => {
            let payload = payload?;
            let url = file_url(payload)?;
            let name = payload
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| {
                    url.split('?')
                        .next()
                        .and_then(|path| path.rsplit('/').next())
                        .map(str::to_string)
                })
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "file".into());
            Block::File {
                source: MediaSource::new(url),
                name,
            }
        }
        "child_page" => Block::ChildPage {
            id: raw.id.clone(),
            title: raw.child_page_title()?,
        },
        "divider" => Block::Divider,
        _ => return None,
    };
    Some(block)
}

/// Media payloads are either `{"type": "file", "file": {"url": ..}}` or
/// `{"type": "external", "external": {"url": ..}}`.
fn file_url(payload: &Value) -> Option<String> {
    let kind = payload.get("type").and_then(Value::as_str)?;
    payload
        .get(kind)?
        .get("url")?
        .as_str()
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

fn rich_text(payload: &Value, field: &str) -> Option<Vec<TextRun>> {
    runs_from_value(payload.get(field)?)
}

fn runs_from_value(value: &Value) -> Option<Vec<TextRun>> {
    let raw: Vec<RawRichText> = serde_json::from_value(value.clone()).ok()?;
    Some(raw.into_iter().map(TextRun::from).collect())
}

impl From<RawRichText> for TextRun {
    fn from(raw: RawRichText) -> Self {
        TextRun {
            text: raw.plain_text,
            style: Style {
                bold: raw.annotations.bold,
                italic: raw.annotations.italic,
                code: raw.annotations.code,
                strikethrough: raw.annotations.strikethrough,
                link: raw.href,
            },
        }
    }
}

pub fn plain(runs: &[TextRun]) -> String {
    runs.iter().map(|r| r.text.as_str()).collect()
}
