// ABOUTME: Renders a decoded block tree into markdown lines
// ABOUTME: Lazy, stack-driven iterator; unsupported blocks become HTML comments

use crate::block::{Block, MediaSource, Style, TextRun};
use std::collections::{BTreeMap, HashMap, VecDeque};

const INDENT: &str = "  ";

/// Link targets the renderer substitutes for remote references.
#[derive(Debug, Default)]
pub struct RenderContext<'a> {
    /// Media key -> local relative path. Missing keys keep the remote URL.
    pub media: Option<&'a BTreeMap<String, String>>,
    /// Page id -> relative link to that page's README.
    pub pages: Option<&'a HashMap<String, String>>,
    /// Render media by key instead of URL so signed-URL rotation does not
    /// change the output. Used for content fingerprints.
    pub stable_media: bool,
}

impl<'a> RenderContext<'a> {
    fn media_target(&self, source: &MediaSource) -> String {
        if let Some(local) = self.media.and_then(|m| m.get(&source.key)) {
            return local.clone();
        }
        if self.stable_media {
            source.key.clone()
        } else {
            source.url.clone()
        }
    }
}

/// Collect the rendered lines into a single document ending in one newline.
pub fn render_markdown(blocks: &[Block], ctx: &RenderContext) -> String {
    let lines: Vec<String> = render_lines(blocks, ctx).collect();
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map(|i| i + 1)
        .unwrap_or(0);
    if end == 0 {
        return String::new();
    }
    let mut out = lines[..end].join("\n");
    out.push('\n');
    out
}

pub fn render_lines<'a>(blocks: &'a [Block], ctx: &'a RenderContext<'a>) -> MarkdownLines<'a> {
    MarkdownLines {
        ctx,
        stack: vec![Frame::new(blocks, String::new(), Vec::new())],
        pending: VecDeque::new(),
    }
}

pub struct MarkdownLines<'a> {
    ctx: &'a RenderContext<'a>,
    stack: Vec<Frame<'a>>,
    pending: VecDeque<String>,
}

struct Frame<'a> {
    blocks: &'a [Block],
    next: usize,
    indent: String,
    ordinal: usize,
    in_list: bool,
    closing: Vec<String>,
}

impl<'a> Frame<'a> {
    fn new(blocks: &'a [Block], indent: String, closing: Vec<String>) -> Self {
        Frame {
            blocks,
            next: 0,
            indent,
            ordinal: 0,
            in_list: false,
            closing,
        }
    }
}

impl<'a> Iterator for MarkdownLines<'a> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Some(line);
            }

            let frame = self.stack.last_mut()?;
            if frame.next >= frame.blocks.len() {
                let done = self.stack.pop()?;
                if done.in_list && done.closing.first().is_some_and(|l| !l.is_empty()) {
                    self.pending.push_back(String::new());
                }
                self.pending.extend(done.closing);
                continue;
            }

            let blocks: &'a [Block] = frame.blocks;
            let block = &blocks[frame.next];
            frame.next += 1;

            let is_list = matches!(
                block,
                Block::BulletedItem { .. } | Block::NumberedItem { .. } | Block::ToDo { .. }
            );
            if matches!(block, Block::NumberedItem { .. }) {
                frame.ordinal += 1;
            } else {
                frame.ordinal = 0;
            }
            if frame.in_list && !is_list {
                self.pending.push_back(String::new());
            }
            frame.in_list = is_list;

            let indent = frame.indent.clone();
            let ordinal = frame.ordinal;
            let rendered = render_block(block, &indent, ordinal, self.ctx);
            self.pending.extend(rendered.lines);

            let children = block.children();
            if !children.is_empty() {
                // List children align with the item's content column.
                let child_indent = match block {
                    Block::Heading { .. } => indent,
                    Block::NumberedItem { .. } => {
                        let width = numbered_marker(ordinal).len();
                        indent + &" ".repeat(width)
                    }
                    _ => indent + INDENT,
                };
                self.stack
                    .push(Frame::new(children, child_indent, rendered.closing));
            } else {
                self.pending.extend(rendered.closing);
            }
        }
    }
}

struct Rendered {
    lines: Vec<String>,
    closing: Vec<String>,
}

impl Rendered {
    fn lines(lines: Vec<String>) -> Self {
        Rendered {
            lines,
            closing: Vec::new(),
        }
    }

    /// Lines followed by the blank separator every non-list block ends with.
    fn spaced(mut lines: Vec<String>) -> Self {
        lines.push(String::new());
        Rendered::lines(lines)
    }
}

fn numbered_marker(ordinal: usize) -> String {
    format!("{}. ", ordinal.max(1))
}

fn render_block(block: &Block, ind: &str, ordinal: usize, ctx: &RenderContext) -> Rendered {
    match block {
        Block::Paragraph { text, .. } => {
            Rendered::spaced(prefixed(ind, "", ind, &render_text(text)))
        }
        Block::Heading { level, text, .. } => {
            let marks = "#".repeat((*level).clamp(1, 3) as usize);
            let title = render_text(text).replace('\n', " ");
            Rendered::spaced(vec![format!("{}{} {}", ind, marks, title)])
        }
        Block::BulletedItem { text, .. } => Rendered::lines(list_item(ind, "- ", text)),
        Block::NumberedItem { text, .. } => {
            Rendered::lines(list_item(ind, &numbered_marker(ordinal), text))
        }
        Block::ToDo { text, checked, .. } => {
            let marker = if *checked { "- [x] " } else { "- [ ] " };
            Rendered::lines(list_item(ind, marker, text))
        }
        Block::Toggle { text, .. } => Rendered {
            lines: vec![
                format!("{}<details>", ind),
                format!("{}<summary>{}</summary>", ind, render_text(text).replace('\n', " ")),
                String::new(),
            ],
            closing: vec![format!("{}</details>", ind), String::new()],
        },
        Block::Quote { text, .. } => {
            let quote_ind = format!("{}> ", ind);
            Rendered::spaced(prefixed(&quote_ind, "", &quote_ind, &render_text(text)))
        }
        Block::Callout { icon, text, .. } => {
            let quote_ind = format!("{}> ", ind);
            let lead = icon.as_deref().map(|i| format!("{} ", i)).unwrap_or_default();
            Rendered::spaced(prefixed(&quote_ind, &lead, &quote_ind, &render_text(text)))
        }
        Block::Code { language, text } => {
            let fence = "`".repeat(longest_backtick_run(text).max(2) + 1);
            let mut lines = vec![format!("{}{}{}", ind, fence, language)];
            lines.extend(text.split('\n').map(|l| {
                if l.is_empty() {
                    String::new()
                } else {
                    format!("{}{}", ind, l)
                }
            }));
            lines.push(format!("{}{}", ind, fence));
            Rendered::spaced(lines)
        }
        Block::Table { rows, .. } => Rendered::spaced(render_table(ind, rows)),
        Block::Image { source, caption } => {
            let alt = render_text(caption).replace('\n', " ");
            Rendered::spaced(vec![format!(
                "{}![{}]({})",
                ind,
                alt,
                ctx.media_target(source)
            )])
        }
        Block::File { source, name } => Rendered::spaced(vec![format!(
            "{}[{}]({})",
            ind,
            name,
            ctx.media_target(source)
        )]),
        Block::ChildPage { id, title } => {
            let line = match ctx.pages.and_then(|p| p.get(id)) {
                Some(link) => format!("{}[{}]({})", ind, title, link),
                None => format!("{}**{}**", ind, title),
            };
            Rendered::spaced(vec![line])
        }
        Block::Divider => Rendered::spaced(vec![format!("{}---", ind)]),
        Block::Unsupported { kind, id } => Rendered::spaced(vec![format!(
            "{}<!-- unsupported block: {} ({}) -->",
            ind, kind, id
        )]),
    }
}

fn list_item(ind: &str, marker: &str, text: &[TextRun]) -> Vec<String> {
    let continuation = format!("{}{}", ind, " ".repeat(marker.len()));
    prefixed(&format!("{}{}", ind, marker), "", &continuation, &render_text(text))
}

/// First line gets `first` + `lead`, following lines get `rest`.
fn prefixed(first: &str, lead: &str, rest: &str, text: &str) -> Vec<String> {
    text.split('\n')
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                format!("{}{}{}", first, lead, line)
            } else {
                format!("{}{}", rest, line)
            }
        })
        .map(|line| line.trim_end().to_string())
        .collect()
}

fn render_table(ind: &str, rows: &[Vec<Vec<TextRun>>]) -> Vec<String> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    let width = first.len().max(1);

    let row_line = |row: &Vec<Vec<TextRun>>| {
        let mut cells: Vec<String> = row
            .iter()
            .map(|cell| render_text(cell).replace('|', "\\|").replace('\n', "<br>"))
            .collect();
        while cells.len() < width {
            cells.push(String::new());
        }
        format!("{}| {} |", ind, cells.join(" | "))
    };

    let mut lines = vec![row_line(first)];
    lines.push(format!("{}|{}", ind, " --- |".repeat(width)));
    lines.extend(rows[1..].iter().map(row_line));
    lines
}

fn longest_backtick_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// Merge adjacent runs that share a style.
pub fn merge_runs(runs: &[TextRun]) -> Vec<TextRun> {
    let mut merged: Vec<TextRun> = Vec::with_capacity(runs.len());
    for run in runs {
        match merged.last_mut() {
            Some(last) if last.style == run.style => last.text.push_str(&run.text),
            _ => merged.push(run.clone()),
        }
    }
    merged
}

pub fn render_text(runs: &[TextRun]) -> String {
    merge_runs(runs).iter().map(render_run).collect()
}

fn render_run(run: &TextRun) -> String {
    let Style {
        bold,
        italic,
        code,
        strikethrough,
        link,
    } = &run.style;

    if !(*bold || *italic || *code || *strikethrough || link.is_some()) {
        return run.text.clone();
    }

    let trimmed_start = run.text.trim_start();
    let lead = &run.text[..run.text.len() - trimmed_start.len()];
    let core = trimmed_start.trim_end();
    let trail = &trimmed_start[core.len()..];
    if core.is_empty() {
        return run.text.clone();
    }

    // outermost first: link, bold, italic, strikethrough, code
    let mut inner = core.to_string();
    if *code {
        inner = if inner.contains('`') {
            format!("`` {} ``", inner)
        } else {
            format!("`{}`", inner)
        };
    }
    if *strikethrough {
        inner = format!("~~{}~~", inner);
    }
    if *italic {
        inner = format!("*{}*", inner);
    }
    if *bold {
        inner = format!("**{}**", inner);
    }
    if let Some(href) = link {
        inner = format!("[{}]({})", inner, href);
    }
    format!("{}{}{}", lead, inner, trail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(text: &str) -> TextRun {
        TextRun::plain(text)
    }

    fn styled(text: &str, f: impl FnOnce(&mut Style)) -> TextRun {
        let mut r = TextRun::plain(text);
        f(&mut r.style);
        r
    }

    fn para(text: &str) -> Block {
        Block::Paragraph {
            text: vec![run(text)],
            children: vec![],
        }
    }

    fn bullet(text: &str, children: Vec<Block>) -> Block {
        Block::BulletedItem {
            text: vec![run(text)],
            children,
        }
    }

    fn md(blocks: &[Block]) -> String {
        render_markdown(blocks, &RenderContext::default())
    }

    #[test]
    fn test_inline_styles_outermost_first() {
        let r = styled("word", |s| {
            s.bold = true;
            s.italic = true;
            s.link = Some("https://x.io".into());
        });
        assert_eq!(render_text(&[r]), "[***word***](https://x.io)");

        let c = styled("x", |s| {
            s.code = true;
            s.strikethrough = true;
        });
        assert_eq!(render_text(&[c]), "~~`x`~~");
    }

    #[test]
    fn test_inline_whitespace_outside_markers() {
        let r = styled(" bold ", |s| s.bold = true);
        assert_eq!(render_text(&[run("a"), r, run("b")]), "a **bold** b");
    }

    #[test]
    fn test_merge_adjacent_runs() {
        let a = styled("he", |s| s.bold = true);
        let b = styled("llo", |s| s.bold = true);
        let merged = merge_runs(&[a, b, run("!")]);
        assert_eq!(merged.len(), 2);
        assert_eq!(render_text(&merged), "**hello**!");
    }

    #[test]
    fn test_lists_nest_and_separate() {
        let blocks = vec![
            bullet("one", vec![bullet("inner", vec![])]),
            bullet("two", vec![]),
            para("after"),
        ];
        assert_eq!(md(&blocks), "- one\n  - inner\n- two\n\nafter\n");
    }

    #[test]
    fn test_numbered_items_count_within_run() {
        let n = |t: &str| Block::NumberedItem {
            text: vec![run(t)],
            children: vec![],
        };
        let blocks = vec![n("a"), n("b"), para("break"), n("c")];
        assert_eq!(md(&blocks), "1. a\n2. b\n\nbreak\n\n1. c\n");
    }

    #[test]
    fn test_numbered_children_align_with_content() {
        let n = |t: &str, children: Vec<Block>| Block::NumberedItem {
            text: vec![run(t)],
            children,
        };
        let mut blocks: Vec<Block> = (1..=9).map(|i| n(&format!("step {}", i), vec![])).collect();
        blocks[0] = n("first", vec![bullet("detail", vec![])]);
        blocks.push(n("tenth", vec![para("note")]));

        let out = md(&blocks);
        assert!(out.starts_with("1. first\n   - detail\n2. step 2\n"));
        assert!(out.ends_with("10. tenth\n    note\n"));
    }

    #[test]
    fn test_toggle_renders_details() {
        let blocks = vec![Block::Toggle {
            text: vec![run("More")],
            children: vec![para("hidden")],
        }];
        assert_eq!(
            md(&blocks),
            "<details>\n<summary>More</summary>\n\n  hidden\n\n</details>\n"
        );
    }

    #[test]
    fn test_table_pads_short_rows() {
        let cell = |t: &str| vec![run(t)];
        let blocks = vec![Block::Table {
            has_column_header: true,
            rows: vec![
                vec![cell("a"), cell("b"), cell("c")],
                vec![cell("1")],
                vec![cell("x|y"), cell("2"), cell("3"), cell("4")],
            ],
        }];
        assert_eq!(
            md(&blocks),
            "| a | b | c |\n| --- | --- | --- |\n| 1 |  |  |\n| x\\|y | 2 | 3 | 4 |\n"
        );
    }

    #[test]
    fn test_code_block_is_verbatim() {
        let blocks = vec![Block::Code {
            language: "python".into(),
            text: "def f():\n    return \"*not emphasis*\"".into(),
        }];
        assert_eq!(
            md(&blocks),
            "```python\ndef f():\n    return \"*not emphasis*\"\n```\n"
        );
    }

    #[test]
    fn test_code_fence_grows_past_backticks() {
        let blocks = vec![Block::Code {
            language: "md".into(),
            text: "```\nx\n```".into(),
        }];
        assert!(md(&blocks).starts_with("````md\n"));
    }

    #[test]
    fn test_unsupported_renders_placeholder() {
        let blocks = vec![
            para("before"),
            Block::Unsupported {
                kind: "synced_block".into(),
                id: "blk-9".into(),
            },
        ];
        assert_eq!(
            md(&blocks),
            "before\n\n<!-- unsupported block: synced_block (blk-9) -->\n"
        );
    }

    #[test]
    fn test_media_uses_local_path_when_resolved() {
        let source = MediaSource::new("https://s3/x/pic.png?sig=1");
        let blocks = vec![Block::Image {
            source: source.clone(),
            caption: vec![run("Pic")],
        }];
        let mut media = BTreeMap::new();
        media.insert(source.key.clone(), "images/abc.png".to_string());
        let ctx = RenderContext {
            media: Some(&media),
            ..Default::default()
        };
        assert_eq!(render_markdown(&blocks, &ctx), "![Pic](images/abc.png)\n");
        assert_eq!(md(&blocks), "![Pic](https://s3/x/pic.png?sig=1)\n");

        let stable = RenderContext {
            stable_media: true,
            ..Default::default()
        };
        assert_eq!(render_markdown(&blocks, &stable), "![Pic](https://s3/x/pic.png)\n");
    }

    #[test]
    fn test_rendering_is_deterministic_and_restartable() {
        let blocks = vec![
            Block::Heading {
                level: 1,
                text: vec![run("Title")],
                children: vec![],
            },
            bullet("a", vec![bullet("b", vec![])]),
            Block::Divider,
        ];
        let ctx = RenderContext::default();
        let first: Vec<String> = render_lines(&blocks, &ctx).collect();
        let second: Vec<String> = render_lines(&blocks, &ctx).collect();
        assert_eq!(first, second);
        assert_eq!(md(&blocks), md(&blocks));
    }

    #[test]
    fn test_deep_nesting_does_not_recurse() {
        let mut block = para("leaf");
        for i in 0..5_000 {
            block = Block::Toggle {
                text: vec![run(&format!("level {}", i))],
                children: vec![block],
            };
        }
        let blocks = vec![block];
        let ctx = RenderContext::default();
        let count = render_lines(&blocks, &ctx).count();
        assert!(count > 5_000);
    }

    #[test]
    fn test_page_snapshot() {
        let blocks = vec![
            Block::Heading {
                level: 2,
                text: vec![run("Getting started")],
                children: vec![],
            },
            Block::Paragraph {
                text: vec![
                    run("Read the "),
                    styled("guide", |s| s.link = Some("https://docs.example.com".into())),
                    run(" first."),
                ],
                children: vec![],
            },
            Block::Callout {
                icon: Some("💡".into()),
                text: vec![run("Ask in #help")],
                children: vec![],
            },
            Block::ToDo {
                text: vec![run("Install tools")],
                checked: true,
                children: vec![],
            },
            Block::ToDo {
                text: vec![run("Clone repo")],
                checked: false,
                children: vec![],
            },
            Block::Quote {
                text: vec![run("Ship small")],
                children: vec![],
            },
        ];
        insta::assert_snapshot!(md(&blocks), @r###"
        ## Getting started

        Read the [guide](https://docs.example.com) first.

        > 💡 Ask in #help

        - [x] Install tools
        - [ ] Clone repo

        > Ship small
        "###);
    }
}
