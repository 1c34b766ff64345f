//! Table-image placement.
//!
//! Splices one `![Table N](path)` reference per table image into converted
//! Markdown. Tables are tried against three tiers in order: a context marker
//! (text known to follow the table), a literal pipe-table block, and finally
//! a trailer section appended at the end of the document.
//!
//! Every position is computed against the original lines and the insertions
//! are merged in one pass at the end, so placing one table never shifts the
//! anchor of another.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// 0-based position in the pipeline's document order.
    pub index: usize,
    /// Link target of the saved table image, used verbatim.
    #[serde(default)]
    pub image: Option<String>,
    /// Snippet of the text that follows the table in the source document.
    #[serde(default)]
    pub context_marker: Option<String>,
}

impl Table {
    pub fn new(index: usize, image: impl Into<String>) -> Self {
        Self {
            index,
            image: Some(image.into()),
            context_marker: None,
        }
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.context_marker = Some(marker.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementTier {
    ContextAnchor,
    TableBlock,
    Trailer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertionRecord {
    pub table_index: usize,
    pub tier: PlacementTier,
    /// 0-based line of the image reference in the output text.
    pub line: usize,
    /// 0-based line of the original document the reference was placed
    /// before. `None` for trailer entries.
    pub anchor_line: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementOptions {
    pub alt_label: String,
    pub trailer_heading: String,
}

impl Default for PlacementOptions {
    fn default() -> Self {
        Self {
            alt_label: "Table".into(),
            trailer_heading: "## Table Images".into(),
        }
    }
}

impl From<&crate::config::Placement> for PlacementOptions {
    fn from(cfg: &crate::config::Placement) -> Self {
        Self {
            alt_label: cfg.alt_label.clone(),
            trailer_heading: cfg.trailer_heading.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Placement {
    pub markdown: String,
    pub records: Vec<InsertionRecord>,
    pub anchored: usize,
    pub block_placed: usize,
    pub appended: usize,
    /// Tables that carried no image and were ignored.
    pub skipped: usize,
}

impl Placement {
    pub fn summary(&self) -> PlacementSummary {
        PlacementSummary {
            placed: self.anchored + self.block_placed,
            anchored: self.anchored,
            block_placed: self.block_placed,
            appended: self.appended,
            skipped: self.skipped,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementSummary {
    /// Tables placed inline (context anchor or table block).
    pub placed: usize,
    pub anchored: usize,
    pub block_placed: usize,
    pub appended: usize,
    pub skipped: usize,
}

/// Where a pending image goes relative to the original lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Slot {
    /// Emitted before original line `n`; `lines.len()` means end of document.
    Before(usize),
    Trailer,
}

#[derive(Debug)]
struct Pending<'a> {
    slot: Slot,
    tier: PlacementTier,
    table: &'a Table,
    image: &'a str,
}

pub fn place(document: &str, tables: &[Table], opts: &PlacementOptions) -> Placement {
    let mut candidates: Vec<(&Table, &str)> = tables
        .iter()
        .filter_map(|t| t.image.as_deref().map(|img| (t, img)))
        .collect();
    let skipped = tables.len() - candidates.len();

    if candidates.is_empty() {
        return Placement {
            markdown: document.to_string(),
            records: Vec::new(),
            anchored: 0,
            block_placed: 0,
            appended: 0,
            skipped,
        };
    }

    // Stable: equal indices keep the caller's order.
    candidates.sort_by_key(|(t, _)| t.index);

    // CRLF input keeps CRLF, inserted lines included.
    let eol = if document.contains("\r\n") { "\r\n" } else { "\n" };
    let (body, trailing_newline) = match document.strip_suffix('\n') {
        Some(b) => (b, true),
        None => (document, false),
    };
    let raw: Vec<&str> = if body.is_empty() && !trailing_newline {
        Vec::new()
    } else {
        body.split('\n').collect()
    };
    let line_starts = line_offsets(&raw);
    let lines: Vec<&str> = if eol == "\r\n" {
        raw.iter().map(|l| l.strip_suffix('\r').unwrap_or(*l)).collect()
    } else {
        raw
    };

    let blocks = table_blocks(&lines);
    let mut placed = vec![false; candidates.len()];
    let mut pending: Vec<Pending<'_>> = Vec::with_capacity(candidates.len());

    // Tier 1: context anchors.
    let mut anchor_lines = BTreeSet::new();
    let mut cursor = 0usize;
    for (i, &(table, image)) in candidates.iter().enumerate() {
        let Some(marker) = table.context_marker.as_deref() else {
            continue;
        };
        if marker.trim().is_empty() || cursor >= body.len() {
            continue;
        }
        let Some(found) = body[cursor..].find(marker) else {
            debug!(table = table.index, marker, "context marker not found");
            continue;
        };
        let mut line = line_of(&line_starts, cursor + found);
        let mut resume = line + 1;
        // Never split a pipe table: a hit inside one anchors before it.
        if let Some(b) = blocks.iter().find(|b| b.start <= line && line < b.end) {
            line = b.start;
            resume = b.end;
        }
        anchor_lines.insert(line);
        cursor = line_starts.get(resume).copied().unwrap_or(body.len());
        placed[i] = true;
        pending.push(Pending {
            slot: Slot::Before(line),
            tier: PlacementTier::ContextAnchor,
            table,
            image,
        });
    }

    // Tier 2: literal pipe-table blocks. A block that already holds an anchor,
    // or whose following text was used as one, has its image. An anchor on
    // the next block's first line belongs to that block.
    let mut next = 0usize;
    for block in &blocks {
        let follow = (block.end..lines.len())
            .find(|&n| !lines[n].trim().is_empty())
            .unwrap_or(lines.len());
        let holds_anchor = anchor_lines.range(block.start..block.end).next().is_some();
        let followed_by_anchor = anchor_lines.contains(&follow)
            && !blocks.iter().any(|b| b.start == follow);
        if holds_anchor || followed_by_anchor {
            debug!(start = block.start, "table block already claimed by an anchor");
            continue;
        }
        while next < candidates.len() && placed[next] {
            next += 1;
        }
        let Some(&(table, image)) = candidates.get(next) else {
            break;
        };
        placed[next] = true;
        pending.push(Pending {
            slot: Slot::Before(block.end),
            tier: PlacementTier::TableBlock,
            table,
            image,
        });
    }

    // Tier 3: trailer, in index order.
    for (i, &(table, image)) in candidates.iter().enumerate() {
        if !placed[i] {
            pending.push(Pending {
                slot: Slot::Trailer,
                tier: PlacementTier::Trailer,
                table,
                image,
            });
        }
    }

    pending.sort_by_key(|p| (p.slot, p.table.index));
    let mut placement = merge(&lines, pending, opts, eol);
    if trailing_newline {
        placement.markdown.push_str(eol);
    }
    placement.skipped = skipped;

    for r in &placement.records {
        debug!(table = r.table_index, tier = ?r.tier, line = r.line, "table image placed");
    }
    placement
}

fn merge(lines: &[&str], pending: Vec<Pending<'_>>, opts: &PlacementOptions, eol: &str) -> Placement {
    let mut out: Vec<String> = Vec::with_capacity(lines.len() + pending.len() * 3 + 2);
    let mut records = Vec::with_capacity(pending.len());
    let (mut anchored, mut block_placed, mut appended) = (0, 0, 0);
    let mut need_blank = false;
    let mut trailer_open = false;
    let mut queue = pending.into_iter().peekable();

    let mut emit_image = |out: &mut Vec<String>, p: &Pending<'_>| {
        if out.last().is_some_and(|l| !l.trim().is_empty()) {
            out.push(String::new());
        }
        records.push(InsertionRecord {
            table_index: p.table.index,
            tier: p.tier,
            line: out.len(),
            anchor_line: match p.slot {
                Slot::Before(n) => Some(n),
                Slot::Trailer => None,
            },
        });
        out.push(image_ref(opts, p.table.index, p.image));
    };

    for n in 0..=lines.len() {
        while let Some(p) = queue.next_if(|p| p.slot == Slot::Before(n)) {
            emit_image(&mut out, &p);
            match p.tier {
                PlacementTier::ContextAnchor => anchored += 1,
                _ => block_placed += 1,
            }
            need_blank = true;
        }
        if let Some(line) = lines.get(n) {
            if need_blank && !line.trim().is_empty() {
                out.push(String::new());
            }
            need_blank = false;
            out.push((*line).to_string());
        }
    }

    for p in queue {
        if !trailer_open {
            if out.last().is_some_and(|l| !l.trim().is_empty()) {
                out.push(String::new());
            }
            out.push(opts.trailer_heading.clone());
            trailer_open = true;
        }
        emit_image(&mut out, &p);
        appended += 1;
    }

    Placement {
        markdown: out.join(eol),
        records,
        anchored,
        block_placed,
        appended,
        skipped: 0,
    }
}

pub fn image_ref(opts: &PlacementOptions, index: usize, target: &str) -> String {
    format!("![{} {}]({})", opts.alt_label, index + 1, target)
}

/// Line range `[start, end)` of a contiguous pipe-table block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableBlock {
    pub start: usize,
    pub end: usize,
}

pub fn table_blocks(lines: &[&str]) -> Vec<TableBlock> {
    let mut blocks = Vec::new();
    let mut start = None;
    for (n, line) in lines.iter().enumerate() {
        let is_row = line.trim_start().starts_with('|');
        match (is_row, start) {
            (true, None) => start = Some(n),
            (false, Some(s)) => {
                blocks.push(TableBlock { start: s, end: n });
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        blocks.push(TableBlock {
            start: s,
            end: lines.len(),
        });
    }
    blocks
}

fn line_offsets(lines: &[&str]) -> Vec<usize> {
    let mut starts = Vec::with_capacity(lines.len());
    let mut off = 0;
    for l in lines {
        starts.push(off);
        off += l.len() + 1;
    }
    starts
}

fn line_of(starts: &[usize], offset: usize) -> usize {
    match starts.binary_search(&offset) {
        Ok(n) => n,
        Err(n) => n.saturating_sub(1),
    }
}
