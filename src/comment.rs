//! Comment detection and block aggregation.
//!
//! Comments are recognised line by line with a single pattern: a run of two or
//! more `/` or one or more `#`, optional whitespace, then the payload. The
//! pattern knows nothing about string literals, so text such as `http://host`
//! is reported as a comment. That false-positive class is accepted.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(/{2,}|#+)\s*(.*)").expect("comment pattern is valid")
});

/// A line recognised as a comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentMatch {
    /// Character offset of the comment marker within the line
    pub lead_column: usize,
    /// Comment text with marker and following whitespace removed
    pub payload: String,
}

/// Zero-based line/character span of a comment block. `end_column` is the
/// character length of the last line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CommentRange {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl CommentRange {
    /// Range covering the whole of a single line
    pub fn line(line: usize, length: usize) -> Self {
        Self {
            start_line: line,
            start_column: 0,
            end_line: line,
            end_column: length,
        }
    }
}

/// Contiguous run of same-column comment lines, translated as one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentBlock {
    pub text: String,
    pub range: CommentRange,
}

/// Classify a single line. Only the first occurrence of the pattern counts.
pub fn match_line(line: &str) -> Option<CommentMatch> {
    let captures = COMMENT.captures(line)?;
    let marker = captures.get(0)?;

    // `.` stops at `\n` but not at `\r`, so CRLF input leaves one behind
    let payload = captures
        .get(2)
        .map_or("", |m| m.as_str())
        .trim_end_matches('\r');

    Some(CommentMatch {
        lead_column: line[..marker.start()].chars().count(),
        payload: payload.to_string(),
    })
}

struct OpenBlock {
    start_line: usize,
    start_column: usize,
    end_line: usize,
    end_column: usize,
    payloads: Vec<String>,
}

impl OpenBlock {
    fn open(line: usize, length: usize, found: CommentMatch) -> Self {
        Self {
            start_line: line,
            start_column: found.lead_column,
            end_line: line,
            end_column: length,
            payloads: vec![found.payload],
        }
    }

    fn continues_with(&self, line: usize, found: &CommentMatch) -> bool {
        found.lead_column == self.start_column && line == self.end_line + 1
    }

    fn close(self) -> CommentBlock {
        CommentBlock {
            text: self.payloads.join("\n"),
            range: CommentRange {
                start_line: self.start_line,
                start_column: self.start_column,
                end_line: self.end_line,
                end_column: self.end_column,
            },
        }
    }
}

/// Split a document into comment blocks, in order of their first line.
///
/// Lines that are not comments are skipped without closing the open block,
/// but because a block only grows by the line directly after its last
/// comment line, any gap still starts a new block.
pub fn aggregate(document: &str) -> Vec<CommentBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<OpenBlock> = None;

    for (index, line) in document.split('\n').enumerate() {
        let Some(found) = match_line(line) else {
            continue;
        };
        let length = line.chars().count();

        current = Some(match current.take() {
            Some(mut block) if block.continues_with(index, &found) => {
                block.end_line = index;
                block.end_column = length;
                block.payloads.push(found.payload);
                block
            }
            Some(block) => {
                blocks.push(block.close());
                OpenBlock::open(index, length, found)
            }
            None => OpenBlock::open(index, length, found),
        });
    }

    if let Some(block) = current {
        blocks.push(block.close());
    }

    blocks
}
