use std::mem;
use std::sync::LazyLock;

use regex::Regex;

static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap_or_else(|e| panic!("bad pattern: {e}")));
static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//[^\n]*").unwrap_or_else(|e| panic!("bad pattern: {e}")));
static CONTINUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\\r?\n").unwrap_or_else(|e| panic!("bad pattern: {e}")));
static DIRECTIVE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#\s*").unwrap_or_else(|e| panic!("bad pattern: {e}")));

/// Normalizes raw input into a stream of logical lines
///
/// Comments are stripped, line continuations spliced, and every line trimmed.
/// A line starting with `#` is emitted on its own (with any whitespace
/// between `#` and the keyword collapsed); consecutive non-directive lines
/// are coalesced into a single newline-joined emission so macro expansion
/// sees maximal context.
///
/// The stream is finite, forward-only and not restartable. Line numbering
/// downstream reflects the post-splice text, not the original source.
pub(crate) struct Screener {
    lines: Vec<String>,
    pos: usize,
    batch: Vec<String>,
    queued: Option<String>,
}

impl Screener {
    pub(crate) fn new(input: &str) -> Self {
        let text = BLOCK_COMMENT.replace_all(input, "");
        let text = LINE_COMMENT.replace_all(&text, "");
        let mut text = text.into_owned();
        // splice to fixpoint so stacked continuations collapse fully
        while CONTINUATION.is_match(&text) {
            text = CONTINUATION.replace_all(&text, " ").into_owned();
        }
        let lines = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        Screener { lines, pos: 0, batch: Vec::new(), queued: None }
    }

    fn flush_batch(&mut self) -> String {
        mem::take(&mut self.batch).join("\n")
    }
}

impl Iterator for Screener {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if let Some(directive) = self.queued.take() {
            return Some(directive);
        }
        while self.pos < self.lines.len() {
            let line = self.lines[self.pos].clone();
            self.pos += 1;
            if line.starts_with('#') {
                let directive = DIRECTIVE_PREFIX.replace(&line, "#").into_owned();
                if self.batch.is_empty() {
                    return Some(directive);
                }
                self.queued = Some(directive);
                return Some(self.flush_batch());
            }
            self.batch.push(line);
        }
        if self.batch.is_empty() { None } else { Some(self.flush_batch()) }
    }
}
