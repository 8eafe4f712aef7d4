//! Structural segmentation of raw text into candidate step spans.

use tracing::{debug, warn};

use crate::chain::SourceSpan;
use crate::config::{ParserConfig, SegmentationStrategy};

/// Splits text into ordered, non-overlapping, trimmed spans.
#[derive(Debug, Clone)]
pub struct Segmenter {
    strategy: SegmentationStrategy,
    min_step_length: usize,
    max_steps: usize,
}

impl Segmenter {
    /// Create a new segmenter
    pub fn new(config: &ParserConfig) -> Self {
        Self {
            strategy: config.segmentation_strategy,
            min_step_length: config.min_step_length,
            max_steps: config.max_steps,
        }
    }

    /// Split `text` into candidate spans.
    ///
    /// With [`SegmentationStrategy::Auto`] enumerations win, then sentences,
    /// then newline-delimited paragraphs; the first strategy producing more
    /// than one unit is used.
    pub fn segment(&self, text: &str) -> Vec<SourceSpan> {
        let (strategy, spans) = match self.strategy {
            SegmentationStrategy::Auto => auto_spans(text),
            SegmentationStrategy::Enumerated => {
                (SegmentationStrategy::Enumerated, enumerated_spans(text))
            }
            SegmentationStrategy::Sentence => (SegmentationStrategy::Sentence, sentence_spans(text)),
            SegmentationStrategy::Paragraph => {
                (SegmentationStrategy::Paragraph, paragraph_spans(text))
            }
        };

        let found = spans.len();
        let mut spans: Vec<SourceSpan> = spans
            .into_iter()
            .filter(|span| text[span.start..span.end].chars().count() >= self.min_step_length)
            .collect();

        if spans.len() > self.max_steps {
            warn!(
                spans = spans.len(),
                max_steps = self.max_steps,
                "Segment count exceeds max_steps, discarding trailing spans"
            );
            spans.truncate(self.max_steps);
        }

        debug!(
            strategy = %strategy,
            found,
            kept = spans.len(),
            "Text segmented"
        );
        spans
    }
}

fn auto_spans(text: &str) -> (SegmentationStrategy, Vec<SourceSpan>) {
    let enumerated = enumerated_spans(text);
    if enumerated.len() > 1 {
        return (SegmentationStrategy::Enumerated, enumerated);
    }
    let sentences = sentence_spans(text);
    if sentences.len() > 1 {
        return (SegmentationStrategy::Sentence, sentences);
    }
    let paragraphs = paragraph_spans(text);
    if paragraphs.len() > 1 {
        return (SegmentationStrategy::Paragraph, paragraphs);
    }
    (SegmentationStrategy::Sentence, sentences)
}

/// Trim whitespace from `text[start..end]`, returning `None` when nothing
/// is left.
fn trim_range(text: &str, start: usize, end: usize) -> Option<SourceSpan> {
    let slice = &text[start..end];
    let leading = slice.len() - slice.trim_start().len();
    let trailing = slice.len() - slice.trim_end().len();
    if leading == slice.len() {
        return None;
    }
    Some(SourceSpan::new(start + leading, end - trailing))
}

/// Lines of `text` with their byte offsets, newline included.
fn lines_with_offsets(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.split_inclusive('\n').scan(0, |offset, line| {
        let start = *offset;
        *offset += line.len();
        Some((start, line))
    })
}

/// Byte length of a list marker at the start of `line`, including the
/// indentation before it and the whitespace after it. A marker may end
/// its line, with the item text on the lines below.
///
/// Recognized markers: `1.` `12)` `a.` `B)` `-` `*` `•`.
fn list_marker_len(line: &str) -> Option<usize> {
    let body = line.trim_start_matches(&[' ', '\t'][..]);
    let indent = line.len() - body.len();

    let digits = body.chars().take_while(|c| c.is_ascii_digit()).count();
    let marker = if (1..=3).contains(&digits) {
        let next = body[digits..].chars().next()?;
        if next == '.' || next == ')' {
            digits + 1
        } else {
            return None;
        }
    } else if digits == 0 {
        let mut chars = body.chars();
        let first = chars.next()?;
        if matches!(first, '-' | '*' | '•') {
            first.len_utf8()
        } else if first.is_ascii_alphabetic() && matches!(chars.next(), Some('.') | Some(')')) {
            2
        } else {
            return None;
        }
    } else {
        return None;
    };

    let rest = &body[marker..];
    let after = rest.trim_start_matches(&[' ', '\t'][..]);
    let spacing = rest.len() - after.len();
    let line_ends = after.is_empty() || after.starts_with('\n') || after.starts_with("\r\n");
    if spacing == 0 && !line_ends {
        return None;
    }
    Some(indent + marker + spacing)
}

/// List items; text before the first marker is its own span. Returns no
/// spans when the text contains no list marker.
fn enumerated_spans(text: &str) -> Vec<SourceSpan> {
    let mut item_starts = Vec::new();
    for (offset, line) in lines_with_offsets(text) {
        if let Some(marker_len) = list_marker_len(line) {
            item_starts.push((offset, offset + marker_len));
        }
    }
    if item_starts.is_empty() {
        return Vec::new();
    }

    let mut spans = Vec::with_capacity(item_starts.len() + 1);
    if let Some(span) = trim_range(text, 0, item_starts[0].0) {
        spans.push(span);
    }
    for (i, (_, content_start)) in item_starts.iter().enumerate() {
        let end = item_starts
            .get(i + 1)
            .map(|(line_start, _)| *line_start)
            .unwrap_or(text.len());
        if let Some(span) = trim_range(text, *content_start, end) {
            spans.push(span);
        }
    }
    spans
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn is_closing(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}')
}

/// Sentences ending in `.`, `!` or `?` (runs allowed, closing quotes kept)
/// followed by whitespace or the end of text.
fn sentence_spans(text: &str) -> Vec<SourceSpan> {
    let mut spans = Vec::new();
    let mut sentence_start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !is_terminal(c) {
            continue;
        }
        while let Some(&(_, next)) = chars.peek() {
            if is_terminal(next) || is_closing(next) {
                chars.next();
            } else {
                break;
            }
        }
        let boundary = match chars.peek() {
            Some(&(i, next)) if next.is_whitespace() => i,
            None => text.len(),
            Some(_) => continue,
        };
        if let Some(span) = trim_range(text, sentence_start, boundary) {
            spans.push(span);
        }
        sentence_start = boundary;
    }

    if sentence_start < text.len() {
        if let Some(span) = trim_range(text, sentence_start, text.len()) {
            spans.push(span);
        }
    }
    spans
}

/// Non-blank lines.
fn paragraph_spans(text: &str) -> Vec<SourceSpan> {
    lines_with_offsets(text)
        .filter_map(|(offset, line)| trim_range(text, offset, offset + line.len()))
        .collect()
}
