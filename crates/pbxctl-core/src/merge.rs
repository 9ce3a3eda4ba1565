// ── Section merger ──
//
// Parses a config file into section spans first, then applies every edit
// in a single pass over those spans, so touching several sections never
// works with stale offsets. Bytes outside the touched spans are copied
// through unchanged.

use std::collections::{HashMap, HashSet};

use crate::render::{MANAGED_MARKER, RenderedSection};

/// Byte offsets of one bracketed section.
///
/// `start..content_end` is the header plus body up to its last non-blank
/// line; `content_end..end` is the run of blank lines before the next
/// header (or EOF), which replacement keeps in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSpan {
    pub name: String,
    pub start: usize,
    pub body_start: usize,
    pub content_end: usize,
    pub end: usize,
    /// Kind named by a `; managed-by: pbxctl <kind>` line, if present.
    pub owner: Option<String>,
}

/// A change to one named section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionEdit {
    /// Replace the section, or append it when absent.
    Upsert(RenderedSection),
    /// Delete the section if present.
    Remove(String),
}

impl SectionEdit {
    fn name(&self) -> &str {
        match self {
            Self::Upsert(section) => &section.name,
            Self::Remove(name) => name,
        }
    }
}

/// Section name if `line` is a header: first non-blank char `[`, closed
/// by a later `]`.
fn header_name(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix('[')?;
    let close = rest.find(']')?;
    Some(rest[..close].trim())
}

fn owner_of(body: &str) -> Option<String> {
    body.lines().find_map(|line| {
        line.trim()
            .strip_prefix(MANAGED_MARKER)
            .map(|kind| kind.trim().to_owned())
            .filter(|kind| !kind.is_empty())
    })
}

struct OpenSpan<'a> {
    name: &'a str,
    start: usize,
    body_start: usize,
    content_end: usize,
}

impl OpenSpan<'_> {
    fn close(self, text: &str, end: usize) -> SectionSpan {
        SectionSpan {
            name: self.name.to_owned(),
            start: self.start,
            body_start: self.body_start,
            content_end: self.content_end,
            end,
            owner: owner_of(&text[self.body_start..self.content_end]),
        }
    }
}

/// Split `text` into section spans, in file order. Text before the first
/// header (the preamble) belongs to no span.
pub fn parse(text: &str) -> Vec<SectionSpan> {
    let mut spans = Vec::new();
    let mut open: Option<OpenSpan<'_>> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_end = offset + line.len();
        if let Some(name) = header_name(line) {
            if let Some(prev) = open.take() {
                spans.push(prev.close(text, offset));
            }
            open = Some(OpenSpan {
                name,
                start: offset,
                body_start: line_end,
                content_end: line_end,
            });
        } else if let Some(o) = open.as_mut() {
            if !line.trim().is_empty() {
                o.content_end = line_end;
            }
        }
        offset = line_end;
    }
    if let Some(last) = open {
        spans.push(last.close(text, text.len()));
    }
    spans
}

/// Names of sections carrying the managed marker for `owner`.
pub fn managed_sections(text: &str, owner: &str) -> Vec<String> {
    parse(text)
        .into_iter()
        .filter(|span| span.owner.as_deref() == Some(owner))
        .map(|span| span.name)
        .collect()
}

/// Apply `edits` to `text`.
///
/// Only the first occurrence of a name is edited; later duplicates are
/// left as they are. Upserts with no matching section are appended in
/// edit order, separated from existing content by one blank line. When
/// several edits name the same section the last one wins.
pub fn merge(text: &str, edits: &[SectionEdit]) -> String {
    let mut by_name: HashMap<&str, &SectionEdit> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for edit in edits {
        if by_name.insert(edit.name(), edit).is_none() {
            order.push(edit.name());
        }
    }

    let spans = parse(text);
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    let mut seen: HashSet<&str> = HashSet::new();

    for span in &spans {
        let Some(edit) = by_name.get(span.name.as_str()) else {
            continue;
        };
        if !seen.insert(edit.name()) {
            continue;
        }
        out.push_str(&text[cursor..span.start]);
        match edit {
            SectionEdit::Upsert(section) => {
                out.push_str(&section.text);
                cursor = span.content_end;
            }
            SectionEdit::Remove(_) => cursor = span.end,
        }
    }
    out.push_str(&text[cursor..]);

    for name in order {
        if seen.contains(name) {
            continue;
        }
        if let Some(SectionEdit::Upsert(section)) = by_name.get(name) {
            append(&mut out, &section.text);
        }
    }
    out
}

fn append(out: &mut String, section: &str) {
    if !out.is_empty() {
        if !out.ends_with('\n') {
            out.push('\n');
        }
        if !out.ends_with("\n\n") {
            out.push('\n');
        }
    }
    out.push_str(section);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn section(name: &str, body: &str) -> RenderedSection {
        RenderedSection {
            name: name.into(),
            text: format!("[{name}]\n{body}"),
        }
    }

    const ABC: &str = "; preamble\n\n[A]\na=1\n\n[B]\nb=1\n\n[C](!)\nc=1\n";

    #[test]
    fn parse_finds_spans_with_offsets() {
        let spans = parse(ABC);
        let names: Vec<&str> = spans.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);

        let b = &spans[1];
        assert_eq!(&ABC[b.start..b.content_end], "[B]\nb=1\n");
        assert_eq!(&ABC[b.content_end..b.end], "\n");
        assert_eq!(&ABC[b.body_start..b.content_end], "b=1\n");
        assert_eq!(spans[2].end, ABC.len());
    }

    #[test]
    fn replace_preserves_neighbours() {
        let merged = merge(ABC, &[SectionEdit::Upsert(section("B", "b=2\nbb=3\n"))]);
        assert_eq!(
            merged,
            "; preamble\n\n[A]\na=1\n\n[B]\nb=2\nbb=3\n\n[C](!)\nc=1\n"
        );
    }

    #[test]
    fn absent_header_is_appended() {
        let merged = merge(ABC, &[SectionEdit::Upsert(section("D", "d=1\n"))]);
        assert!(merged.starts_with(ABC));
        assert!(merged.ends_with("c=1\n\n[D]\nd=1\n"));
    }

    #[test]
    fn append_adds_missing_newline() {
        let merged = merge("[A]\na=1", &[SectionEdit::Upsert(section("B", "b=1\n"))]);
        assert_eq!(merged, "[A]\na=1\n\n[B]\nb=1\n");
    }

    #[test]
    fn empty_file_gets_section_only() {
        let merged = merge("", &[SectionEdit::Upsert(section("A", "a=1\n"))]);
        assert_eq!(merged, "[A]\na=1\n");
    }

    #[test]
    fn header_at_start_and_end() {
        let text = "[A]\na=1\n[Z]\nz=1";
        let merged = merge(
            text,
            &[
                SectionEdit::Upsert(section("A", "a=2\n")),
                SectionEdit::Upsert(section("Z", "z=2\n")),
            ],
        );
        assert_eq!(merged, "[A]\na=2\n[Z]\nz=2\n");
    }

    #[test]
    fn remove_drops_whole_span() {
        let merged = merge(ABC, &[SectionEdit::Remove("B".into())]);
        assert_eq!(merged, "; preamble\n\n[A]\na=1\n\n[C](!)\nc=1\n");

        let untouched = merge(ABC, &[SectionEdit::Remove("missing".into())]);
        assert_eq!(untouched, ABC);
    }

    #[test]
    fn only_first_duplicate_is_edited() {
        let text = "[A]\nold=1\n\n[A]\nhand=edited\n";
        let merged = merge(text, &[SectionEdit::Upsert(section("A", "new=1\n"))]);
        assert_eq!(merged, "[A]\nnew=1\n\n[A]\nhand=edited\n");
    }

    #[test]
    fn merge_is_idempotent() {
        let edits = [
            SectionEdit::Upsert(section("B", "b=9\n")),
            SectionEdit::Upsert(section("E", "e=1\n")),
            SectionEdit::Remove("A".into()),
        ];
        let once = merge(ABC, &edits);
        let twice = merge(&once, &edits);
        assert_eq!(once, twice);
    }

    #[test]
    fn indented_header_and_bracket_in_value() {
        let text = "  [A]\nkey=[not a header\nallow=all\n";
        let spans = parse(text);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "A");
        assert_eq!(spans[0].end, text.len());
    }

    #[test]
    fn managed_marker_is_detected() {
        let text = "[general]\nx=1\n\n[101](template-internal)\n; managed-by: pbxctl extension\nsecret=a\n\n[T1](template-trunk)\n; managed-by: pbxctl trunk\n";
        assert_eq!(managed_sections(text, "extension"), vec!["101"]);
        assert_eq!(managed_sections(text, "trunk"), vec!["T1"]);
        assert!(managed_sections(text, "queue").is_empty());
    }
}
