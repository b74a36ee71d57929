//! Text-list codec: `- <term> [[<name>]]` lines under a `## Related` heading

use crate::reference::RelationshipReference;
use crate::taxonomy::{self, RelationKind};
use crate::warning::{Warning, WarningKind};
use once_cell::sync::Lazy;
use regex::Regex;

pub const DEFAULT_HEADING: &str = "Related";

static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s{0,3}(#{1,6})\s+(.*?)\s*#*\s*$").expect("valid heading regex"));

static ITEM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[-*+]\s+(.*)$").expect("valid item regex"));

// the link runs to the last `]]`, so an alias may itself contain `]`
static ENTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\s*\[\[(.+?)\]\]\s*$").expect("valid list entry regex"));

/// Characters that end or split a wiki-link target
const LINK_BREAKERS: [char; 5] = ['[', ']', '|', '#', '^'];

/// One list line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub kind: RelationKind,
    /// Term as written, e.g. `mother`
    pub term: String,
    /// Always name form carrying the link target: a display name or a
    /// document path
    pub reference: RelationshipReference,
    /// Text after `|` in the link
    pub alias: Option<String>,
    /// Line number within the body (0-based)
    pub line: usize,
}

impl ListEntry {
    /// Link target as written, anchor dropped
    pub fn target(&self) -> &str {
        &self.reference.payload
    }

    /// What a reader sees: the alias when there is one
    pub fn label(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.reference.payload)
    }
}

/// Location of the related section within a body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpan {
    /// Heading line
    pub heading: usize,
    /// First line after the section (exclusive)
    pub end: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedList {
    pub entries: Vec<ListEntry>,
    pub warnings: Vec<Warning>,
    pub section: Option<SectionSpan>,
}

/// Locate the section whose heading text matches `heading`
pub fn find_section(body: &str, heading: &str) -> Option<SectionSpan> {
    let lines: Vec<&str> = body.split('\n').collect();
    let mut start: Option<(usize, usize)> = None;
    for (i, line) in lines.iter().enumerate() {
        let Some(caps) = HEADING_RE.captures(line) else {
            continue;
        };
        let level = caps[1].len();
        match start {
            None if caps[2].eq_ignore_ascii_case(heading) => start = Some((i, level)),
            Some((heading_line, heading_level)) if level <= heading_level => {
                return Some(SectionSpan {
                    heading: heading_line,
                    end: i,
                });
            }
            _ => {}
        }
    }
    start.map(|(heading, _)| SectionSpan {
        heading,
        end: lines.len(),
    })
}

/// Parse list entries from a document body using the default heading
pub fn parse(body: &str) -> ParsedList {
    parse_with_heading(body, DEFAULT_HEADING)
}

pub fn parse_with_heading(body: &str, heading: &str) -> ParsedList {
    let mut parsed = ParsedList {
        section: find_section(body, heading),
        ..Default::default()
    };
    let Some(section) = parsed.section else {
        return parsed;
    };

    for (i, line) in body
        .split('\n')
        .enumerate()
        .take(section.end)
        .skip(section.heading + 1)
    {
        let Some(item) = ITEM_RE.captures(line) else {
            continue;
        };
        let item = item[1].trim();
        let Some(caps) = ENTRY_RE.captures(item) else {
            parsed.warnings.push(Warning::new(
                WarningKind::MalformedEntry,
                format!("line {}: expected '- <kind> [[<name>]]', got '{}'", i + 1, item),
            ));
            continue;
        };

        let term = caps[1].trim();
        let (target, alias) = split_link(&caps[2]);
        if term.is_empty() || target.is_empty() || target.contains(['[', ']']) {
            parsed.warnings.push(Warning::new(
                WarningKind::MalformedEntry,
                format!("line {}: missing kind or name in '{}'", i + 1, item),
            ));
            continue;
        }
        let Some(kind) = taxonomy::normalize(term) else {
            parsed.warnings.push(Warning::new(
                WarningKind::UnknownKind,
                format!("line {}: unknown relationship kind '{}'", i + 1, term),
            ));
            continue;
        };

        parsed.entries.push(ListEntry {
            kind,
            term: term.to_string(),
            reference: RelationshipReference::name(target),
            alias,
            line: i,
        });
    }
    parsed
}

/// Split a wiki link into its target (anchor dropped) and alias
fn split_link(raw: &str) -> (String, Option<String>) {
    let (target, alias) = match raw.split_once('|') {
        Some((target, alias)) => (target, Some(alias.trim())),
        None => (raw, None),
    };
    let target = target.split('#').next().unwrap_or(target).trim();
    let alias = alias.filter(|a| !a.is_empty()).map(str::to_string);
    (target.to_string(), alias)
}

/// Whether `target` survives as the part of a link before `|`
pub fn is_link_target(target: &str) -> bool {
    !target.trim().is_empty()
        && target.trim() == target
        && !target.contains(LINK_BREAKERS)
        && !target.contains('\n')
}

/// Whether `name` can be linked bare, as `[[name]]`
///
/// A slash would make the link read as a path.
pub fn is_bare_link(name: &str) -> bool {
    is_link_target(name) && !name.contains('/')
}

pub fn render_line(term: &str, name: &str, link: Option<&str>) -> String {
    match link {
        Some(link) => format!("- {term} [[{link}|{name}]]"),
        None => format!("- {term} [[{name}]]"),
    }
}

/// A line to be rendered: kind plus the already-chosen display term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListLine {
    pub kind: RelationKind,
    pub term: String,
    /// Display name
    pub name: String,
    /// Explicit link target; `name` becomes the alias
    pub link: Option<String>,
}

impl ListLine {
    pub fn new(kind: RelationKind, term: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            term: term.into(),
            name: name.into(),
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn to_text(&self) -> String {
        render_line(&self.term, &self.name, self.link.as_deref())
    }
}

impl From<&ListEntry> for ListLine {
    fn from(entry: &ListEntry) -> Self {
        let line = Self::new(entry.kind, entry.term.clone(), entry.label());
        match entry.alias {
            Some(_) => line.with_link(entry.target()),
            None => line,
        }
    }
}

fn sort_lines(lines: &mut [ListLine]) {
    lines.sort_by(|a, b| {
        a.kind
            .key()
            .cmp(b.kind.key())
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.link.cmp(&b.link))
            .then_with(|| a.term.cmp(&b.term))
    });
}

/// Render lines in deterministic order (kind key, then name)
pub fn render(lines: &[ListLine]) -> String {
    let mut sorted = lines.to_vec();
    sort_lines(&mut sorted);
    sorted.iter().map(|line| line.to_text() + "\n").collect()
}

/// Append lines at the end of the related section, creating the section at
/// the end of the body when it does not exist. Existing lines are untouched.
pub fn append(body: &str, heading: &str, lines: &[ListLine]) -> String {
    if lines.is_empty() {
        return body.to_string();
    }
    let rendered = render(lines);
    let mut new_lines: Vec<&str> = rendered.trim_end_matches('\n').split('\n').collect();

    let Some(section) = find_section(body, heading) else {
        let mut out = body.to_string();
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        if !out.trim().is_empty() && !out.ends_with("\n\n") {
            out.push('\n');
        }
        out.push_str(&format!("## {heading}\n\n"));
        out.push_str(&rendered);
        return out;
    };

    let mut body_lines: Vec<&str> = body.split('\n').collect();
    let last_content = (section.heading + 1..section.end)
        .rev()
        .find(|&i| !body_lines[i].trim().is_empty());
    let insert_at = match last_content {
        Some(i) => i + 1,
        None => {
            // empty section: keep one blank line under the heading
            new_lines.insert(0, "");
            section.heading + 1
        }
    };
    let tail = body_lines.split_off(insert_at);
    body_lines.extend(new_lines);
    if tail.is_empty() {
        body_lines.push("");
    }
    body_lines.extend(tail);
    body_lines.join("\n")
}

/// Replace whole lines by body line number
pub fn replace_lines(body: &str, replacements: &[(usize, String)]) -> String {
    let mut lines: Vec<String> = body.split('\n').map(str::to_string).collect();
    for (line, text) in replacements {
        if let Some(slot) = lines.get_mut(*line) {
            *slot = text.clone();
        }
    }
    lines.join("\n")
}

/// Remove lines by body line number
pub fn remove_lines(body: &str, line_numbers: &[usize]) -> String {
    body.split('\n')
        .enumerate()
        .filter(|(i, _)| !line_numbers.contains(i))
        .map(|(_, line)| line)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "# Ann\n\nSome notes.\n\n## Related\n\n- mother [[Mum]]\n- friend [[People/Bob.md|Bobby]]\n- nonsense\n- nemesis [[Rex]]\n\n## Other\n- friend [[Not Counted]]\n";

    #[test]
    fn test_parse_section_entries() {
        let parsed = parse(BODY);
        assert_eq!(parsed.section, Some(SectionSpan { heading: 4, end: 11 }));
        let got: Vec<_> = parsed
            .entries
            .iter()
            .map(|e| (e.kind, e.term.as_str(), e.target(), e.label(), e.line))
            .collect();
        assert_eq!(
            got,
            vec![
                (RelationKind::Parent, "mother", "Mum", "Mum", 6),
                (RelationKind::Friend, "friend", "People/Bob.md", "Bobby", 7),
            ]
        );
        let kinds: Vec<_> = parsed.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(kinds, vec![WarningKind::MalformedEntry, WarningKind::UnknownKind]);
    }

    #[test]
    fn test_no_section_means_no_entries() {
        let parsed = parse("# Bob\n- friend [[Ann]]\n");
        assert!(parsed.section.is_none());
        assert!(parsed.entries.is_empty());
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_append_inside_existing_section() {
        let out = append(BODY, DEFAULT_HEADING, &[ListLine::new(RelationKind::Colleague, "colleague", "Zed")]);
        assert!(out.contains("- nemesis [[Rex]]\n- colleague [[Zed]]\n\n## Other\n"));
        // everything else untouched
        assert_eq!(out.replace("- colleague [[Zed]]\n", ""), BODY);
    }

    #[test]
    fn test_append_creates_section() {
        let out = append("# Bob\n\nNotes.\n", DEFAULT_HEADING, &[
            ListLine::new(RelationKind::Friend, "friend", "Yuri"),
            ListLine::new(RelationKind::Colleague, "colleague", "Ann"),
        ]);
        assert_eq!(
            out,
            "# Bob\n\nNotes.\n\n## Related\n\n- colleague [[Ann]]\n- friend [[Yuri]]\n"
        );
        let parsed = parse(&out);
        assert_eq!(parsed.entries.len(), 2);
    }

    #[test]
    fn test_append_to_empty_section_at_end() {
        let out = append("## Related\n", DEFAULT_HEADING, &[ListLine::new(RelationKind::Friend, "friend", "A")]);
        assert_eq!(out, "## Related\n\n- friend [[A]]\n");
    }

    #[test]
    fn test_render_round_trip_is_stable() {
        let body = "## Related\n- sister [[Zoe]]\n- father [[Al]]\n- friend [[Bo]]\n";
        let lines: Vec<ListLine> = parse(body).entries.iter().map(ListLine::from).collect();
        let once = render(&lines);
        assert_eq!(once, "- friend [[Bo]]\n- father [[Al]]\n- sister [[Zoe]]\n");

        let again: Vec<ListLine> = parse(&format!("## Related\n{once}"))
            .entries
            .iter()
            .map(ListLine::from)
            .collect();
        assert_eq!(render(&again), once);
    }

    #[test]
    fn test_awkward_names_read_back_through_aliases() {
        let names = ["AC/DC", "C#", "Simon | Garfunkel", "Rock]Roll", "x[[y", "Trailing]"];
        let lines: Vec<ListLine> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                assert!(!is_bare_link(name), "{name}");
                ListLine::new(RelationKind::Friend, "friend", *name).with_link(format!("Band {i}.md"))
            })
            .collect();
        let body = format!("## Related\n\n{}", render(&lines));

        let parsed = parse(&body);
        assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);
        let mut got: Vec<(String, String)> = parsed
            .entries
            .iter()
            .map(|e| (e.target().to_string(), e.label().to_string()))
            .collect();
        got.sort();
        let mut want: Vec<(String, String)> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (format!("Band {i}.md"), name.to_string()))
            .collect();
        want.sort();
        assert_eq!(got, want);

        // and render identically a second time
        let again: Vec<ListLine> = parsed.entries.iter().map(ListLine::from).collect();
        assert_eq!(format!("## Related\n\n{}", render(&again)), body);
    }

    #[test]
    fn test_two_links_on_one_line_are_malformed() {
        let parsed = parse("## Related\n- friend [[Ann]] and [[Bob]]\n");
        assert!(parsed.entries.is_empty());
        assert_eq!(parsed.warnings[0].kind, WarningKind::MalformedEntry);
    }

    #[test]
    fn test_link_target_rules() {
        assert!(is_bare_link("Ann Lee"));
        assert!(!is_bare_link("AC/DC"));
        assert!(is_link_target("People/AC-DC.md"));
        assert!(!is_link_target("a|b"));
        assert!(!is_link_target(" Ann"));
        assert!(!is_link_target(""));
    }

    #[test]
    fn test_replace_and_remove_lines() {
        let body = "## Related\n- parent [[A]]\n- friend [[B]]\n";
        assert_eq!(
            replace_lines(body, &[(1, "- mother [[A]]".to_string())]),
            "## Related\n- mother [[A]]\n- friend [[B]]\n"
        );
        assert_eq!(remove_lines(body, &[2]), "## Related\n- parent [[A]]\n");
    }
}
