//! Contact documents: a flat key/value front block plus a free-form body
//!
//! Untouched front-block lines are re-emitted byte-for-byte, so editing one
//! field never reformats the rest of the block.

use crate::contact::{ContactId, ContactNode, Gender};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

const DELIMITER: &str = "---";

pub const UID_KEY: &str = "UID";
pub const NAME_KEY: &str = "FN";
pub const GENDER_KEY: &str = "GENDER";
pub const REVISION_KEY: &str = "REV";

/// `REV` timestamp format
pub const REVISION_FORMAT: &str = "%Y%m%dT%H%M%SZ";

static FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z0-9_.\-]+(?:\[[^\]]*\])?)\s*:\s*(.*?)\s*$").expect("valid field regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
enum FrontLine {
    Field {
        key: String,
        value: String,
        /// Original text, dropped once the value is edited
        raw: Option<String>,
    },
    Raw(String),
}

/// The structured key/value block at the top of a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontBlock {
    lines: Vec<FrontLine>,
}

impl FrontBlock {
    fn parse(text: &str) -> Self {
        let lines = text
            .lines()
            .map(|line| match FIELD_RE.captures(line) {
                Some(caps) => FrontLine::Field {
                    key: caps[1].to_string(),
                    value: decode_value(&caps[2]),
                    raw: Some(line.to_string()),
                },
                None => FrontLine::Raw(line.to_string()),
            })
            .collect();
        Self { lines }
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                FrontLine::Field { raw: Some(raw), .. } => out.push_str(raw),
                FrontLine::Field { key, value, raw: None } => out.push_str(&format_field(key, value)),
                FrontLine::Raw(raw) => out.push_str(raw),
            }
            out.push('\n');
        }
        out
    }

    /// Fields in document order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.lines.iter().filter_map(|line| match line {
            FrontLine::Field { key, value, .. } => Some((key.as_str(), value.as_str())),
            FrontLine::Raw(_) => None,
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// Update the first field with this key, or append it
    pub fn set(&mut self, key: &str, value: &str) {
        for line in &mut self.lines {
            if let FrontLine::Field { key: k, value: v, raw } = line {
                if k.eq_ignore_ascii_case(key) {
                    if v != value {
                        *v = value.to_string();
                        *raw = None;
                    }
                    return;
                }
            }
        }
        self.lines.push(FrontLine::Field {
            key: key.to_string(),
            value: value.to_string(),
            raw: None,
        });
    }

    /// Insert fields after the last field whose key satisfies `group`, or at
    /// the end when no such field exists
    pub fn insert_grouped<F>(&mut self, group: F, fields: &[(String, String)])
    where
        F: Fn(&str) -> bool,
    {
        let position = self
            .lines
            .iter()
            .rposition(|line| matches!(line, FrontLine::Field { key, .. } if group(key)))
            .map(|i| i + 1)
            .unwrap_or(self.lines.len());
        for (offset, (key, value)) in fields.iter().enumerate() {
            self.lines.insert(
                position + offset,
                FrontLine::Field {
                    key: key.clone(),
                    value: value.clone(),
                    raw: None,
                },
            );
        }
    }

    /// Remove the last field with exactly this key and value
    pub fn remove_field(&mut self, key: &str, value: &str) -> bool {
        let position = self.lines.iter().rposition(|line| {
            matches!(line, FrontLine::Field { key: k, value: v, .. } if k == key && v == value)
        });
        match position {
            Some(i) => {
                self.lines.remove(i);
                true
            }
            None => false,
        }
    }
}

/// A contact document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactDocument {
    /// Path relative to the vault root, also the document's identity
    pub path: String,
    front: Option<FrontBlock>,
    body: String,
}

impl ContactDocument {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            front: None,
            body: String::new(),
        }
    }

    /// Split raw text into front block and body
    ///
    /// A document without a well-formed `---` block is all body.
    pub fn parse(path: impl Into<String>, text: &str) -> Self {
        let path = path.into();
        let mut rest = match text.strip_prefix(DELIMITER) {
            Some(rest) if rest.starts_with('\n') || rest.starts_with("\r\n") => rest,
            _ => {
                return Self {
                    path,
                    front: None,
                    body: text.to_string(),
                }
            }
        };
        rest = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n')).unwrap_or(rest);

        let mut offset = 0;
        for line in rest.split_inclusive('\n') {
            if line.trim_end() == DELIMITER {
                let front = FrontBlock::parse(&rest[..offset]);
                let body = rest[offset + line.len()..].to_string();
                return Self {
                    path,
                    front: Some(front),
                    body,
                };
            }
            offset += line.len();
        }

        tracing::debug!("Unterminated front block in {}, treating as body", path);
        Self {
            path,
            front: None,
            body: text.to_string(),
        }
    }

    pub fn to_text(&self) -> String {
        match &self.front {
            Some(front) => format!("{}\n{}{}\n{}", DELIMITER, front.render(), DELIMITER, self.body),
            None => self.body.clone(),
        }
    }

    pub fn with_field(mut self, key: &str, value: &str) -> Self {
        self.front_mut().set(key, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn front(&self) -> Option<&FrontBlock> {
        self.front.as_ref()
    }

    /// Front block, created empty if the document has none
    pub fn front_mut(&mut self) -> &mut FrontBlock {
        self.front.get_or_insert_with(FrontBlock::default)
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.front.as_ref().and_then(|f| f.get(key))
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn set_body(&mut self, body: String) {
        self.body = body;
    }

    /// File name without directory or `.md` extension
    pub fn stem(&self) -> &str {
        let name = self.path.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(&self.path);
        name.strip_suffix(".md").unwrap_or(name)
    }

    /// The document's own `UID`, if present and non-empty
    pub fn uid(&self) -> Option<&str> {
        self.field(UID_KEY).map(str::trim).filter(|s| !s.is_empty())
    }

    /// Contact id: the `UID`, else the file stem as a local id
    pub fn contact_id(&self) -> ContactId {
        ContactId::new(self.uid().unwrap_or_else(|| self.stem()))
    }

    pub fn display_name(&self) -> String {
        self.field(NAME_KEY)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.stem())
            .to_string()
    }

    pub fn gender(&self) -> Gender {
        self.field(GENDER_KEY)
            .and_then(Gender::from_code)
            .unwrap_or_default()
    }

    /// Graph node describing this document's contact
    pub fn to_node(&self) -> ContactNode {
        ContactNode::new(self.contact_id(), self.display_name())
            .with_gender(self.gender())
            .with_document(self.path.clone())
            .with_local_id(self.stem().to_string())
    }

    pub fn revision(&self) -> Option<&str> {
        self.field(REVISION_KEY)
    }

    /// Refresh the revision marker
    pub fn touch(&mut self, now: DateTime<Utc>) {
        let stamp = now.format(REVISION_FORMAT).to_string();
        self.front_mut().set(REVISION_KEY, &stamp);
    }
}

/// Render one `key: value` line
///
/// Values that would not read back as the same plain YAML string are
/// written as YAML quoted scalars. A field is a single line, so line breaks
/// are folded to spaces.
pub fn format_field(key: &str, value: &str) -> String {
    let value = value.replace(['\r', '\n'], " ");
    if is_plain(&value) {
        return format!("{key}: {value}");
    }
    match serde_yaml::to_string(&value) {
        Ok(encoded) => format!("{key}: {}", encoded.trim_end()),
        Err(e) => {
            tracing::warn!("Field {} not encodable as YAML: {}", key, e);
            format!("{key}: {value}")
        }
    }
}

fn is_plain(value: &str) -> bool {
    if value.is_empty() {
        return true;
    }
    value.trim() == value
        && matches!(
            serde_yaml::from_str::<serde_yaml::Value>(value),
            Ok(serde_yaml::Value::String(parsed)) if parsed == value
        )
}

/// Decode a field value: quoted scalars through YAML, plain text as written
fn decode_value(raw: &str) -> String {
    let raw = raw.trim();
    if !(raw.starts_with('"') || raw.starts_with('\'')) {
        return raw.to_string();
    }
    match serde_yaml::from_str::<String>(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("Keeping malformed quoted value {:?}: {}", raw, e);
            raw.to_string()
        }
    }
}
