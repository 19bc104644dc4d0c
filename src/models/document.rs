use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Prefix used by documents uploaded outside the checklist flow.
pub const LEGACY_PREFIX: &str = "additional_";

/// Identity of a source document. Each variant names the namespace it is
/// looked up in first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
#[serde(from = "DocumentRefRepr")]
pub enum DocumentRef {
    /// Slot of a checklist; falls back to the file store when numeric.
    ChecklistDoc(String),
    /// Standalone uploaded file.
    RawFile(i64),
    /// `additional_<n>` briefcase upload, stored as a plain file record.
    LegacyPrefixed(i64),
}

impl DocumentRef {
    /// Parses the wire form. Never fails: anything that is not a well-formed
    /// legacy id is treated as a checklist slot id.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(rest) = raw.strip_prefix(LEGACY_PREFIX) {
            if let Ok(id) = rest.parse::<i64>() {
                return DocumentRef::LegacyPrefixed(id);
            }
        }
        DocumentRef::ChecklistDoc(raw.to_string())
    }
}

impl FromStr for DocumentRef {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(DocumentRef::parse(s))
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentRef::ChecklistDoc(id) => write!(f, "{}", id),
            DocumentRef::RawFile(id) => write!(f, "file:{}", id),
            DocumentRef::LegacyPrefixed(id) => write!(f, "{}{}", LEGACY_PREFIX, id),
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
enum TaggedRef {
    ChecklistDoc(String),
    RawFile(i64),
    LegacyPrefixed(i64),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DocumentRefRepr {
    Plain(String),
    Number(i64),
    Tagged(TaggedRef),
}

impl From<DocumentRefRepr> for DocumentRef {
    fn from(repr: DocumentRefRepr) -> Self {
        match repr {
            DocumentRefRepr::Plain(raw) => DocumentRef::parse(&raw),
            DocumentRefRepr::Number(id) => DocumentRef::ChecklistDoc(id.to_string()),
            DocumentRefRepr::Tagged(TaggedRef::ChecklistDoc(id)) => DocumentRef::ChecklistDoc(id),
            DocumentRefRepr::Tagged(TaggedRef::RawFile(id)) => DocumentRef::RawFile(id),
            DocumentRefRepr::Tagged(TaggedRef::LegacyPrefixed(id)) => DocumentRef::LegacyPrefixed(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReference {
    pub id: DocumentRef,
    pub order: i64,
}

impl DocumentReference {
    pub fn new(id: DocumentRef, order: i64) -> Self {
        DocumentReference { id, order }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedDocument {
    pub display_name: String,
    pub order: i64,
    pub source_path: PathBuf,
}

/// Where a checklist slot keeps its file.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentLocation {
    DirectPath(String),
    FileRecord(i64),
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChecklistDocument {
    pub id: String,
    pub checklist_id: i64,
    pub display_name: String,
    pub location: DocumentLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub id: i64,
    pub display_name: String,
    pub stored_path: Option<String>,
}
