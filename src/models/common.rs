use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of a best-effort step applied to one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    Included,
    Skipped(SkipReason),
}

impl Outcome {
    pub fn is_included(&self) -> bool {
        matches!(self, Outcome::Included)
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            Outcome::Included => None,
            Outcome::Skipped(reason) => Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// No namespace knows the identifier.
    NotFound,
    /// Numeric identifier outside the file store's id space.
    IdOutOfRange(String),
    /// A record exists but carries no file path.
    NoUsablePath,
    /// The record points at a file that is not on disk.
    MissingFile(String),
    /// The file exists but could not be parsed.
    Unreadable(String),
    NoStampConfigured,
    StampUnreadable(String),
}

impl SkipReason {
    /// Short label for logs and metric dimensions.
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::NotFound => "not_found",
            SkipReason::IdOutOfRange(_) => "id_out_of_range",
            SkipReason::NoUsablePath => "no_usable_path",
            SkipReason::MissingFile(_) => "missing_file",
            SkipReason::Unreadable(_) => "unreadable",
            SkipReason::NoStampConfigured => "no_stamp_configured",
            SkipReason::StampUnreadable(_) => "stamp_unreadable",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotFound => write!(f, "not found in any namespace"),
            SkipReason::IdOutOfRange(id) => write!(f, "identifier {} is outside the file store range", id),
            SkipReason::NoUsablePath => write!(f, "record has no file path"),
            SkipReason::MissingFile(path) => write!(f, "file {} does not exist", path),
            SkipReason::Unreadable(detail) => write!(f, "unreadable: {}", detail),
            SkipReason::NoStampConfigured => write!(f, "no stamp configured"),
            SkipReason::StampUnreadable(detail) => write!(f, "stamp unreadable: {}", detail),
        }
    }
}

/// Outcome of one requested reference, as reported back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOutcome {
    pub reference: String,
    pub order: i64,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Technical,
    Financial,
    Boq,
    Emd,
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseType::Technical => write!(f, "Technical"),
            ResponseType::Financial => write!(f, "Financial"),
            ResponseType::Boq => write!(f, "BOQ"),
            ResponseType::Emd => write!(f, "EMD"),
        }
    }
}
