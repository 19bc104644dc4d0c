use chrono::{DateTime, Utc};

/// Values written into the Info dictionary of a produced document.
#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    pub title: String,
    pub subject: Option<String>,
    pub keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        DocumentMetadata {
            title: "Compiled document".to_string(),
            subject: None,
            keywords: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

impl DocumentMetadata {
    pub fn new(title: impl Into<String>) -> Self {
        DocumentMetadata {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    /// Creation date in the `D:YYYYMMDDHHmmSSZ` form PDF readers expect.
    pub fn pdf_creation_date(&self) -> String {
        format!("D:{}Z", self.created_at.format("%Y%m%d%H%M%S"))
    }
}
