//! Record schema and the processing state derived from it.

use crate::sheets::Column;

/// Column layout of the data sheet.
pub mod columns {
    use super::Column;

    /// Contact first name.
    pub const FIRST_NAME: Column = Column::from_index(0);
    /// Contact last name.
    pub const LAST_NAME: Column = Column::from_index(1);
    /// Company name.
    pub const COMPANY: Column = Column::from_index(2);
    /// Company website, the source-content locator.
    pub const WEBSITE: Column = Column::from_index(3);
    /// Free-text LinkedIn notes about the contact.
    pub const LINKEDIN: Column = Column::from_index(4);
    /// Drafted email subject.
    pub const SUBJECT: Column = Column::from_index(6);
    /// Drafted email body.
    pub const EMAIL: Column = Column::from_index(7);
    /// Lead-quality assessment.
    pub const QUALITY: Column = Column::from_index(8);
    /// Lead classification.
    pub const LEAD_TYPE: Column = Column::from_index(14);
}

/// Placeholder for a missing value, both in the sheet and in the lead line.
const NOT_AVAILABLE: &str = "N/A";

/// One row of the data sheet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    /// Contact first name.
    pub first_name: Option<String>,
    /// Contact last name.
    pub last_name: Option<String>,
    /// Company name.
    pub company: Option<String>,
    /// Company website.
    pub website: Option<String>,
    /// LinkedIn notes.
    pub linkedin: Option<String>,
    /// Drafted subject.
    pub subject: Option<String>,
    /// Drafted email body.
    pub email: Option<String>,
    /// Lead-quality assessment.
    pub quality: Option<String>,
    /// Lead classification.
    pub lead_type: Option<String>,
}

impl Record {
    /// Build a record from a row read from column `A`.
    ///
    /// Blank cells and cells holding the `N/A` placeholder are absent.
    #[must_use]
    pub fn from_row(row: &[String]) -> Self {
        let cell = |column: Column| {
            row.get(column.index())
                .filter(|value| {
                    let value = value.trim();
                    !value.is_empty() && value != NOT_AVAILABLE
                })
                .cloned()
        };
        Self {
            first_name: cell(columns::FIRST_NAME),
            last_name: cell(columns::LAST_NAME),
            company: cell(columns::COMPANY),
            website: cell(columns::WEBSITE),
            linkedin: cell(columns::LINKEDIN),
            subject: cell(columns::SUBJECT),
            email: cell(columns::EMAIL),
            quality: cell(columns::QUALITY),
            lead_type: cell(columns::LEAD_TYPE),
        }
    }

    /// Where this record stands in the pipeline.
    #[must_use]
    pub fn state(&self) -> RecordState {
        match (&self.website, &self.email, &self.lead_type) {
            (Some(_), None, _) => RecordState::Undrafted,
            (Some(_), Some(_), None) => RecordState::Unclassified,
            _ => RecordState::Settled,
        }
    }

    /// `"<first> <last> from <company>: <linkedin>"`, with `N/A` for blanks.
    #[must_use]
    pub fn lead_line(&self) -> String {
        let or_na = |field: &Option<String>| field.as_deref().unwrap_or(NOT_AVAILABLE).to_string();
        format!(
            "{} {} from {}: {}",
            or_na(&self.first_name),
            or_na(&self.last_name),
            or_na(&self.company),
            or_na(&self.linkedin)
        )
    }

    /// Record the values just written for this row.
    pub fn apply(&mut self, written: &WrittenFields) {
        if let Some(quality) = &written.quality {
            self.quality = Some(quality.clone());
        }
        if let Some(email) = &written.email {
            self.email = Some(email.clone());
        }
        if let Some(subject) = &written.subject {
            self.subject = Some(subject.clone());
        }
    }
}

/// Completeness of a record, derived from which output fields are populated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordState {
    /// Has a website but no drafted email.
    Undrafted,
    /// Has a website and an email, but no lead classification.
    Unclassified,
    /// Nothing left to compute.
    Settled,
}

impl RecordState {
    /// Processing mode for records in this state.
    #[must_use]
    pub const fn mode(self) -> ProcessingMode {
        match self {
            Self::Undrafted => ProcessingMode::FullEmail,
            Self::Unclassified => ProcessingMode::QualityOnly,
            Self::Settled => ProcessingMode::Skip,
        }
    }
}

/// What the item processor does with a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessingMode {
    /// Summarize, assess, draft the email and its subject; three writes.
    FullEmail,
    /// Summarize and assess; one write.
    QualityOnly,
    /// No calls and no writes.
    Skip,
}

impl ProcessingMode {
    /// Short name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FullEmail => "full_email",
            Self::QualityOnly => "quality_only",
            Self::Skip => "skip",
        }
    }
}

/// Output values written for one record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WrittenFields {
    /// Value written to the quality column.
    pub quality: Option<String>,
    /// Value written to the email column.
    pub email: Option<String>,
    /// Value written to the subject column.
    pub subject: Option<String>,
}

impl WrittenFields {
    /// Number of cells written.
    #[must_use]
    pub fn count(&self) -> usize {
        [&self.quality, &self.email, &self.subject]
            .iter()
            .filter(|field| field.is_some())
            .count()
    }

    /// Check if nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

/// First 80 characters of `text`, cut back to the last space and suffixed with `...`.
#[must_use]
pub fn preview(text: &str) -> String {
    const LIMIT: usize = 80;
    match text.char_indices().nth(LIMIT) {
        None => text.to_string(),
        Some((end, _)) => {
            let head = &text[..end];
            let cut = head.rfind(' ').unwrap_or(0);
            format!("{}...", &head[..cut])
        }
    }
}
