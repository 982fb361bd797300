//! Core data types for disclosure extraction.
//!
//! This module defines the records that flow through the pipeline:
//!
//! - [`ClassId`] - Share class identifier (`C` followed by nine digits)
//! - [`FormType`] - Filing form type label
//! - [`FilingRecord`] - Metadata for one located filing
//! - [`DisclosureRow`] - Disclosure facts for one share class of one filing
//! - [`ClassMappingEntry`] - One row of the class/series reference table

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::NcsrError;

/// Result-count limits offered to the user.
pub const RESULT_LIMIT_OPTIONS: [usize; 5] = [5, 20, 50, 100, 200];

static CLASS_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"C[0-9]{9}").expect("class id pattern is valid"));

/// A share class identifier.
///
/// Always `C` followed by exactly nine ASCII digits.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClassId(String);

impl ClassId {
    /// Parses a string that must be exactly one class id (surrounding
    /// whitespace is ignored).
    pub fn parse(s: &str) -> Result<Self, NcsrError> {
        let s = s.trim();
        match CLASS_ID_PATTERN.find(s) {
            Some(m) if m.start() == 0 && m.end() == s.len() => Ok(Self(s.to_string())),
            _ => Err(NcsrError::Parse(format!("invalid class id: {s:?}"))),
        }
    }

    /// Extracts the first class id embedded in free text, such as an XBRL
    /// segment member like `ck0000819118:C000012345Member`.
    #[must_use]
    pub fn extract(text: &str) -> Option<Self> {
        CLASS_ID_PATTERN
            .find(text)
            .map(|m| Self(m.as_str().to_string()))
    }

    /// Returns the class id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ClassId {
    type Err = NcsrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ClassId {
    type Error = NcsrError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ClassId> for String {
    fn from(id: ClassId) -> Self {
        id.0
    }
}

/// A filing form type label (e.g. `N-CSR`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormType(String);

impl FormType {
    /// Annual shareholder report.
    pub const N_CSR: &'static str = "N-CSR";
    /// Semi-annual shareholder report.
    pub const N_CSRS: &'static str = "N-CSRS";

    /// Creates a form type label, rejecting empty or quoted labels.
    pub fn new(label: impl Into<String>) -> Result<Self, NcsrError> {
        let label = label.into().trim().to_uppercase();
        if label.is_empty() {
            return Err(NcsrError::InvalidParameter(
                "Empty form type".to_string(),
            ));
        }
        if label.contains('"') {
            return Err(NcsrError::InvalidParameter(format!(
                "Form type may not contain quotes: {label}"
            )));
        }
        Ok(Self(label))
    }

    /// The form types offered by default.
    #[must_use]
    pub fn shareholder_reports() -> Vec<Self> {
        vec![Self(Self::N_CSR.to_string()), Self(Self::N_CSRS.to_string())]
    }

    /// Returns the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FormType {
    type Err = NcsrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Metadata for one filing returned by the search endpoint.
///
/// Identity is [`filing_url`](Self::filing_url).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingRecord {
    /// Ticker reported by the search endpoint, if any.
    pub ticker: Option<String>,
    /// Central Index Key of the filer.
    pub cik: String,
    /// Filing date.
    pub filed_at: NaiveDate,
    /// Accession number.
    pub accession_number: String,
    /// URL of the filing detail document.
    pub filing_url: String,
    /// Form type of the filing.
    pub form_type: Option<String>,
    /// Filer name.
    pub company_name: Option<String>,
}

impl FilingRecord {
    /// Creates a filing record with the required fields.
    #[must_use]
    pub fn new(
        cik: impl Into<String>,
        filed_at: NaiveDate,
        accession_number: impl Into<String>,
        filing_url: impl Into<String>,
    ) -> Self {
        Self {
            ticker: None,
            cik: cik.into(),
            filed_at,
            accession_number: accession_number.into(),
            filing_url: filing_url.into(),
            form_type: None,
            company_name: None,
        }
    }

    /// Sets the ticker.
    #[must_use]
    pub fn with_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.ticker = Some(ticker.into());
        self
    }

    /// Sets the form type.
    #[must_use]
    pub fn with_form_type(mut self, form_type: impl Into<String>) -> Self {
        self.form_type = Some(form_type.into());
        self
    }

    /// Sets the filer name.
    #[must_use]
    pub fn with_company_name(mut self, name: impl Into<String>) -> Self {
        self.company_name = Some(name.into());
        self
    }
}

/// Disclosure facts for one share class found in one filing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DisclosureRow {
    /// Share class, when one could be recovered from the segment annotation.
    pub class_id: Option<ClassId>,
    /// Expense ratio (`ExpenseRatioPct`).
    pub expense_pct: Option<f64>,
    /// Expenses paid on a hypothetical investment (`ExpensesPaidAmt`).
    pub expense_amt: Option<f64>,
    /// Expense narrative (`ExpensesTextBlock`).
    pub expense_text: Option<String>,
    /// Average annual return table narrative (`AvgAnnlRtrTableTextBlock`).
    pub return_table_text: Option<String>,
    /// Average annual return (`AvgAnnlRtrPct`).
    pub performance_pct: Option<f64>,
    /// Start of the reporting period of the expense facts.
    pub period_start: Option<NaiveDate>,
    /// End of the reporting period of the expense facts.
    pub period_end: Option<NaiveDate>,
    /// Whether the filing carries an average return table anywhere.
    pub has_performance_data: bool,
    /// URL of the source filing.
    pub filing_url: String,
    /// Filing date of the source filing.
    pub filed_at: Option<NaiveDate>,
    /// Ticker of the source filing.
    pub ticker: Option<String>,
}

impl DisclosureRow {
    /// Creates an empty row for a filing.
    #[must_use]
    pub fn new(filing_url: impl Into<String>) -> Self {
        Self {
            filing_url: filing_url.into(),
            ..Default::default()
        }
    }

    /// Sets the class id.
    #[must_use]
    pub fn with_class_id(mut self, class_id: ClassId) -> Self {
        self.class_id = Some(class_id);
        self
    }

    /// Copies the filing date and ticker from the filing the row came from.
    pub fn annotate(&mut self, filing: &FilingRecord) {
        self.filed_at = Some(filing.filed_at);
        self.ticker.clone_from(&filing.ticker);
    }
}

/// One row of the class/series reference table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMappingEntry {
    /// Share class id.
    pub class_id: ClassId,
    /// Share class ticker.
    pub ticker: String,
    /// Share class name.
    pub class_name: String,
    /// Series (fund) name.
    pub series_name: String,
    /// Series id.
    pub series_id: String,
    /// Fund family or registrant name, when the table carries one.
    pub entity_name: Option<String>,
}
