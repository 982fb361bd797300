//! Collaborator traits for the external endpoints.
//!
//! This module defines the two seams the pipeline talks through:
//!
//! - [`FilingSearch`] - Paginated keyword and date-range filing search
//! - [`XbrlConverter`] - Structured (XBRL JSON) rendering of one filing
//!
//! The vendor client in `ncsr-secapi` implements both; tests substitute fakes.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt::Debug;

use crate::error::Result;

/// One page request against the search endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Query string in the endpoint's Lucene-style syntax.
    pub query: String,
    /// Offset of the first result.
    pub from: usize,
    /// Page size.
    pub size: usize,
    /// Field to sort on.
    pub sort_field: String,
    /// Sort descending when true.
    pub descending: bool,
}

impl SearchRequest {
    /// Creates a request for the first page, sorted by filing date, newest first.
    #[must_use]
    pub fn new(query: impl Into<String>, size: usize) -> Self {
        Self {
            query: query.into(),
            from: 0,
            size,
            sort_field: "filedAt".to_string(),
            descending: true,
        }
    }

    /// Returns the request for the following page.
    #[must_use]
    pub fn next_page(&self) -> Self {
        Self {
            from: self.from + self.size,
            ..self.clone()
        }
    }
}

/// Total hit count reported by the search endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTotal {
    /// Number of matching filings.
    pub value: u64,
    /// `eq` when exact, `gte` when the count is a lower bound.
    #[serde(default)]
    pub relation: Option<String>,
}

/// One page of search results.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPage {
    /// Total hits, when reported.
    #[serde(default)]
    pub total: Option<SearchTotal>,
    /// Hits on this page. `None` means the endpoint has no more data.
    #[serde(default)]
    pub filings: Option<Vec<FilingHit>>,
}

impl SearchPage {
    /// Returns true if the endpoint reports hits beyond `consumed`.
    ///
    /// An absent total or a lower-bound total is treated as "maybe more".
    #[must_use]
    pub fn has_more_after(&self, consumed: usize) -> bool {
        match &self.total {
            Some(total) if total.relation.as_deref() != Some("gte") => {
                (consumed as u64) < total.value
            }
            _ => true,
        }
    }
}

/// A single filing as returned by the search endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilingHit {
    /// Ticker of the filer.
    #[serde(default, deserialize_with = "string_or_number")]
    pub ticker: Option<String>,
    /// Central Index Key.
    #[serde(default, deserialize_with = "string_or_number")]
    pub cik: Option<String>,
    /// Filer name.
    #[serde(default)]
    pub company_name: Option<String>,
    /// Form type.
    #[serde(default)]
    pub form_type: Option<String>,
    /// Accession number.
    #[serde(default)]
    pub accession_no: Option<String>,
    /// Filing timestamp (RFC 3339).
    #[serde(default)]
    pub filed_at: Option<String>,
    /// Filing detail document URL.
    #[serde(default)]
    pub link_to_filing_details: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// XBRL JSON rendering of one filing: disclosure field name to occurrences.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct XbrlJson(pub Map<String, Value>);

impl XbrlJson {
    /// Returns the raw value of a top-level field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns true if the field is present at the top level.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }
}

impl From<Map<String, Value>> for XbrlJson {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Search endpoint collaborator.
#[async_trait]
pub trait FilingSearch: Send + Sync + Debug {
    /// Returns the name of this endpoint (e.g., "sec-api.io").
    fn name(&self) -> &str;

    /// Fetches one page of results.
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage>;
}

/// Conversion endpoint collaborator.
#[async_trait]
pub trait XbrlConverter: Send + Sync + Debug {
    /// Returns the name of this endpoint.
    fn name(&self) -> &str;

    /// Fetches the XBRL JSON rendering of the filing at `filing_url`.
    async fn xbrl_to_json(&self, filing_url: &str) -> Result<XbrlJson>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_page_advances_by_size() {
        let request = SearchRequest::new("formType:\"N-CSR\"", 50);
        assert_eq!(request.from, 0);
        let next = request.next_page().next_page();
        assert_eq!(next.from, 100);
        assert_eq!(next.size, 50);
        assert_eq!(next.query, request.query);
    }

    #[test]
    fn test_page_deserialization() {
        let page: SearchPage = serde_json::from_str(
            r#"{
                "total": {"value": 2, "relation": "eq"},
                "filings": [{
                    "ticker": "",
                    "cik": 819118,
                    "companyName": "Example Funds Trust",
                    "formType": "N-CSR",
                    "accessionNo": "0001193125-24-000001",
                    "filedAt": "2024-03-01T16:05:23-05:00",
                    "linkToFilingDetails": "https://www.sec.gov/Archives/edgar/data/819118/d1.htm"
                }]
            }"#,
        )
        .unwrap();

        let hit = &page.filings.as_ref().unwrap()[0];
        assert_eq!(hit.ticker, None);
        assert_eq!(hit.cik.as_deref(), Some("819118"));
        assert_eq!(hit.form_type.as_deref(), Some("N-CSR"));
        assert!(page.has_more_after(1));
        assert!(!page.has_more_after(2));
    }

    #[test]
    fn test_page_without_filings() {
        let page: SearchPage = serde_json::from_str("{}").unwrap();
        assert!(page.filings.is_none());
        assert!(page.has_more_after(1000));
    }

    #[test]
    fn test_lower_bound_total_is_open_ended() {
        let page = SearchPage {
            total: Some(SearchTotal {
                value: 10_000,
                relation: Some("gte".to_string()),
            }),
            filings: Some(Vec::new()),
        };
        assert!(page.has_more_after(10_000));
    }
}
