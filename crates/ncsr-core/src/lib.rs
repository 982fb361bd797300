#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ncsr/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for N-CSR disclosure extraction.
//!
//! This crate provides the foundational abstractions shared by the vendor
//! client and the pipeline:
//!
//! - [`FilingSearch`](provider::FilingSearch) - Paginated filing search
//! - [`XbrlConverter`](provider::XbrlConverter) - Filing to XBRL JSON conversion
//! - [`ClassId`](types::ClassId) - Share class identifier
//! - [`FilingRecord`](types::FilingRecord), [`DisclosureRow`](types::DisclosureRow),
//!   [`ClassMappingEntry`](types::ClassMappingEntry) - Pipeline records

/// Error types for pipeline operations.
pub mod error;
/// Collaborator traits for the search and conversion endpoints.
pub mod provider;
/// Core data types (ClassId, FilingRecord, DisclosureRow, etc.).
pub mod types;

// Re-export commonly used items at crate root
pub use error::{NcsrError, Result};
pub use provider::{
    FilingHit, FilingSearch, SearchPage, SearchRequest, SearchTotal, XbrlConverter, XbrlJson,
};
pub use types::{
    ClassId, ClassMappingEntry, DisclosureRow, FilingRecord, FormType, RESULT_LIMIT_OPTIONS,
};
