#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ncsr/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Fund shareholder-report disclosure extraction.
//!
//! This crate wires the collaborators from `ncsr-core` into a pipeline:
//!
//! - [`FilingLocator`] - paginated search for filings by form type and date
//! - [`DisclosureExtractor`] - per-share-class facts from one filing
//! - [`BatchOrchestrator`] - bounded, order-preserving extraction over many filings
//! - [`ClassMapping`] - the class/series reference table
//! - [`Report`] - joined rows, CSV export and a dataframe view
//! - [`PerformanceChart`] - per-entity counts of classes disclosing performance
//! - [`Pipeline`] - all of the above, in order
//!
//! # Features
//!
//! - `secapi` - re-export the sec-api.io client (default)
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chrono::NaiveDate;
//! use ncsr::{FormType, Pipeline, PipelineConfig, ReportKind, RunOutcome, RunRequest};
//! use ncsr::{SecApiClient, SecApiConfig};
//!
//! #[tokio::main]
//! async fn main() -> ncsr::Result<()> {
//!     let client = Arc::new(SecApiClient::new(SecApiConfig::from_env()?)?);
//!     let pipeline = Pipeline::new(client.clone(), client, PipelineConfig::default());
//!
//!     let request = RunRequest::new(
//!         FormType::shareholder_reports(),
//!         NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!         NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
//!         20,
//!         "class_series_mapping.csv",
//!         ReportKind::Expenses,
//!     );
//!
//!     if let RunOutcome::Report { report, .. } = pipeline.run(&request, |_, _| {}).await? {
//!         report.save_csv("extracted_expenses.csv")?;
//!     }
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use ncsr_core::*;

// Vendor client
#[cfg(feature = "secapi")]
pub use ncsr_secapi::{API_KEY_VAR, SecApiClient, SecApiConfig};

mod chart;
mod config;
mod extract;
mod locator;
mod mapping;
mod orchestrator;
mod pipeline;
mod report;

pub use chart::PerformanceChart;
pub use config::{ClassIdPolicy, PipelineConfig};
pub use extract::{DisclosureExtractor, ExtractOutcome, fields};
pub use locator::{FilingLocator, PAGE_SIZE, build_query};
pub use mapping::ClassMapping;
pub use orchestrator::{BatchOrchestrator, BatchOutcome, FilingFailure};
pub use pipeline::{Pipeline, RunOutcome, RunRequest};
pub use report::{Cell, Report, ReportColumn, ReportKind, ReportRow};
