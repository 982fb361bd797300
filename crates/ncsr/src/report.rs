//! Report Assembler: joins extracted rows with the reference table and
//! filing metadata, and exports the result.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use ncsr_core::{ClassMappingEntry, DisclosureRow, FilingRecord, NcsrError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::mapping::ClassMapping;

/// Which report to build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportKind {
    /// Expense disclosures per share class.
    #[default]
    Expenses,
    /// Average annual return disclosures per share class.
    Performance,
}

impl ReportKind {
    /// Default file name for the CSV export.
    #[must_use]
    pub const fn default_file_name(&self) -> &'static str {
        match self {
            Self::Expenses => "extracted_expenses.csv",
            Self::Performance => "tsr_performance_results.csv",
        }
    }
}

/// A report column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReportColumn {
    /// Share class id.
    ClassId,
    /// Series id from the reference table.
    SeriesId,
    /// Series name from the reference table.
    SeriesName,
    /// Class name from the reference table.
    ClassName,
    /// Class ticker from the reference table.
    Ticker,
    /// Ticker reported by the search endpoint for the filing.
    FilingTicker,
    /// Entity name from the reference table.
    EntityName,
    /// Expense narrative.
    ExpenseText,
    /// Average annual return table narrative.
    ReturnTableText,
    /// Start of the expense reporting period.
    PeriodStart,
    /// End of the expense reporting period.
    PeriodEnd,
    /// Expense ratio.
    ExpensePct,
    /// Expenses paid.
    ExpenseAmt,
    /// Average annual return.
    AverageReturnPct,
    /// Whether the filing has a return table.
    HasPerformanceData,
    /// Filing date.
    FiledAt,
    /// Filing URL.
    FilingUrl,
    /// Filer CIK.
    CikNumber,
}

const EXPENSE_COLUMNS: &[ReportColumn] = &[
    ReportColumn::SeriesId,
    ReportColumn::SeriesName,
    ReportColumn::ClassName,
    ReportColumn::Ticker,
    ReportColumn::ExpenseText,
    ReportColumn::ReturnTableText,
    ReportColumn::PeriodStart,
    ReportColumn::PeriodEnd,
    ReportColumn::ExpensePct,
    ReportColumn::ExpenseAmt,
    ReportColumn::FilingUrl,
    ReportColumn::CikNumber,
];

const PERFORMANCE_COLUMNS: &[ReportColumn] = &[
    ReportColumn::ClassId,
    ReportColumn::FilingUrl,
    ReportColumn::HasPerformanceData,
    ReportColumn::FiledAt,
    ReportColumn::FilingTicker,
    ReportColumn::Ticker,
    ReportColumn::ClassName,
    ReportColumn::SeriesName,
    ReportColumn::SeriesId,
    ReportColumn::EntityName,
    ReportColumn::AverageReturnPct,
    ReportColumn::CikNumber,
];

impl ReportColumn {
    /// Header text.
    #[must_use]
    pub const fn header(&self) -> &'static str {
        match self {
            Self::ClassId => "Class ID",
            Self::SeriesId => "Series ID",
            Self::SeriesName => "Series Name",
            Self::ClassName => "Class Name",
            Self::Ticker => "Ticker",
            Self::FilingTicker => "Filing Ticker",
            Self::EntityName => "Entity Name",
            Self::ExpenseText => "Expense Text",
            Self::ReturnTableText => "Return Table Text",
            Self::PeriodStart => "Period Start",
            Self::PeriodEnd => "Period End",
            Self::ExpensePct => "Expense Pct",
            Self::ExpenseAmt => "Expense Amt",
            Self::AverageReturnPct => "Average Return Pct",
            Self::HasPerformanceData => "Has Performance Data",
            Self::FiledAt => "Filed At",
            Self::FilingUrl => "Filing URL",
            Self::CikNumber => "CIK Number",
        }
    }

    /// The value of this column for a row.
    #[must_use]
    pub fn cell(&self, row: &ReportRow) -> Cell {
        let d = &row.disclosure;
        let m = row.mapping.as_ref();
        match self {
            Self::ClassId => Cell::Text(d.class_id.as_ref().map(ToString::to_string)),
            Self::SeriesId => Cell::Text(m.map(|m| m.series_id.clone())),
            Self::SeriesName => Cell::Text(m.map(|m| m.series_name.clone())),
            Self::ClassName => Cell::Text(m.map(|m| m.class_name.clone())),
            Self::Ticker => Cell::Text(m.map(|m| m.ticker.clone())),
            Self::FilingTicker => Cell::Text(d.ticker.clone()),
            Self::EntityName => Cell::Text(row.entity_name().map(str::to_string)),
            Self::ExpenseText => Cell::Text(d.expense_text.clone()),
            Self::ReturnTableText => Cell::Text(d.return_table_text.clone()),
            Self::PeriodStart => Cell::Text(d.period_start.map(|p| p.to_string())),
            Self::PeriodEnd => Cell::Text(d.period_end.map(|p| p.to_string())),
            Self::ExpensePct => Cell::Number(d.expense_pct),
            Self::ExpenseAmt => Cell::Number(d.expense_amt),
            Self::AverageReturnPct => Cell::Number(d.performance_pct),
            Self::HasPerformanceData => Cell::Flag(d.has_performance_data),
            Self::FiledAt => Cell::Text(d.filed_at.map(|p| p.to_string())),
            Self::FilingUrl => Cell::Text(Some(d.filing_url.clone())),
            Self::CikNumber => Cell::Text(row.cik.clone()),
        }
    }
}

/// One report value.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    /// Text, absent when unknown.
    Text(Option<String>),
    /// Number, absent when unknown.
    Number(Option<f64>),
    /// Boolean flag.
    Flag(bool),
}

impl Cell {
    /// Render for CSV output. Absent values are empty.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Text(v) => v.clone().unwrap_or_default(),
            Self::Number(v) => v.map(|n| n.to_string()).unwrap_or_default(),
            Self::Flag(v) => v.to_string(),
        }
    }
}

/// A disclosure row joined with its reference entry and filer CIK.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportRow {
    /// Extracted facts.
    pub disclosure: DisclosureRow,
    /// Reference entry for the row's class, if any.
    pub mapping: Option<ClassMappingEntry>,
    /// CIK of the filing the row came from.
    pub cik: Option<String>,
}

impl ReportRow {
    /// Entity name from the reference entry.
    #[must_use]
    pub fn entity_name(&self) -> Option<&str> {
        self.mapping.as_ref().and_then(|m| m.entity_name.as_deref())
    }
}

/// The assembled report.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    kind: ReportKind,
    rows: Vec<ReportRow>,
    entity_names: bool,
}

impl Report {
    /// Left-join rows with the reference table on class id and with the
    /// filings on URL. Rows without a class id or without a reference entry
    /// keep empty reference fields.
    #[must_use]
    pub fn assemble(
        rows: Vec<DisclosureRow>,
        mapping: &ClassMapping,
        filings: &[FilingRecord],
        kind: ReportKind,
    ) -> Self {
        let ciks: HashMap<&str, &str> = filings
            .iter()
            .map(|f| (f.filing_url.as_str(), f.cik.as_str()))
            .collect();

        let rows = rows
            .into_iter()
            .map(|disclosure| {
                let mapping = disclosure
                    .class_id
                    .as_ref()
                    .and_then(|id| mapping.get(id))
                    .cloned();
                let cik = ciks
                    .get(disclosure.filing_url.as_str())
                    .map(|c| (*c).to_string());
                ReportRow {
                    disclosure,
                    mapping,
                    cik,
                }
            })
            .collect();

        Self {
            kind,
            rows,
            entity_names: mapping.has_entity_names(),
        }
    }

    /// Report kind.
    #[must_use]
    pub const fn kind(&self) -> ReportKind {
        self.kind
    }

    /// Joined rows.
    #[must_use]
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the report has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether the reference table supplied entity names.
    #[must_use]
    pub const fn has_entity_names(&self) -> bool {
        self.entity_names
    }

    /// Displayed columns, in order.
    #[must_use]
    pub fn columns(&self) -> Vec<ReportColumn> {
        let columns = match self.kind {
            ReportKind::Expenses => EXPENSE_COLUMNS,
            ReportKind::Performance => PERFORMANCE_COLUMNS,
        };
        columns
            .iter()
            .copied()
            .filter(|c| *c != ReportColumn::EntityName || self.entity_names)
            .collect()
    }

    /// Rows whose filing has a return table.
    #[must_use]
    pub fn performance_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.disclosure.has_performance_data)
            .count()
    }

    /// Write the report as CSV with a header row.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let columns = self.columns();
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(columns.iter().map(ReportColumn::header))?;
        for row in &self.rows {
            wtr.write_record(columns.iter().map(|c| c.cell(row).render()))?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Render the report as a CSV string.
    pub fn to_csv_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf).map_err(|e| NcsrError::Csv(e.to_string()))
    }

    /// Write the report to a CSV file. An empty report is refused.
    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if self.is_empty() {
            return Err(NcsrError::InvalidParameter(
                "Refusing to write an empty report".to_string(),
            ));
        }
        let file = File::create(path)?;
        self.write_csv(file)?;
        info!(path = %path.display(), rows = self.len(), "Wrote report");
        Ok(())
    }

    /// Build a polars DataFrame of the displayed columns.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let columns = self
            .columns()
            .into_iter()
            .map(|column| {
                let name = column.header().into();
                let cells = self.rows.iter().map(|row| column.cell(row));
                match column.cell_kind() {
                    CellKind::Text => Column::new(
                        name,
                        cells
                            .map(|c| match c {
                                Cell::Text(v) => v,
                                other => Some(other.render()),
                            })
                            .collect::<Vec<Option<String>>>(),
                    ),
                    CellKind::Number => Column::new(
                        name,
                        cells
                            .map(|c| match c {
                                Cell::Number(v) => v,
                                _ => None,
                            })
                            .collect::<Vec<Option<f64>>>(),
                    ),
                    CellKind::Flag => Column::new(
                        name,
                        cells
                            .map(|c| matches!(c, Cell::Flag(true)))
                            .collect::<Vec<bool>>(),
                    ),
                }
            })
            .collect();

        DataFrame::new(columns).map_err(|e| NcsrError::Other(e.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CellKind {
    Text,
    Number,
    Flag,
}

impl ReportColumn {
    const fn cell_kind(&self) -> CellKind {
        match self {
            Self::ExpensePct | Self::ExpenseAmt | Self::AverageReturnPct => CellKind::Number,
            Self::HasPerformanceData => CellKind::Flag,
            _ => CellKind::Text,
        }
    }
}
