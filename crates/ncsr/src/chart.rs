//! Per-entity counts of share classes disclosing performance.

use std::collections::HashMap;
use std::fmt::Write;

use crate::report::Report;

/// Share classes with performance data, counted per entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PerformanceChart {
    bars: Vec<(String, usize)>,
}

impl PerformanceChart {
    /// Count report rows with performance data per entity name, largest
    /// first and ties by name.
    ///
    /// Returns `None` when the reference table carries no entity names.
    /// Rows without an entity name are not counted.
    #[must_use]
    pub fn from_report(report: &Report) -> Option<Self> {
        if !report.has_entity_names() {
            return None;
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for row in report.rows() {
            if !row.disclosure.has_performance_data {
                continue;
            }
            if let Some(entity) = row.entity_name() {
                *counts.entry(entity).or_default() += 1;
            }
        }

        let mut bars: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        bars.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Some(Self { bars })
    }

    /// Entity names with their counts, in display order.
    #[must_use]
    pub fn bars(&self) -> &[(String, usize)] {
        &self.bars
    }

    /// Whether no entity has performance data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Render as a horizontal text bar chart; the longest bar is `width` wide.
    #[must_use]
    pub fn render(&self, width: usize) -> String {
        let Some(max) = self.bars.iter().map(|(_, c)| *c).max() else {
            return String::from("No share classes disclose performance information.\n");
        };
        let label_width = self
            .bars
            .iter()
            .map(|(name, _)| name.chars().count())
            .max()
            .unwrap_or(0);

        let mut out = String::from("Performance Disclosure by Entity\n");
        for (name, count) in &self.bars {
            let len = (count * width.max(1)).div_ceil(max);
            let _ = writeln!(out, "{name:<label_width$} | {} {count}", "#".repeat(len));
        }
        out
    }
}
