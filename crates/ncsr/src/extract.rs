//! Disclosure Extractor: per-share-class facts from one filing's XBRL JSON.
//!
//! The converter returns each disclosure field as a list of tagged
//! occurrences, one per share class:
//!
//! ```json
//! "ExpenseRatioPct": [
//!   {
//!     "value": "0.0062",
//!     "period": {"startDate": "2023-07-01", "endDate": "2024-06-30"},
//!     "segment": {"dimension": "oef:ClassAxis", "value": "ck0000819118:C000012345Member"}
//!   }
//! ]
//! ```
//!
//! Expense-side fields and performance-side fields are keyed by class id and
//! outer-joined, so every class reporting either side yields exactly one row.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use chrono::NaiveDate;
use ncsr_core::{ClassId, DisclosureRow, NcsrError, Result, XbrlConverter, XbrlJson};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::ClassIdPolicy;

/// XBRL field names read by the extractor.
pub mod fields {
    /// Expense ratio per share class.
    pub const EXPENSE_RATIO_PCT: &str = "ExpenseRatioPct";
    /// Expenses paid on a hypothetical investment.
    pub const EXPENSES_PAID_AMT: &str = "ExpensesPaidAmt";
    /// Expense narrative.
    pub const EXPENSES_TEXT_BLOCK: &str = "ExpensesTextBlock";
    /// Average annual return table narrative.
    pub const AVG_ANNL_RTR_TABLE_TEXT_BLOCK: &str = "AvgAnnlRtrTableTextBlock";
    /// Average annual return.
    pub const AVG_ANNL_RTR_PCT: &str = "AvgAnnlRtrPct";
}

/// Result of a successful extraction.
#[derive(Clone, Debug, PartialEq)]
pub enum ExtractOutcome {
    /// One row per share class.
    Rows(Vec<DisclosureRow>),
    /// The filing carries no expense disclosure.
    NoDisclosure,
}

impl ExtractOutcome {
    /// Returns the extracted rows (empty for [`ExtractOutcome::NoDisclosure`]).
    #[must_use]
    pub fn into_rows(self) -> Vec<DisclosureRow> {
        match self {
            Self::Rows(rows) => rows,
            Self::NoDisclosure => Vec::new(),
        }
    }
}

/// Extracts [`DisclosureRow`]s from filings through an [`XbrlConverter`].
#[derive(Debug, Clone)]
pub struct DisclosureExtractor {
    converter: Arc<dyn XbrlConverter>,
    policy: ClassIdPolicy,
}

impl DisclosureExtractor {
    /// Create an extractor with the given class id policy.
    #[must_use]
    pub fn new(converter: Arc<dyn XbrlConverter>, policy: ClassIdPolicy) -> Self {
        Self { converter, policy }
    }

    /// Returns the class id policy.
    #[must_use]
    pub const fn policy(&self) -> ClassIdPolicy {
        self.policy
    }

    /// Fetch and extract one filing.
    pub async fn extract(&self, filing_url: &str) -> Result<ExtractOutcome> {
        let xbrl = self.converter.xbrl_to_json(filing_url).await?;
        self.extract_from_json(filing_url, &xbrl)
    }

    /// Extract rows from an already converted filing.
    pub fn extract_from_json(&self, filing_url: &str, xbrl: &XbrlJson) -> Result<ExtractOutcome> {
        if !xbrl.contains(fields::EXPENSE_RATIO_PCT) && !xbrl.contains(fields::EXPENSES_PAID_AMT) {
            debug!(filing_url, "Filing has no expense disclosure");
            return Ok(ExtractOutcome::NoDisclosure);
        }

        let has_performance_data = xbrl
            .get(fields::AVG_ANNL_RTR_TABLE_TEXT_BLOCK)
            .is_some_and(|v| match v {
                Value::Array(items) => !items.is_empty(),
                Value::Null => false,
                _ => true,
            });

        let mut expenses: KeyedSide<ExpenseFacts> = KeyedSide::default();
        for fact in self.keyed_facts(xbrl, fields::EXPENSE_RATIO_PCT)? {
            let entry = expenses.entry(fact.key);
            if entry.pct.is_none() {
                entry.pct = parse_number(fields::EXPENSE_RATIO_PCT, fact.fact.value.as_deref())?;
            }
            if entry.fallback_period.is_none() && fact.fact.period.is_dated() {
                entry.fallback_period = Some(fact.fact.period);
            }
        }
        for fact in self.keyed_facts(xbrl, fields::EXPENSES_PAID_AMT)? {
            let entry = expenses.entry(fact.key);
            if entry.amt.is_none() {
                entry.amt = parse_number(fields::EXPENSES_PAID_AMT, fact.fact.value.as_deref())?;
            }
            if entry.period.is_none() && fact.fact.period.is_dated() {
                entry.period = Some(fact.fact.period);
            }
        }
        for fact in self.keyed_facts(xbrl, fields::EXPENSES_TEXT_BLOCK)? {
            let entry = expenses.entry(fact.key);
            if entry.text.is_none() {
                entry.text = fact.fact.value.as_deref().map(flatten_text);
            }
        }

        let mut performance: KeyedSide<PerformanceFacts> = KeyedSide::default();
        for fact in self.keyed_facts(xbrl, fields::AVG_ANNL_RTR_TABLE_TEXT_BLOCK)? {
            let entry = performance.entry(fact.key);
            if entry.table_text.is_none() {
                entry.table_text = fact.fact.value.as_deref().map(flatten_text);
            }
        }
        for fact in self.keyed_facts(xbrl, fields::AVG_ANNL_RTR_PCT)? {
            let entry = performance.entry(fact.key);
            if entry.pct.is_none() {
                entry.pct = parse_number(fields::AVG_ANNL_RTR_PCT, fact.fact.value.as_deref())?;
            }
        }

        let rows: Vec<DisclosureRow> = outer_join(expenses.into_vec(), performance.into_vec())
            .into_iter()
            .map(|(key, expense, perf)| {
                let expense = expense.unwrap_or_default();
                let perf = perf.unwrap_or_default();
                let period = expense.period.or(expense.fallback_period).unwrap_or_default();
                DisclosureRow {
                    class_id: key.class_id(),
                    expense_pct: expense.pct,
                    expense_amt: expense.amt,
                    expense_text: expense.text,
                    return_table_text: perf.table_text,
                    performance_pct: perf.pct,
                    period_start: period.start,
                    period_end: period.end,
                    has_performance_data,
                    ..DisclosureRow::new(filing_url)
                }
            })
            .collect();

        debug!(filing_url, rows = rows.len(), "Extracted disclosure rows");

        if rows.is_empty() {
            Ok(ExtractOutcome::NoDisclosure)
        } else {
            Ok(ExtractOutcome::Rows(rows))
        }
    }

    /// Flatten one field and key each occurrence by class id.
    fn keyed_facts(&self, xbrl: &XbrlJson, field: &str) -> Result<Vec<KeyedFact>> {
        let Some(value) = xbrl.get(field) else {
            return Ok(Vec::new());
        };

        let mut unkeyed = 0;
        let mut keyed = Vec::new();
        for fact in flatten_field(field, value)? {
            let class_id = fact.segments.iter().find_map(|s| ClassId::extract(s));
            let key = match (class_id, self.policy) {
                (Some(id), _) => RowKey::Class(id),
                (None, ClassIdPolicy::Lenient) => {
                    unkeyed += 1;
                    RowKey::Unkeyed(unkeyed - 1)
                }
                (None, ClassIdPolicy::Strict) => continue,
            };
            keyed.push(KeyedFact { key, fact });
        }
        Ok(keyed)
    }
}

/// Join key for the two sides of a filing.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum RowKey {
    Class(ClassId),
    /// Position among the field's facts that carry no class id.
    Unkeyed(usize),
}

impl RowKey {
    fn class_id(&self) -> Option<ClassId> {
        match self {
            Self::Class(id) => Some(id.clone()),
            Self::Unkeyed(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Period {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl Period {
    const fn is_dated(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }
}

/// One occurrence of a field.
#[derive(Clone, Debug, Default, PartialEq)]
struct Fact {
    value: Option<String>,
    segments: Vec<String>,
    period: Period,
}

#[derive(Debug)]
struct KeyedFact {
    key: RowKey,
    fact: Fact,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct ExpenseFacts {
    pct: Option<f64>,
    amt: Option<f64>,
    text: Option<String>,
    period: Option<Period>,
    fallback_period: Option<Period>,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct PerformanceFacts {
    table_text: Option<String>,
    pct: Option<f64>,
}

/// Insertion-ordered map from key to accumulated facts.
#[derive(Debug)]
struct KeyedSide<T> {
    entries: Vec<(RowKey, T)>,
    index: HashMap<RowKey, usize>,
}

impl<T> Default for KeyedSide<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Default> KeyedSide<T> {
    fn entry(&mut self, key: RowKey) -> &mut T {
        let idx = match self.index.get(&key) {
            Some(&idx) => idx,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, T::default()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx].1
    }

    fn into_vec(self) -> Vec<(RowKey, T)> {
        self.entries
    }
}

/// Full outer join on key. Left keys keep their order, right-only keys follow.
fn outer_join<K, L, R>(left: Vec<(K, L)>, right: Vec<(K, R)>) -> Vec<(K, Option<L>, Option<R>)>
where
    K: Eq + Hash + Clone,
{
    let mut right_by_key: HashMap<K, R> = HashMap::with_capacity(right.len());
    let mut right_order = Vec::with_capacity(right.len());
    for (key, value) in right {
        if !right_by_key.contains_key(&key) {
            right_order.push(key.clone());
            right_by_key.insert(key, value);
        }
    }

    let mut joined = Vec::with_capacity(left.len() + right_order.len());
    for (key, value) in left {
        let matched = right_by_key.remove(&key);
        joined.push((key, Some(value), matched));
    }
    for key in right_order {
        if let Some(value) = right_by_key.remove(&key) {
            joined.push((key, None, Some(value)));
        }
    }
    joined
}

/// Flatten a field that is either one occurrence or a list of occurrences.
fn flatten_field(field: &str, value: &Value) -> Result<Vec<Fact>> {
    match value {
        Value::Array(items) => items.iter().map(|item| parse_fact(field, item)).collect(),
        Value::Object(_) => Ok(vec![parse_fact(field, value)?]),
        Value::Null => Ok(Vec::new()),
        _ => Err(NcsrError::Parse(format!(
            "{field}: expected an object or a list of objects"
        ))),
    }
}

fn parse_fact(field: &str, item: &Value) -> Result<Fact> {
    let Value::Object(obj) = item else {
        return Err(NcsrError::Parse(format!("{field}: occurrence is not an object")));
    };

    let value = match obj.get("value") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(_) => {
            return Err(NcsrError::Parse(format!("{field}: unsupported value type")));
        }
    };

    let segments = match obj.get("segment") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Object(segment)) => segment_value(segment).into_iter().collect(),
        Some(Value::Array(segments)) => segments
            .iter()
            .map(|s| match s {
                Value::Object(segment) => Ok(segment_value(segment)),
                _ => Err(NcsrError::Parse(format!("{field}: segment is not an object"))),
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect(),
        Some(_) => {
            return Err(NcsrError::Parse(format!("{field}: malformed segment")));
        }
    };

    let period = match obj.get("period") {
        Some(Value::Object(period)) => Period {
            start: date_field(period, "startDate"),
            end: date_field(period, "endDate").or_else(|| date_field(period, "instant")),
        },
        _ => Period::default(),
    };

    Ok(Fact {
        value,
        segments,
        period,
    })
}

fn segment_value(segment: &Map<String, Value>) -> Option<String> {
    segment
        .get("value")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn date_field(period: &Map<String, Value>, name: &str) -> Option<NaiveDate> {
    period
        .get(name)
        .and_then(Value::as_str)
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
}

fn parse_number(field: &str, value: Option<&str>) -> Result<Option<f64>> {
    let Some(raw) = value.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    raw.replace(',', "")
        .parse::<f64>()
        .map(Some)
        .map_err(|_| NcsrError::Parse(format!("{field}: not a number: {raw:?}")))
}

/// Replace embedded line breaks with single spaces.
fn flatten_text(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    const URL: &str = "https://www.sec.gov/Archives/edgar/data/819118/d1.htm";

    #[derive(Debug)]
    struct StaticConverter(Value);

    #[async_trait]
    impl XbrlConverter for StaticConverter {
        fn name(&self) -> &str {
            "static"
        }

        async fn xbrl_to_json(&self, _filing_url: &str) -> Result<XbrlJson> {
            match &self.0 {
                Value::Object(map) => Ok(XbrlJson::from(map.clone())),
                _ => Err(NcsrError::Parse("not an object".to_string())),
            }
        }
    }

    fn extractor(policy: ClassIdPolicy, body: Value) -> DisclosureExtractor {
        DisclosureExtractor::new(Arc::new(StaticConverter(body)), policy)
    }

    fn class_fact(value: Value, class: &str) -> Value {
        json!({
            "value": value,
            "period": {"startDate": "2023-07-01", "endDate": "2024-06-30"},
            "segment": {"dimension": "oef:ClassAxis", "value": format!("ck0000819118:{class}Member")}
        })
    }

    fn id(s: &str) -> Option<ClassId> {
        Some(ClassId::parse(s).unwrap())
    }

    #[tokio::test]
    async fn test_one_row_per_class() {
        let body = json!({
            "ExpenseRatioPct": [
                class_fact(json!("0.0062"), "C000012345"),
                class_fact(json!("0.0137"), "C000012346"),
            ],
            "ExpensesPaidAmt": [
                class_fact(json!("31"), "C000012345"),
                class_fact(json!(70), "C000012346"),
            ],
            "ExpensesTextBlock": [
                class_fact(json!("What were the Fund costs\nfor the last year?"), "C000012345"),
            ],
            "AvgAnnlRtrTableTextBlock": [
                class_fact(json!("Class A\r\n1 Year 8.1%"), "C000012345"),
                class_fact(json!("Class C\n1 Year 7.2%"), "C000012346"),
            ],
            "AvgAnnlRtrPct": [
                class_fact(json!("0.081"), "C000012345"),
                class_fact(json!("0.055"), "C000012345"),
                class_fact(json!("0.072"), "C000012346"),
            ],
        });

        let rows = extractor(ClassIdPolicy::Lenient, body)
            .extract(URL)
            .await
            .unwrap()
            .into_rows();

        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.class_id, id("C000012345"));
        assert_eq!(first.expense_pct, Some(0.0062));
        assert_eq!(first.expense_amt, Some(31.0));
        assert_eq!(
            first.expense_text.as_deref(),
            Some("What were the Fund costs for the last year?")
        );
        assert_eq!(first.return_table_text.as_deref(), Some("Class A 1 Year 8.1%"));
        assert_eq!(first.performance_pct, Some(0.081));
        assert_eq!(first.period_end, NaiveDate::from_ymd_opt(2024, 6, 30));
        assert!(first.has_performance_data);
        assert_eq!(first.filing_url, URL);

        let second = &rows[1];
        assert_eq!(second.class_id, id("C000012346"));
        assert_eq!(second.expense_amt, Some(70.0));
        assert_eq!(second.expense_text, None);
        assert_eq!(second.performance_pct, Some(0.072));
    }

    #[test]
    fn test_expense_only_and_performance_only_classes_merge() {
        let body = json!({
            "ExpensesPaidAmt": [class_fact(json!("12"), "C000000001")],
            "AvgAnnlRtrPct": [class_fact(json!("0.05"), "C000000001")],
        });
        let Value::Object(map) = body else { unreachable!() };

        let outcome = extractor(ClassIdPolicy::Strict, Value::Null)
            .extract_from_json(URL, &XbrlJson::from(map))
            .unwrap();
        let rows = outcome.into_rows();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].expense_amt, Some(12.0));
        assert_eq!(rows[0].performance_pct, Some(0.05));
        assert!(!rows[0].has_performance_data);
    }

    #[test]
    fn test_outer_join_keeps_one_sided_keys() {
        let joined = outer_join(
            vec![("a", 1), ("b", 2)],
            vec![("c", "x"), ("a", "y"), ("c", "z")],
        );
        assert_eq!(
            joined,
            vec![
                ("a", Some(1), Some("y")),
                ("b", Some(2), None),
                ("c", None, Some("x")),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_expense_fields_is_no_disclosure() {
        let body = json!({
            "AvgAnnlRtrTableTextBlock": [class_fact(json!("table"), "C000000001")],
        });
        let outcome = extractor(ClassIdPolicy::Lenient, body)
            .extract(URL)
            .await
            .unwrap();
        assert_eq!(outcome, ExtractOutcome::NoDisclosure);
    }

    #[tokio::test]
    async fn test_unkeyed_facts_by_policy() {
        let body = json!({
            "ExpenseRatioPct": [
                {"value": "0.0050", "period": {"startDate": "2023-01-01", "endDate": "2023-12-31"}},
                class_fact(json!("0.0075"), "C000000002"),
            ],
            "ExpensesPaidAmt": {"value": "25"},
            "AvgAnnlRtrTableTextBlock": {"value": "Fund\n10.2%"},
        });

        let lenient = extractor(ClassIdPolicy::Lenient, body.clone())
            .extract(URL)
            .await
            .unwrap()
            .into_rows();
        assert_eq!(lenient.len(), 2);
        assert_eq!(lenient[0].class_id, None);
        assert_eq!(lenient[0].expense_pct, Some(0.005));
        assert_eq!(lenient[0].expense_amt, Some(25.0));
        assert_eq!(lenient[0].return_table_text.as_deref(), Some("Fund 10.2%"));
        assert_eq!(lenient[0].period_end, NaiveDate::from_ymd_opt(2023, 12, 31));
        assert_eq!(lenient[1].class_id, id("C000000002"));

        let strict = extractor(ClassIdPolicy::Strict, body)
            .extract(URL)
            .await
            .unwrap()
            .into_rows();
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].class_id, id("C000000002"));
        assert_eq!(strict[0].expense_amt, None);
        assert!(strict[0].has_performance_data);
    }

    #[tokio::test]
    async fn test_strict_policy_with_nothing_keyed_is_no_disclosure() {
        let body = json!({"ExpensesPaidAmt": [{"value": "25"}]});
        let outcome = extractor(ClassIdPolicy::Strict, body)
            .extract(URL)
            .await
            .unwrap();
        assert_eq!(outcome, ExtractOutcome::NoDisclosure);
    }

    #[test]
    fn test_segment_list_uses_first_class_id() {
        let fact = parse_fact(
            "ExpenseRatioPct",
            &json!({
                "value": "0.01",
                "segment": [
                    {"dimension": "dei:LegalEntityAxis", "value": "ck0000819118:S000001111Member"},
                    {"dimension": "oef:ClassAxis", "value": "ck0000819118:C000002222Member"},
                    {"dimension": "oef:ClassAxis", "value": "ck0000819118:C000003333Member"}
                ]
            }),
        )
        .unwrap();
        let class_id = fact.segments.iter().find_map(|s| ClassId::extract(s));
        assert_eq!(class_id, id("C000002222"));
    }

    #[tokio::test]
    async fn test_malformed_response_is_error() {
        let bad_field = json!({"ExpenseRatioPct": "0.01"});
        assert!(
            extractor(ClassIdPolicy::Lenient, bad_field)
                .extract(URL)
                .await
                .is_err()
        );

        let bad_number = json!({"ExpensesPaidAmt": [class_fact(json!("n/a"), "C000000001")]});
        assert!(
            extractor(ClassIdPolicy::Lenient, bad_number)
                .extract(URL)
                .await
                .is_err()
        );
    }

    #[test]
    fn test_flatten_text() {
        assert_eq!(flatten_text("a\nb\r\nc\rd"), "a b c d");
        assert_eq!(flatten_text("no breaks"), "no breaks");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("f", Some(" 1,250 ")).unwrap(), Some(1250.0));
        assert_eq!(parse_number("f", Some("")).unwrap(), None);
        assert_eq!(parse_number("f", None).unwrap(), None);
        assert!(parse_number("f", Some("12%")).is_err());
    }
}
