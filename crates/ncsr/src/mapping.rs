//! Class/series reference table.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use ncsr_core::{ClassId, ClassMappingEntry, NcsrError, Result};
use tracing::{debug, warn};

/// Canonical names of the required columns, in lookup order.
const REQUIRED_COLUMNS: [&str; 5] = ["classId", "ticker", "className", "seriesName", "seriesId"];

/// Canonical name of the optional entity column.
const ENTITY_COLUMN: &str = "entityName";

/// The class/series reference table, keyed by class id.
///
/// Loaded once per run and read-only afterwards.
#[derive(Debug, Clone)]
pub struct ClassMapping {
    path: PathBuf,
    entries: Vec<ClassMappingEntry>,
    index: HashMap<ClassId, usize>,
    has_entity_names: bool,
}

impl ClassMapping {
    /// Load the table from a CSV file.
    ///
    /// Headers match ignoring case, spaces, `_` and `-`, so `classid`,
    /// `Class Name` and `series_id` are all accepted.
    ///
    /// # Errors
    ///
    /// [`NcsrError::MissingReferenceFile`] when the file does not exist and
    /// [`NcsrError::MissingColumns`] when a required column is absent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(NcsrError::MissingReferenceFile(path.to_path_buf()));
        }
        let file = File::open(path)?;
        Self::from_reader(file, path)
    }

    /// Read the table from any reader. `path` is only used in messages.
    pub fn from_reader<R: Read>(reader: R, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let columns = Columns::resolve(&headers, &path)?;

        let mut entries: Vec<ClassMappingEntry> = Vec::new();
        let mut index = HashMap::new();

        for (line, record) in reader.records().enumerate() {
            let record = record?;
            // 1-indexed plus the header row
            let line = line + 2;

            let raw_id = record.get(columns.class_id).unwrap_or_default();
            let Ok(class_id) = ClassId::parse(raw_id) else {
                warn!(path = %path.display(), line, class_id = raw_id, "Skipping reference row with invalid class id");
                continue;
            };

            match index.entry(class_id.clone()) {
                Entry::Occupied(_) => {
                    warn!(path = %path.display(), line, %class_id, "Duplicate class id in reference table, keeping the first");
                }
                Entry::Vacant(slot) => {
                    slot.insert(entries.len());
                    entries.push(columns.entry(class_id, &record));
                }
            }
        }

        debug!(path = %path.display(), entries = entries.len(), "Loaded class mapping");

        Ok(Self {
            path,
            entries,
            index,
            has_entity_names: columns.entity_name.is_some(),
        })
    }

    /// Build a table from entries directly. Later duplicates are ignored.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = ClassMappingEntry>) -> Self {
        let mut kept = Vec::new();
        let mut index = HashMap::new();
        for entry in entries {
            if let Entry::Vacant(slot) = index.entry(entry.class_id.clone()) {
                slot.insert(kept.len());
                kept.push(entry);
            }
        }
        let has_entity_names = kept.iter().any(|e| e.entity_name.is_some());
        Self {
            path: PathBuf::new(),
            entries: kept,
            index,
            has_entity_names,
        }
    }

    /// Look up a class.
    #[must_use]
    pub fn get(&self, class_id: &ClassId) -> Option<&ClassMappingEntry> {
        self.index.get(class_id).map(|&i| &self.entries[i])
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in file order.
    pub fn iter(&self) -> impl Iterator<Item = &ClassMappingEntry> {
        self.entries.iter()
    }

    /// Whether the table has an entity name column.
    #[must_use]
    pub const fn has_entity_names(&self) -> bool {
        self.has_entity_names
    }

    /// Path the table was loaded from (empty when built in memory).
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Positions of the known columns in the header row.
#[derive(Debug)]
struct Columns {
    class_id: usize,
    ticker: usize,
    class_name: usize,
    series_name: usize,
    series_id: usize,
    entity_name: Option<usize>,
}

impl Columns {
    fn resolve(headers: &StringRecord, path: &Path) -> Result<Self> {
        let normalized: Vec<String> = headers.iter().map(normalize_header).collect();
        let position = |canonical: &str| {
            let wanted = normalize_header(canonical);
            normalized.iter().position(|h| *h == wanted)
        };

        let found: Vec<Option<usize>> = REQUIRED_COLUMNS.iter().map(|c| position(*c)).collect();
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .zip(&found)
            .filter(|(_, pos)| pos.is_none())
            .map(|(name, _)| (*name).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(NcsrError::MissingColumns {
                path: path.to_path_buf(),
                columns: missing,
            });
        }

        let at = |i: usize| found[i].unwrap_or_default();
        Ok(Self {
            class_id: at(0),
            ticker: at(1),
            class_name: at(2),
            series_name: at(3),
            series_id: at(4),
            entity_name: position(ENTITY_COLUMN),
        })
    }

    fn entry(&self, class_id: ClassId, record: &StringRecord) -> ClassMappingEntry {
        let text = |i: usize| record.get(i).unwrap_or_default().to_string();
        ClassMappingEntry {
            class_id,
            ticker: text(self.ticker),
            class_name: text(self.class_name),
            series_name: text(self.series_name),
            series_id: text(self.series_id),
            entity_name: self
                .entity_name
                .and_then(|i| record.get(i))
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }
}

/// Lowercase and drop spaces, underscores and hyphens.
fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TABLE: &str = "\
classid,Ticker,Class Name,Series Name,Series ID,Entity Name
C000012345,ABCX,Class A,Example Growth Fund,S000001111,Example Funds
C000012346,ABCY,Class C,Example Growth Fund,S000001111,Example Funds
not-a-class,ZZZZ,Bogus,Bogus,S000000000,Bogus
C000012345,DUPE,Duplicate,Duplicate,S000009999,Other
";

    fn write_table(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load() {
        let file = write_table(TABLE);
        let mapping = ClassMapping::load(file.path()).unwrap();

        assert_eq!(mapping.len(), 2);
        assert!(mapping.has_entity_names());
        assert_eq!(mapping.path(), file.path());

        let entry = mapping.get(&ClassId::parse("C000012345").unwrap()).unwrap();
        assert_eq!(entry.ticker, "ABCX");
        assert_eq!(entry.class_name, "Class A");
        assert_eq!(entry.series_id, "S000001111");
        assert_eq!(entry.entity_name.as_deref(), Some("Example Funds"));
        assert!(mapping.get(&ClassId::parse("C999999999").unwrap()).is_none());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("class_series_mapping.csv");
        let err = ClassMapping::load(&path).unwrap_err();
        assert!(matches!(err, NcsrError::MissingReferenceFile(p) if p == path));
    }

    #[test]
    fn test_missing_columns_are_named() {
        let file = write_table("Ticker,Class Name,Series Name\nABCX,Class A,Fund\n");
        let err = ClassMapping::load(file.path()).unwrap_err();
        match err {
            NcsrError::MissingColumns { columns, .. } => {
                assert_eq!(columns, vec!["classId", "seriesId"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_entity_column_is_optional() {
        let mapping = ClassMapping::from_reader(
            "class_id,ticker,class_name,series_name,series_id\nC000000001,T,A,F,S000000001\n"
                .as_bytes(),
            "inline.csv",
        )
        .unwrap();
        assert_eq!(mapping.len(), 1);
        assert!(!mapping.has_entity_names());
    }

    #[rstest]
    #[case("classid", "classid")]
    #[case("Class Name", "classname")]
    #[case("series_id", "seriesid")]
    #[case("Series-Name", "seriesname")]
    #[case("classId", "classid")]
    fn test_normalize_header(#[case] header: &str, #[case] expected: &str) {
        assert_eq!(normalize_header(header), expected);
    }
}
