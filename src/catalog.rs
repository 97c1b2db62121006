use include_dir::{include_dir, Dir};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

static WORDS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/words");

const EMBEDDED_FILE: &str = "embedded.csv";

/// Words are served in fixed batches of this size, in catalog order.
pub const SET_SIZE: usize = 10;

pub const DEFAULT_MEANING: &str = "Word definition";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read word list: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse word list: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to fetch word list: {0}")]
    Http(#[from] reqwest::Error),
    #[error("word list request returned HTTP {0}")]
    Status(u16),
    #[error("required columns not found (Grade, Subject, Word). Found: {found}")]
    MissingColumns { found: String },
    #[error("no words found; check column names (Grade, Subject, Word, Meaning, IPA)")]
    Empty,
    #[error("embedded word list {0} is missing")]
    MissingEmbedded(&'static str),
}

/// A single catalog word, positioned within its (grade, subject) group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordEntry {
    pub grade: u32,
    pub subject: String,
    pub set_id: usize,
    pub index_in_set: usize,
    pub word: String,
    pub meaning: String,
    pub ipa: String,
}

/// A word as it comes out of a source, before it is bucketed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawWord {
    pub grade: u32,
    pub subject: String,
    pub word: String,
    pub meaning: String,
    pub ipa: String,
}

impl RawWord {
    pub fn new(grade: u32, subject: &str, word: &str) -> Self {
        Self {
            grade,
            subject: subject.to_string(),
            word: word.to_string(),
            meaning: DEFAULT_MEANING.to_string(),
            ipa: String::new(),
        }
    }
}

/// Word lists grouped by grade and subject, with stable ordering.
#[derive(Debug, Clone, Default)]
pub struct WordCatalog {
    groups: BTreeMap<(u32, String), Vec<WordEntry>>,
}

impl WordCatalog {
    /// Buckets words into sets in a single pass over the input.
    pub fn from_entries<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = RawWord>,
    {
        let mut groups: BTreeMap<(u32, String), Vec<WordEntry>> = BTreeMap::new();

        for row in rows {
            let group = groups.entry((row.grade, row.subject.clone())).or_default();
            let index_in_set = group.len();
            group.push(WordEntry {
                grade: row.grade,
                subject: row.subject,
                set_id: index_in_set / SET_SIZE,
                index_in_set,
                word: row.word,
                meaning: row.meaning,
                ipa: row.ipa,
            });
        }

        Self { groups }
    }

    /// The word list compiled into the binary.
    pub fn embedded() -> Result<Self, CatalogError> {
        let file = WORDS_DIR
            .get_file(EMBEDDED_FILE)
            .ok_or(CatalogError::MissingEmbedded(EMBEDDED_FILE))?;
        let text = file
            .contents_utf8()
            .ok_or(CatalogError::MissingEmbedded(EMBEDDED_FILE))?;
        Self::from_csv_str(text)
    }

    /// Loads from a CSV path or an http(s) URL; `None` means the embedded list.
    pub fn load(source: Option<&str>) -> Result<Self, CatalogError> {
        let catalog = match source {
            None => Self::embedded()?,
            Some(s) if s.starts_with("http://") || s.starts_with("https://") => Self::from_url(s)?,
            Some(path) => Self::from_csv_path(path)?,
        };

        info!(
            words = catalog.len(),
            grades = catalog.grades().len(),
            source = source.unwrap_or("embedded"),
            "word catalog loaded"
        );
        Ok(catalog)
    }

    pub fn from_url(url: &str) -> Result<Self, CatalogError> {
        let response = reqwest::blocking::get(url)?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }
        let text = response.text()?;
        Self::from_csv_str(&text)
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }

    pub fn from_csv_str(text: &str) -> Result<Self, CatalogError> {
        Self::from_csv_reader(text.as_bytes())
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

        let (grade_idx, subject_idx, word_idx) =
            match (column("grade"), column("subject"), column("word")) {
                (Some(g), Some(s), Some(w)) => (g, s, w),
                _ => {
                    return Err(CatalogError::MissingColumns {
                        found: headers.iter().join(", "),
                    })
                }
            };
        let meaning_idx = column("meaning");
        let ipa_idx = column("ipa");

        let mut rows = Vec::new();
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            let field = |idx: usize| record.get(idx).map(str::trim).unwrap_or_default();

            let grade = field(grade_idx).parse::<u32>();
            let subject = field(subject_idx);
            let word = field(word_idx);

            match grade {
                Ok(grade) if !subject.is_empty() && !word.is_empty() => rows.push(RawWord {
                    grade,
                    subject: subject.to_string(),
                    word: word.to_string(),
                    meaning: meaning_idx
                        .map(field)
                        .filter(|m| !m.is_empty())
                        .unwrap_or(DEFAULT_MEANING)
                        .to_string(),
                    ipa: ipa_idx.map(|i| field(i).to_string()).unwrap_or_default(),
                }),
                _ => debug!(line = line + 2, "skipping incomplete word row"),
            }
        }

        if rows.is_empty() {
            return Err(CatalogError::Empty);
        }

        Ok(Self::from_entries(rows))
    }

    /// Words of one set, in catalog order. Empty when the set does not exist.
    pub fn words_for(&self, grade: u32, subject: &str, set_id: usize) -> &[WordEntry] {
        let words = self.words_in(grade, subject);
        let start = (set_id * SET_SIZE).min(words.len());
        let end = (start + SET_SIZE).min(words.len());
        &words[start..end]
    }

    /// Every word of a (grade, subject) group.
    pub fn words_in(&self, grade: u32, subject: &str) -> &[WordEntry] {
        self.groups
            .get(&(grade, subject.to_string()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn set_count(&self, grade: u32, subject: &str) -> usize {
        self.words_in(grade, subject).len().div_ceil(SET_SIZE)
    }

    /// Subjects for a grade, sorted.
    pub fn subjects_for(&self, grade: u32) -> Vec<String> {
        self.groups
            .keys()
            .filter(|(g, _)| *g == grade)
            .map(|(_, subject)| subject.clone())
            .collect()
    }

    pub fn grades(&self) -> Vec<u32> {
        self.groups.keys().map(|(grade, _)| *grade).dedup().collect()
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn numbered(grade: u32, subject: &str, count: usize) -> Vec<RawWord> {
        (0..count)
            .map(|i| RawWord::new(grade, subject, &format!("word{i}")))
            .collect()
    }

    #[test]
    fn buckets_twenty_five_words_into_three_sets() {
        let catalog = WordCatalog::from_entries(numbered(3, "English", 25));

        assert_eq!(catalog.set_count(3, "English"), 3);
        assert_eq!(catalog.words_for(3, "English", 0).len(), 10);
        assert_eq!(catalog.words_for(3, "English", 1).len(), 10);
        assert_eq!(catalog.words_for(3, "English", 2).len(), 5);
        assert!(catalog.words_for(3, "English", 3).is_empty());
    }

    #[test]
    fn indices_are_contiguous_per_group() {
        let mut rows = numbered(1, "English", 12);
        // Interleave another group to make sure positions are tracked per group
        rows.insert(3, RawWord::new(1, "Science", "atom"));
        rows.insert(7, RawWord::new(2, "English", "river"));
        let catalog = WordCatalog::from_entries(rows);

        let english = catalog.words_in(1, "English");
        for (i, entry) in english.iter().enumerate() {
            assert_eq!(entry.index_in_set, i);
            assert_eq!(entry.set_id, i / SET_SIZE);
        }
        assert_eq!(english[10].word, "word10");
        assert_eq!(catalog.words_in(1, "Science")[0].index_in_set, 0);
        assert_eq!(catalog.words_in(2, "English")[0].set_id, 0);
    }

    #[test]
    fn set_count_for_unknown_group_is_zero() {
        let catalog = WordCatalog::from_entries(numbered(1, "English", 3));
        assert_eq!(catalog.set_count(1, "Math"), 0);
        assert_eq!(catalog.set_count(9, "English"), 0);
        assert!(catalog.words_for(9, "English", 0).is_empty());
    }

    #[test]
    fn subjects_are_sorted_and_grades_deduplicated() {
        let rows = vec![
            RawWord::new(2, "Science", "atom"),
            RawWord::new(2, "English", "river"),
            RawWord::new(1, "English", "cat"),
            RawWord::new(2, "Science", "cell"),
        ];
        let catalog = WordCatalog::from_entries(rows);

        assert_eq!(catalog.subjects_for(2), vec!["English", "Science"]);
        assert!(catalog.subjects_for(4).is_empty());
        assert_eq!(catalog.grades(), vec![1, 2]);
        assert_eq!(catalog.len(), 4);
    }

    #[test]
    fn csv_headers_are_case_insensitive() {
        let csv = "grade , SUBJECT,Word,meaning,Ipa\n1,English,cat,\"A pet, furry\",kæt\n";
        let catalog = WordCatalog::from_csv_str(csv).unwrap();

        let words = catalog.words_for(1, "English", 0);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].word, "cat");
        assert_eq!(words[0].meaning, "A pet, furry");
        assert_eq!(words[0].ipa, "kæt");
    }

    #[test]
    fn csv_optional_columns_get_defaults() {
        let csv = "Word,Grade,Subject\ndog,2,English\n";
        let catalog = WordCatalog::from_csv_str(csv).unwrap();

        let entry = &catalog.words_in(2, "English")[0];
        assert_eq!(entry.meaning, DEFAULT_MEANING);
        assert_eq!(entry.ipa, "");
    }

    #[test]
    fn csv_skips_invalid_rows() {
        let csv = "Grade,Subject,Word\n\
                   one,English,cat\n\
                   1,,dog\n\
                   1,English,\n\
                   1,English\n\
                   1,English,sun\n";
        let catalog = WordCatalog::from_csv_str(csv).unwrap();

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.words_in(1, "English")[0].word, "sun");
    }

    #[test]
    fn csv_missing_required_columns() {
        let result = WordCatalog::from_csv_str("Grade,Word\n1,cat\n");
        assert_matches!(result, Err(CatalogError::MissingColumns { found }) if found == "Grade, Word");
    }

    #[test]
    fn csv_without_valid_rows_is_empty() {
        assert_matches!(
            WordCatalog::from_csv_str("Grade,Subject,Word\n"),
            Err(CatalogError::Empty)
        );
        assert_matches!(
            WordCatalog::from_csv_str("Grade,Subject,Word\nx,English,cat\n"),
            Err(CatalogError::Empty)
        );
    }

    #[test]
    fn csv_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.csv");
        std::fs::write(&path, "Grade,Subject,Word\n4,History,empire\n").unwrap();

        let catalog = WordCatalog::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(catalog.subjects_for(4), vec!["History"]);
    }

    #[test]
    fn missing_path_is_io_error() {
        assert_matches!(
            WordCatalog::load(Some("/definitely/not/here.csv")),
            Err(CatalogError::Io(_))
        );
    }

    #[test]
    fn embedded_catalog_has_five_grades() {
        let catalog = WordCatalog::embedded().unwrap();

        assert_eq!(catalog.grades(), vec![1, 2, 3, 4, 5]);
        assert_eq!(catalog.len(), 50);
        for grade in 1..=5 {
            assert_eq!(catalog.subjects_for(grade), vec!["English"]);
            assert_eq!(catalog.set_count(grade, "English"), 1);
        }
        let first = &catalog.words_for(1, "English", 0)[0];
        assert_eq!(first.word, "cat");
        assert_eq!(first.ipa, "kæt");
        assert_eq!(
            catalog.words_for(1, "English", 0)[1].meaning,
            "A domestic animal, man's best friend"
        );
    }
}
