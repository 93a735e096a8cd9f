// 📂 Source Loader & Deduplicator - Scraped NDJSON → phone-keyed records
// One JSON object per line; malformed lines are expected scraping noise

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

// ============================================================================
// SCRAPED RECORD
// ============================================================================

/// One external business record, keyed by phone number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedRecord {
    pub external_id: Option<String>,
    pub name: String,
    pub phone: String,
    pub trade: String,
    pub dept_code: String,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub website: Option<String>,
    pub city: Option<String>,
}

impl ScrapedRecord {
    /// Fill-missing merge: keep `self` as the base and take from `other`
    /// only the fields the base lacks. Fields already set are never
    /// overwritten during loading.
    pub fn enrich_from(&mut self, other: ScrapedRecord) {
        if self.external_id.is_none() {
            self.external_id = other.external_id;
        }
        if self.city.is_none() {
            self.city = other.city;
        }
        if self.website.is_none() {
            self.website = other.website;
        }
        if self.rating.is_none() {
            self.rating = other.rating;
        }
        if self.review_count.is_none() {
            self.review_count = other.review_count;
        }
    }
}

/// Raw line as scraped - everything optional until validated.
#[derive(Debug, Deserialize)]
struct RawLine {
    #[serde(rename = "gmId")]
    gm_id: Option<String>,
    name: Option<String>,
    phone: Option<String>,
    trade: Option<String>,
    #[serde(rename = "deptCode")]
    dept_code: Option<String>,
    rating: Option<f64>,
    #[serde(rename = "reviewCount")]
    review_count: Option<i64>,
    website: Option<String>,
    city: Option<String>,
}

impl RawLine {
    /// Promote to a ScrapedRecord if the required fields are present and
    /// non-empty (`phone`, `name`, `deptCode`).
    fn validate(self) -> Option<ScrapedRecord> {
        let name = self.name.filter(|s| !s.trim().is_empty())?;
        let phone = self.phone.filter(|s| !s.trim().is_empty())?;
        let dept_code = self.dept_code.filter(|s| !s.trim().is_empty())?;

        Some(ScrapedRecord {
            external_id: self.gm_id,
            name,
            phone,
            trade: self.trade.unwrap_or_default(),
            dept_code,
            rating: self.rating,
            review_count: self.review_count,
            website: self.website,
            city: self.city,
        })
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// Load and deduplicate a set of NDJSON source files.
///
/// Produces a phone-keyed map (BTreeMap, so iteration order is stable across
/// runs). Lines that fail to parse or lack a required field are silently
/// skipped - they are not errors, just scraping noise. Duplicate phones are
/// merged fill-missing via [`ScrapedRecord::enrich_from`].
pub fn load_source_files<P: AsRef<Path>>(paths: &[P]) -> Result<BTreeMap<String, ScrapedRecord>> {
    let mut records: BTreeMap<String, ScrapedRecord> = BTreeMap::new();

    for path in paths {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open source file {}", path.display()))?;

        for line in BufReader::new(file).lines() {
            let line = line
                .with_context(|| format!("Failed to read from {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }

            let raw: RawLine = match serde_json::from_str(&line) {
                Ok(raw) => raw,
                Err(_) => continue, // malformed line, skip silently
            };
            let record = match raw.validate() {
                Some(record) => record,
                None => continue, // missing required field, skip silently
            };

            match records.get_mut(&record.phone) {
                Some(existing) => existing.enrich_from(record),
                None => {
                    records.insert(record.phone.clone(), record);
                }
            }
        }
    }

    Ok(records)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_source(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_load_valid_lines() {
        let file = write_source(&[
            r#"{"gmId":"g1","name":"Plomberie Martin","phone":"0600000001","trade":"plombier","deptCode":"75","rating":4.5,"reviewCount":42,"website":"https://martin.fr","city":"Paris"}"#,
            r#"{"name":"Couverture Leroy","phone":"0600000002","trade":"couvreur","deptCode":"33"}"#,
        ]);

        let records = load_source_files(&[file.path()]).unwrap();
        assert_eq!(records.len(), 2);

        let martin = &records["0600000001"];
        assert_eq!(martin.name, "Plomberie Martin");
        assert_eq!(martin.dept_code, "75");
        assert_eq!(martin.rating, Some(4.5));
        assert_eq!(martin.city.as_deref(), Some("Paris"));

        let leroy = &records["0600000002"];
        assert_eq!(leroy.trade, "couvreur");
        assert!(leroy.website.is_none());
    }

    #[test]
    fn test_malformed_and_incomplete_lines_skipped() {
        let file = write_source(&[
            "not json at all",
            r#"{"name":"No Phone","trade":"plombier","deptCode":"75"}"#,
            r#"{"phone":"0600000009","trade":"plombier","deptCode":"75"}"#,
            r#"{"name":"No Dept","phone":"0600000008","trade":"plombier"}"#,
            r#"{"name":"","phone":"0600000007","deptCode":"75"}"#,
            r#"{"name":"Valid One","phone":"0600000001","trade":"plombier","deptCode":"75"}"#,
        ]);

        let records = load_source_files(&[file.path()]).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records["0600000001"].name, "Valid One");
    }

    #[test]
    fn test_duplicate_phone_fill_missing_merge() {
        let file = write_source(&[
            r#"{"name":"Plomberie Martin","phone":"0600000001","trade":"plombier","deptCode":"75","website":"https://martin.fr"}"#,
            r#"{"name":"Martin SARL","phone":"0600000001","trade":"plombier","deptCode":"75","website":"https://other.fr","city":"Paris","rating":4.2}"#,
        ]);

        let records = load_source_files(&[file.path()]).unwrap();
        assert_eq!(records.len(), 1);

        let merged = &records["0600000001"];
        // Base record wins for fields it already has
        assert_eq!(merged.name, "Plomberie Martin");
        assert_eq!(merged.website.as_deref(), Some("https://martin.fr"));
        // Missing fields are filled from the later duplicate
        assert_eq!(merged.city.as_deref(), Some("Paris"));
        assert_eq!(merged.rating, Some(4.2));
    }

    #[test]
    fn test_merge_across_files() {
        let first = write_source(&[
            r#"{"name":"Plomberie Martin","phone":"0600000001","trade":"plombier","deptCode":"75"}"#,
        ]);
        let second = write_source(&[
            r#"{"name":"Martin","phone":"0600000001","trade":"plombier","deptCode":"75","reviewCount":12}"#,
        ]);

        let records = load_source_files(&[first.path(), second.path()]).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records["0600000001"].name, "Plomberie Martin");
        assert_eq!(records["0600000001"].review_count, Some(12));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = load_source_files(&["/nonexistent/path/records.ndjson"]);
        assert!(result.is_err());
    }
}
