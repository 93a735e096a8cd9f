// 🗄️ Directory Store - Queryable, conditionally-writable entity table
// Single reconnectable SQLite session; all engine storage calls go through here

use anyhow::{Context, Result};
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::loader::ScrapedRecord;

/// Column length limit for `website`.
pub const MAX_WEBSITE_LEN: usize = 255;

/// Upper sanity bound for scraped review counts. Corrupted scrapes show up
/// with values in the billions; anything at or above this is dropped while
/// the phone assignment still goes through.
pub const MAX_REVIEW_COUNT: i64 = 1_000_000;

/// SQLite caps bound parameters per statement; chunk IN (...) lists.
const IN_CLAUSE_CHUNK: usize = 500;

// ============================================================================
// ENTITY
// ============================================================================

/// A pre-existing row in the directory store. Never created or deleted by
/// the engine - only conditionally updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    pub name: String,
    pub department: String,
    pub city: Option<String>,
    pub specialty: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub rating_average: Option<String>,
    pub review_count: Option<i64>,
}

// ============================================================================
// PHONE CLAIM
// ============================================================================

/// The fields a successful match writes to its target entity.
///
/// `phone` is always set. The optional fields are guarded twice: sanitized
/// here from the scraped record, and CASE-guarded in the UPDATE so they only
/// land where the target's own value is still missing.
#[derive(Debug, Clone)]
pub struct PhoneClaim {
    pub entity_id: i64,
    pub phone: String,
    pub website: Option<String>,
    pub rating: Option<String>,
    pub review_count: Option<i64>,
}

impl PhoneClaim {
    pub fn from_record(entity_id: i64, record: &ScrapedRecord) -> Self {
        let website = record
            .website
            .as_ref()
            .map(|w| truncate_chars(w, MAX_WEBSITE_LEN));

        let review_count = record
            .review_count
            .filter(|&n| n >= 0 && n < MAX_REVIEW_COUNT);

        PhoneClaim {
            entity_id,
            phone: record.phone.clone(),
            website,
            rating: record.rating.map(|r| r.to_string()),
            review_count,
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// ============================================================================
// DIRECTORY STORE
// ============================================================================

/// Reconnectable handle on the directory database.
///
/// The engine treats the store purely as a queryable, conditionally-writable
/// table of entities. A connection-level failure is handled by dropping and
/// reopening the session ([`DirectoryStore::reconnect`]) rather than
/// retrying individual statements.
pub struct DirectoryStore {
    path: PathBuf,
    conn: Connection,
}

impl DirectoryStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open directory store {}", path.display()))?;

        Ok(DirectoryStore { path, conn })
    }

    /// Drop the current session and open a fresh one.
    pub fn reconnect(&mut self) -> Result<()> {
        self.conn = Connection::open(&self.path)
            .with_context(|| format!("Failed to reopen directory store {}", self.path.display()))?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // ------------------------------------------------------------------------
    // Candidate locator
    // ------------------------------------------------------------------------

    /// All phone-less entities in a department, ordered by id.
    ///
    /// With `specialties`, the result is additionally restricted at query
    /// time to `specialty IN (...)` - the strict pass's trade filter. The
    /// relaxed and aggressive passes fetch the whole department pool.
    pub fn find_phoneless(
        &self,
        department: &str,
        specialties: Option<&[String]>,
    ) -> Result<Vec<Entity>> {
        let mut sql = String::from(
            "SELECT id, name, department, city, specialty, phone, website,
                    rating_average, review_count
             FROM entities
             WHERE department = ?1 AND phone IS NULL",
        );

        let mut bound: Vec<String> = vec![department.to_string()];
        if let Some(specialties) = specialties {
            if specialties.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders: Vec<String> = (0..specialties.len())
                .map(|i| format!("?{}", i + 2))
                .collect();
            sql.push_str(&format!(" AND specialty IN ({})", placeholders.join(", ")));
            bound.extend(specialties.iter().cloned());
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = self.conn.prepare(&sql)?;
        let entities = stmt
            .query_map(params_from_iter(bound.iter()), |row| {
                Ok(Entity {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    department: row.get(2)?,
                    city: row.get(3)?,
                    specialty: row.get(4)?,
                    phone: row.get(5)?,
                    website: row.get(6)?,
                    rating_average: row.get(7)?,
                    review_count: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entities)
    }

    /// Which of the given phone numbers already exist in the store.
    /// Used once at run start to drop already-resolved records.
    pub fn existing_phones(&self, phones: &[String]) -> Result<HashSet<String>> {
        let mut existing = HashSet::new();

        for chunk in phones.chunks(IN_CLAUSE_CHUNK) {
            let placeholders: Vec<String> =
                (0..chunk.len()).map(|i| format!("?{}", i + 1)).collect();
            let sql = format!(
                "SELECT phone FROM entities WHERE phone IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = self.conn.prepare(&sql)?;
            let found = stmt
                .query_map(params_from_iter(chunk.iter()), |row| {
                    row.get::<_, String>(0)
                })?
                .collect::<Result<Vec<_>, _>>()?;
            existing.extend(found);
        }

        Ok(existing)
    }

    // ------------------------------------------------------------------------
    // Conditional merge writer
    // ------------------------------------------------------------------------

    /// Apply a claim to its target entity, conditioned on the target still
    /// being unclaimed (`phone IS NULL`) at write time.
    ///
    /// Returns the number of rows affected: 1 on success, 0 when another
    /// writer won the race. The optional fields never overwrite values the
    /// target already has.
    pub fn apply_claim(&self, claim: &PhoneClaim) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE entities SET
                phone = ?1,
                website = CASE
                    WHEN website IS NULL AND ?2 IS NOT NULL THEN ?2
                    ELSE website END,
                rating_average = CASE
                    WHEN (rating_average IS NULL OR rating_average = '0') AND ?3 IS NOT NULL THEN ?3
                    ELSE rating_average END,
                review_count = CASE
                    WHEN (review_count IS NULL OR review_count = 0) AND ?4 IS NOT NULL THEN ?4
                    ELSE review_count END
             WHERE id = ?5 AND phone IS NULL",
            params![
                claim.phone,
                claim.website,
                claim.rating,
                claim.review_count,
                claim.entity_id,
            ],
        )?;

        Ok(rows)
    }
}

// ============================================================================
// SCHEMA & SEEDING
// ============================================================================

/// Create the entities table and its indexes. The engine itself never
/// creates rows; this exists for seeding collaborators and tests.
pub fn setup_directory_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS entities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            department TEXT NOT NULL,
            city TEXT,
            specialty TEXT NOT NULL,
            phone TEXT,
            website TEXT,
            rating_average TEXT,
            review_count INTEGER
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entities_department_phone
         ON entities(department, phone)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entities_phone ON entities(phone)",
        [],
    )?;

    Ok(())
}

/// Insert one entity row, returning its id. Seeding/test helper.
pub fn insert_entity(conn: &Connection, entity: &Entity) -> Result<i64> {
    conn.execute(
        "INSERT INTO entities (
            name, department, city, specialty, phone, website,
            rating_average, review_count
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            entity.name,
            entity.department,
            entity.city,
            entity.specialty,
            entity.phone,
            entity.website,
            entity.rating_average,
            entity.review_count,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn test_entity(name: &str, department: &str, specialty: &str) -> Entity {
        Entity {
            id: 0,
            name: name.to_string(),
            department: department.to_string(),
            city: None,
            specialty: specialty.to_string(),
            phone: None,
            website: None,
            rating_average: None,
            review_count: None,
        }
    }

    fn test_record(phone: &str) -> ScrapedRecord {
        ScrapedRecord {
            external_id: None,
            name: "Plomberie Martin".to_string(),
            phone: phone.to_string(),
            trade: "plombier".to_string(),
            dept_code: "75".to_string(),
            rating: None,
            review_count: None,
            website: None,
            city: None,
        }
    }

    fn open_test_store() -> (NamedTempFile, DirectoryStore) {
        let file = NamedTempFile::new().unwrap();
        let store = DirectoryStore::open(file.path()).unwrap();
        setup_directory_schema(store.connection()).unwrap();
        (file, store)
    }

    #[test]
    fn test_find_phoneless_excludes_phoned_entities() {
        let (_file, store) = open_test_store();

        let mut with_phone = test_entity("Martin Plomberie", "75", "Plombier");
        with_phone.phone = Some("0100000000".to_string());
        insert_entity(store.connection(), &with_phone).unwrap();

        let without = test_entity("Dupont Plomberie", "75", "Plombier");
        insert_entity(store.connection(), &without).unwrap();

        let candidates = store.find_phoneless("75", None).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "Dupont Plomberie");
    }

    #[test]
    fn test_find_phoneless_specialty_filter() {
        let (_file, store) = open_test_store();

        insert_entity(
            store.connection(),
            &test_entity("Martin Plomberie", "75", "Plombier"),
        )
        .unwrap();
        insert_entity(
            store.connection(),
            &test_entity("Martin Élec", "75", "Électricien"),
        )
        .unwrap();

        let specialties = vec!["Plombier".to_string(), "Plomberie".to_string()];
        let candidates = store.find_phoneless("75", Some(&specialties)).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].specialty, "Plombier");

        // Empty specialty set means an empty candidate pool, not a full scan
        let none = store.find_phoneless("75", Some(&[])).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_find_phoneless_ordered_by_id() {
        let (_file, store) = open_test_store();

        let id1 = insert_entity(
            store.connection(),
            &test_entity("B Plomberie", "75", "Plombier"),
        )
        .unwrap();
        let id2 = insert_entity(
            store.connection(),
            &test_entity("A Plomberie", "75", "Plombier"),
        )
        .unwrap();

        let candidates = store.find_phoneless("75", None).unwrap();
        assert_eq!(candidates[0].id, id1);
        assert_eq!(candidates[1].id, id2);
    }

    #[test]
    fn test_existing_phones() {
        let (_file, store) = open_test_store();

        let mut e = test_entity("Martin Plomberie", "75", "Plombier");
        e.phone = Some("0600000001".to_string());
        insert_entity(store.connection(), &e).unwrap();

        let asked = vec!["0600000001".to_string(), "0600000002".to_string()];
        let existing = store.existing_phones(&asked).unwrap();
        assert!(existing.contains("0600000001"));
        assert!(!existing.contains("0600000002"));
    }

    #[test]
    fn test_apply_claim_sets_phone_and_missing_fields() {
        let (_file, store) = open_test_store();
        let id = insert_entity(
            store.connection(),
            &test_entity("Martin Plomberie", "75", "Plombier"),
        )
        .unwrap();

        let mut record = test_record("0600000001");
        record.website = Some("https://martin.fr".to_string());
        record.rating = Some(4.5);
        record.review_count = Some(42);

        let claim = PhoneClaim::from_record(id, &record);
        assert_eq!(store.apply_claim(&claim).unwrap(), 1);

        let entity = store
            .connection()
            .query_row(
                "SELECT phone, website, rating_average, review_count FROM entities WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                    ))
                },
            )
            .unwrap();

        assert_eq!(entity.0.as_deref(), Some("0600000001"));
        assert_eq!(entity.1.as_deref(), Some("https://martin.fr"));
        assert_eq!(entity.2.as_deref(), Some("4.5"));
        assert_eq!(entity.3, Some(42));
    }

    #[test]
    fn test_apply_claim_preserves_existing_fields() {
        let (_file, store) = open_test_store();

        let mut entity = test_entity("Martin Plomberie", "75", "Plombier");
        entity.website = Some("https://original.fr".to_string());
        entity.rating_average = Some("3.9".to_string());
        entity.review_count = Some(7);
        let id = insert_entity(store.connection(), &entity).unwrap();

        let mut record = test_record("0600000001");
        record.website = Some("https://scraped.fr".to_string());
        record.rating = Some(4.8);
        record.review_count = Some(500);

        let claim = PhoneClaim::from_record(id, &record);
        assert_eq!(store.apply_claim(&claim).unwrap(), 1);

        let (website, rating, reviews) = store
            .connection()
            .query_row(
                "SELECT website, rating_average, review_count FROM entities WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                    ))
                },
            )
            .unwrap();

        assert_eq!(website.as_deref(), Some("https://original.fr"));
        assert_eq!(rating.as_deref(), Some("3.9"));
        assert_eq!(reviews, Some(7));
    }

    #[test]
    fn test_apply_claim_overwrites_textual_zero_rating() {
        let (_file, store) = open_test_store();

        let mut entity = test_entity("Martin Plomberie", "75", "Plombier");
        entity.rating_average = Some("0".to_string());
        let id = insert_entity(store.connection(), &entity).unwrap();

        let mut record = test_record("0600000001");
        record.rating = Some(4.8);

        store
            .apply_claim(&PhoneClaim::from_record(id, &record))
            .unwrap();

        let rating: Option<String> = store
            .connection()
            .query_row(
                "SELECT rating_average FROM entities WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rating.as_deref(), Some("4.8"));
    }

    #[test]
    fn test_apply_claim_race_returns_zero_rows() {
        let (_file, store) = open_test_store();
        let id = insert_entity(
            store.connection(),
            &test_entity("Martin Plomberie", "75", "Plombier"),
        )
        .unwrap();

        let first = PhoneClaim::from_record(id, &test_record("0600000001"));
        let second = PhoneClaim::from_record(id, &test_record("0600000002"));

        assert_eq!(store.apply_claim(&first).unwrap(), 1);
        // Target already claimed: zero rows affected, a race skip
        assert_eq!(store.apply_claim(&second).unwrap(), 0);

        let phone: Option<String> = store
            .connection()
            .query_row(
                "SELECT phone FROM entities WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(phone.as_deref(), Some("0600000001"));
    }

    #[test]
    fn test_claim_sanitizes_scraped_values() {
        let mut record = test_record("0600000001");
        record.website = Some("x".repeat(400));
        record.review_count = Some(3_000_000_000);

        let claim = PhoneClaim::from_record(1, &record);
        assert_eq!(claim.website.as_ref().unwrap().len(), MAX_WEBSITE_LEN);
        // Corrupted review counts in the billions are dropped entirely
        assert_eq!(claim.review_count, None);
    }

    #[test]
    fn test_reconnect_keeps_data() {
        let (_file, mut store) = open_test_store();
        insert_entity(
            store.connection(),
            &test_entity("Martin Plomberie", "75", "Plombier"),
        )
        .unwrap();

        store.reconnect().unwrap();

        let candidates = store.find_phoneless("75", None).unwrap();
        assert_eq!(candidates.len(), 1);
    }
}
