//! Artifact CRUD operations.

use crate::database::SqliteIndex;
use crate::error::DbResult;
use crate::operations::vectors::{decode_vector, encode_vector};
use chrono::Utc;
use lectern_core::{ArtifactId, ArtifactKind, ArtifactMetadata, DocumentPath, IndexRecord, PageRange};
use rusqlite::{params, Connection};
use std::collections::{BTreeMap, BTreeSet};

const UPSERT_SQL: &str = r#"
    INSERT OR REPLACE INTO artifacts
        (id, source_path, kind, page_start, page_end, content, vector, dimensions, model, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
"#;

/// Raw row before the JSON kind column is decoded.
pub(crate) struct ArtifactRow {
    pub id: String,
    pub source_path: String,
    pub kind: String,
    pub page_start: u32,
    pub page_end: u32,
    pub content: String,
    pub vector: Vec<u8>,
    pub dimensions: usize,
    pub model: String,
}

impl ArtifactRow {
    pub const COLUMNS: &'static str =
        "id, source_path, kind, page_start, page_end, content, vector, dimensions, model";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let dimensions: i64 = row.get(7)?;
        Ok(Self {
            id: row.get(0)?,
            source_path: row.get(1)?,
            kind: row.get(2)?,
            page_start: row.get(3)?,
            page_end: row.get(4)?,
            content: row.get(5)?,
            vector: row.get(6)?,
            dimensions: dimensions.max(0) as usize,
            model: row.get(8)?,
        })
    }

    pub fn metadata(&self) -> DbResult<ArtifactMetadata> {
        let kind: ArtifactKind = serde_json::from_str(&self.kind)?;
        Ok(ArtifactMetadata {
            source_path: self.source_path.clone(),
            pages: PageRange::new(self.page_start, self.page_end),
            kind,
            text: self.content.clone(),
        })
    }

    pub fn into_record(self) -> DbResult<IndexRecord> {
        let metadata = self.metadata()?;
        Ok(IndexRecord {
            id: ArtifactId::new(self.id),
            vector: decode_vector(&self.vector, self.dimensions),
            metadata,
            model: self.model,
        })
    }
}

fn insert_record(conn: &Connection, record: &IndexRecord) -> DbResult<()> {
    let kind = serde_json::to_string(&record.metadata.kind)?;
    conn.execute(
        UPSERT_SQL,
        params![
            record.id.as_str(),
            record.metadata.source_path,
            kind,
            record.metadata.pages.start,
            record.metadata.pages.end,
            record.metadata.text,
            encode_vector(&record.vector),
            record.vector.len() as i64,
            record.model,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

impl SqliteIndex {
    /// Insert or overwrite one artifact.
    pub fn upsert_artifact(&self, record: &IndexRecord) -> DbResult<()> {
        let conn = self.conn()?;
        insert_record(&conn, record)
    }

    /// Delete one artifact. Returns whether a row existed.
    pub fn delete_artifact(&self, id: &ArtifactId) -> DbResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM artifacts WHERE id = ?1", params![id.as_str()])?;
        Ok(rows > 0)
    }

    /// Delete `deletes`, then write `upserts`, in one transaction.
    pub fn replace_artifacts(&self, deletes: &[ArtifactId], upserts: &[IndexRecord]) -> DbResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        {
            let mut stmt = tx.prepare("DELETE FROM artifacts WHERE id = ?1")?;
            for id in deletes {
                stmt.execute(params![id.as_str()])?;
            }
        }
        for record in upserts {
            insert_record(&tx, record)?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Get an artifact by ID.
    pub fn get_artifact(&self, id: &ArtifactId) -> DbResult<Option<IndexRecord>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM artifacts WHERE id = ?1", ArtifactRow::COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id.as_str()], ArtifactRow::from_row)?;

        match rows.next() {
            Some(row) => Ok(Some(row?.into_record()?)),
            None => Ok(None),
        }
    }

    /// All stored artifact IDs.
    pub fn artifact_ids(&self) -> DbResult<BTreeSet<ArtifactId>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id FROM artifacts")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids.into_iter().map(ArtifactId::new).collect())
    }

    /// IDs of all artifacts derived from `source_path`.
    pub fn artifact_ids_for_path(&self, source_path: &str) -> DbResult<Vec<ArtifactId>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id FROM artifacts WHERE source_path = ?1 ORDER BY id")?;
        let ids = stmt
            .query_map(params![source_path], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids.into_iter().map(ArtifactId::new).collect())
    }

    /// All stored artifact IDs keyed by their source path.
    pub fn artifact_ids_by_path(&self) -> DbResult<BTreeMap<DocumentPath, BTreeSet<ArtifactId>>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT source_path, id FROM artifacts")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut by_path: BTreeMap<DocumentPath, BTreeSet<ArtifactId>> = BTreeMap::new();
        for (path, id) in rows {
            by_path.entry(path).or_default().insert(ArtifactId::new(id));
        }
        Ok(by_path)
    }

    /// Number of stored artifacts.
    pub fn count_artifacts(&self) -> DbResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM artifacts", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
