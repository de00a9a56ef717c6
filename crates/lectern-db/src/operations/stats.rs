//! Index statistics.

use crate::database::SqliteIndex;
use crate::error::DbResult;

/// Summary of what the index holds.
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub artifacts: usize,
    pub chunks: usize,
    pub image_descriptions: usize,
    pub documents: usize,
    pub models: Vec<String>,
}

impl SqliteIndex {
    /// Get index statistics.
    pub fn get_stats(&self) -> DbResult<IndexStats> {
        let conn = self.conn()?;

        let artifacts: i64 =
            conn.query_row("SELECT COUNT(*) FROM artifacts", [], |row| row.get(0))?;

        let image_descriptions: i64 = conn.query_row(
            "SELECT COUNT(*) FROM artifacts WHERE kind LIKE '%image_description%'",
            [],
            |row| row.get(0),
        )?;

        let documents: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT source_path) FROM artifacts",
            [],
            |row| row.get(0),
        )?;

        let models = {
            let mut stmt = conn.prepare("SELECT DISTINCT model FROM artifacts ORDER BY model")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        Ok(IndexStats {
            artifacts: artifacts as usize,
            chunks: (artifacts - image_descriptions) as usize,
            image_descriptions: image_descriptions as usize,
            documents: documents as usize,
            models,
        })
    }
}
