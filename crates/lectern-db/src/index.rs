//! [`VectorIndex`] implementation for [`SqliteIndex`].

use crate::database::SqliteIndex;
use lectern_core::{ArtifactId, DocumentPath, IndexHit, IndexRecord, Result, VectorIndex};
use std::collections::{BTreeMap, BTreeSet};

impl VectorIndex for SqliteIndex {
    fn upsert(&self, record: &IndexRecord) -> Result<()> {
        Ok(self.upsert_artifact(record)?)
    }

    fn delete(&self, id: &ArtifactId) -> Result<()> {
        self.delete_artifact(id)?;
        Ok(())
    }

    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        Ok(self.vector_search(vector, k, None)?)
    }

    fn ids(&self) -> Result<BTreeSet<ArtifactId>> {
        Ok(self.artifact_ids()?)
    }

    fn ids_for_path(&self, path: &str) -> Result<Vec<ArtifactId>> {
        Ok(self.artifact_ids_for_path(path)?)
    }

    fn ids_by_path(&self) -> Result<BTreeMap<DocumentPath, BTreeSet<ArtifactId>>> {
        Ok(self.artifact_ids_by_path()?)
    }

    fn len(&self) -> Result<usize> {
        Ok(self.count_artifacts()?)
    }

    fn apply(&self, deletes: &[ArtifactId], upserts: &[IndexRecord]) -> Result<()> {
        Ok(self.replace_artifacts(deletes, upserts)?)
    }
}
