//! Deciding what a pass has to do.

use lectern_core::{ArtifactId, DocumentPath, Fingerprint, Manifest};
use std::collections::{BTreeMap, BTreeSet};

/// The work one pass will perform, grouped by document path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Present on disk, absent from the manifest.
    pub insert: Vec<DocumentPath>,
    /// Present in both with a different fingerprint.
    pub replace: Vec<DocumentPath>,
    /// Same fingerprint, but the index does not hold exactly the entry's artifacts.
    pub repair: Vec<DocumentPath>,
    /// Present in both with the same fingerprint.
    pub unchanged: Vec<DocumentPath>,
    /// In the manifest or the index but gone from disk.
    pub remove: Vec<DocumentPath>,
}

impl SyncPlan {
    /// Documents that need extraction and embedding.
    pub fn to_process(&self) -> impl Iterator<Item = &DocumentPath> {
        self.insert
            .iter()
            .chain(self.replace.iter())
            .chain(self.repair.iter())
    }

    pub fn is_noop(&self) -> bool {
        self.insert.is_empty()
            && self.replace.is_empty()
            && self.repair.is_empty()
            && self.remove.is_empty()
    }
}

/// Compare the current source set with the manifest and the index.
///
/// `unreadable` lists documents that exist but could not be fingerprinted;
/// they are left out of every group so their manifest entry survives.
/// `indexed` is what the index actually stores, grouped by source path. An
/// unchanged document whose stored artifacts differ from its entry is
/// scheduled for repair, and indexed paths that no entry owns and that are
/// gone from disk are scheduled for removal.
pub fn reconcile(
    manifest: &Manifest,
    current: &BTreeMap<DocumentPath, Fingerprint>,
    unreadable: &BTreeSet<DocumentPath>,
    indexed: &BTreeMap<DocumentPath, BTreeSet<ArtifactId>>,
) -> SyncPlan {
    let mut plan = SyncPlan::default();
    let empty = BTreeSet::new();

    for (path, fingerprint) in current {
        match manifest.get(path) {
            None => plan.insert.push(path.clone()),
            Some(entry) if entry.fingerprint == *fingerprint => {
                let expected: BTreeSet<&ArtifactId> = entry.artifact_ids.iter().collect();
                let stored: BTreeSet<&ArtifactId> =
                    indexed.get(path).unwrap_or(&empty).iter().collect();
                if expected == stored {
                    plan.unchanged.push(path.clone());
                } else {
                    plan.repair.push(path.clone());
                }
            }
            Some(_) => plan.replace.push(path.clone()),
        }
    }

    let gone = |path: &DocumentPath| !current.contains_key(path) && !unreadable.contains(path);
    let remove: BTreeSet<DocumentPath> = manifest
        .paths()
        .chain(indexed.keys())
        .filter(|path| gone(*path))
        .cloned()
        .collect();
    plan.remove = remove.into_iter().collect();

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::ManifestEntry;

    fn fp(s: &str) -> Fingerprint {
        Fingerprint::from_hex(s)
    }

    fn manifest(entries: &[(&str, &str)]) -> Manifest {
        let mut m = Manifest::new();
        for (path, hash) in entries {
            m.insert(
                *path,
                ManifestEntry::new(fp(hash), vec![ArtifactId::new(format!("{}:c0", path))], 1),
            );
        }
        m
    }

    fn current(entries: &[(&str, &str)]) -> BTreeMap<DocumentPath, Fingerprint> {
        entries
            .iter()
            .map(|(p, h)| (p.to_string(), fp(h)))
            .collect()
    }

    /// An index holding exactly what `manifest` lists.
    fn indexed(manifest: &Manifest) -> BTreeMap<DocumentPath, BTreeSet<ArtifactId>> {
        manifest
            .iter()
            .filter(|(_, entry)| !entry.artifact_ids.is_empty())
            .map(|(path, entry)| (path.clone(), entry.artifact_ids.iter().cloned().collect()))
            .collect()
    }

    #[test]
    fn test_all_groups() {
        let m = manifest(&[("same.pdf", "aa"), ("changed.pdf", "bb"), ("gone.pdf", "cc")]);
        let c = current(&[("same.pdf", "aa"), ("changed.pdf", "b2"), ("new.pdf", "dd")]);

        let plan = reconcile(&m, &c, &BTreeSet::new(), &indexed(&m));

        assert_eq!(plan.insert, vec!["new.pdf"]);
        assert_eq!(plan.replace, vec!["changed.pdf"]);
        assert!(plan.repair.is_empty());
        assert_eq!(plan.unchanged, vec!["same.pdf"]);
        assert_eq!(plan.remove, vec!["gone.pdf"]);
        assert_eq!(plan.to_process().count(), 2);
        assert!(!plan.is_noop());
    }

    #[test]
    fn test_unreadable_is_not_removed() {
        let m = manifest(&[("locked.pdf", "aa")]);
        let unreadable: BTreeSet<DocumentPath> = ["locked.pdf".to_string()].into();

        let plan = reconcile(&m, &BTreeMap::new(), &unreadable, &indexed(&m));
        assert!(plan.is_noop());
        assert!(plan.unchanged.is_empty());
    }

    #[test]
    fn test_empty_everything() {
        let plan = reconcile(&Manifest::new(), &BTreeMap::new(), &BTreeSet::new(), &BTreeMap::new());
        assert_eq!(plan, SyncPlan::default());
        assert!(plan.is_noop());
    }

    #[test]
    fn test_unchanged_source_is_noop() {
        let m = manifest(&[("a.pdf", "aa"), ("b.pdf", "bb")]);
        let c = current(&[("a.pdf", "aa"), ("b.pdf", "bb")]);
        let plan = reconcile(&m, &c, &BTreeSet::new(), &indexed(&m));
        assert!(plan.is_noop());
        assert_eq!(plan.unchanged.len(), 2);
    }

    #[test]
    fn test_missing_artifacts_are_repaired() {
        let m = manifest(&[("a.pdf", "aa"), ("b.pdf", "bb")]);
        let c = current(&[("a.pdf", "aa"), ("b.pdf", "bb")]);
        let mut stored = indexed(&m);
        stored.remove("a.pdf");

        let plan = reconcile(&m, &c, &BTreeSet::new(), &stored);

        assert_eq!(plan.repair, vec!["a.pdf"]);
        assert_eq!(plan.unchanged, vec!["b.pdf"]);
        assert_eq!(plan.to_process().collect::<Vec<_>>(), vec!["a.pdf"]);
        assert!(!plan.is_noop());
    }

    #[test]
    fn test_stray_artifacts_trigger_repair() {
        let m = manifest(&[("a.pdf", "aa")]);
        let c = current(&[("a.pdf", "aa")]);
        let mut stored = indexed(&m);
        stored
            .get_mut("a.pdf")
            .unwrap()
            .insert(ArtifactId::new("a.pdf:old:c0"));

        let plan = reconcile(&m, &c, &BTreeSet::new(), &stored);
        assert_eq!(plan.repair, vec!["a.pdf"]);
    }

    #[test]
    fn test_orphaned_paths_are_removed() {
        let m = manifest(&[("a.pdf", "aa")]);
        let c = current(&[("a.pdf", "aa"), ("new.pdf", "nn")]);
        let mut stored = indexed(&m);
        for path in ["orphan.pdf", "new.pdf", "locked.pdf"] {
            stored.insert(
                path.to_string(),
                [ArtifactId::new(format!("{}:old:c0", path))].into(),
            );
        }
        let unreadable: BTreeSet<DocumentPath> = ["locked.pdf".to_string()].into();

        let plan = reconcile(&m, &c, &unreadable, &stored);

        assert_eq!(plan.remove, vec!["orphan.pdf"]);
        assert_eq!(plan.insert, vec!["new.pdf"]);
        assert_eq!(plan.unchanged, vec!["a.pdf"]);
    }
}
