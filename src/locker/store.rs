use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::LockerError;
use crate::locker::consistency::PathChange;
use crate::locker::dirlock;
use crate::locker::naming::{resolve_relative, sanitize_file_name, unique_name_in};
use crate::locker::paths::LockerPaths;
use crate::locker::record::{Case, EvidenceKind, EvidenceRecord, RecordStatus};
use crate::locker::util::now_epoch_millis;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockerState {
    pub schema_version: u32,
    pub records: BTreeMap<String, EvidenceRecord>,
    pub cases: BTreeMap<String, Case>,
}

impl Default for LockerState {
    fn default() -> Self {
        Self {
            schema_version: 1,
            records: BTreeMap::new(),
            cases: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub record_id: String,
    pub stored_name: String,
    pub rel_path: String,
    pub content_hash: String,
}

pub fn ledger_file_path(paths: &LockerPaths) -> PathBuf {
    paths.state_dir.join("ledger.json")
}

/// Explicit owner of the in-memory record and case collections. Every
/// mutation replaces a whole record or case object; readers never observe
/// a half-applied transition.
#[derive(Debug)]
pub struct EvidenceStore {
    pub paths: LockerPaths,
    state: LockerState,
}

fn digest_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

impl EvidenceStore {
    pub fn load(paths: &LockerPaths) -> Result<Self, LockerError> {
        let file = ledger_file_path(paths);
        let mut state = if file.exists() {
            let raw = fs::read_to_string(&file)?;
            serde_json::from_str(&raw).map_err(|err| {
                LockerError::StorageIo(format!("failed to parse {}: {err}", file.display()))
            })?
        } else {
            LockerState::default()
        };

        // report_documents entries must never point outside the storage root
        for record in state.records.values_mut() {
            record
                .report_documents
                .retain(|rel| resolve_relative(&paths.data_dir, rel).is_some());
        }

        Ok(Self {
            paths: paths.clone(),
            state,
        })
    }

    pub fn save(&self) -> Result<PathBuf, LockerError> {
        let file = ledger_file_path(&self.paths);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(&self.state)?;

        // replace atomically so a crash mid-write cannot corrupt the ledger
        let mut tmp = tempfile::NamedTempFile::new_in(&self.paths.state_dir)?;
        tmp.write_all(data.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.persist(&file)
            .map_err(|err| LockerError::StorageIo(err.to_string()))?;
        Ok(file)
    }

    pub fn records(&self) -> impl Iterator<Item = &EvidenceRecord> {
        self.state.records.values()
    }

    pub fn cases(&self) -> impl Iterator<Item = &Case> {
        self.state.cases.values()
    }

    pub fn record(&self, id: &str) -> Option<&EvidenceRecord> {
        self.state.records.get(id)
    }

    pub fn case(&self, id: &str) -> Option<&Case> {
        self.state.cases.get(id)
    }

    /// Accepts a record id, a stored file name, or a display name.
    pub fn resolve_record_id(&self, key: &str) -> Option<String> {
        if self.state.records.contains_key(key) {
            return Some(key.to_string());
        }
        self.state
            .records
            .values()
            .find(|r| r.stored_name.as_deref() == Some(key) || r.display_name == key)
            .map(|r| r.id.clone())
    }

    pub fn resolve_case_id(&self, key: &str) -> Option<String> {
        if self.state.cases.contains_key(key) {
            return Some(key.to_string());
        }
        self.state
            .cases
            .values()
            .find(|c| c.display_name == key)
            .map(|c| c.id.clone())
    }

    /// Whole-object replacement of a record.
    pub fn put_record(&mut self, record: EvidenceRecord) {
        self.state.records.insert(record.id.clone(), record);
    }

    pub fn put_case(&mut self, case: Case) {
        self.state.cases.insert(case.id.clone(), case);
    }

    pub fn remove_case(&mut self, id: &str) -> Option<Case> {
        self.state.cases.remove(id)
    }

    fn fresh_id(&self, prefix: &str) -> Result<String, LockerError> {
        let mut millis = now_epoch_millis()
            .map_err(|err| LockerError::StorageIo(err.to_string()))?;
        loop {
            let candidate = format!("{prefix}-{millis}");
            let taken = self.state.records.contains_key(&candidate)
                || self.state.cases.contains_key(&candidate);
            if !taken {
                return Ok(candidate);
            }
            millis += 1;
        }
    }

    pub fn fresh_case_id(&self) -> Result<String, LockerError> {
        self.fresh_id("case")
    }

    /// Persist uploaded bytes into the originals directory (sanitized,
    /// collision-resolved) and create the tracking record in `new` state.
    pub fn store_asset_bytes(
        &mut self,
        bytes: &[u8],
        declared_name: &str,
    ) -> Result<StoredAsset, LockerError> {
        let safe = sanitize_file_name(declared_name);
        if safe.is_empty() {
            return Err(LockerError::InvalidArgument(
                "missing file name".to_string(),
            ));
        }
        fs::create_dir_all(&self.paths.originals_dir)?;

        let stored_name = {
            let _lock = dirlock::lock_dir(&self.paths, "originals")?;
            let (stored_name, full_path) = unique_name_in(&self.paths.originals_dir, &safe);
            fs::write(&full_path, bytes)?;
            stored_name
        };

        let rel_path = self.paths.relative_to(&self.paths.originals_dir, &stored_name);
        let content_hash = digest_hex(bytes);
        let id = self.fresh_id("file")?;
        let record = EvidenceRecord {
            id: id.clone(),
            display_name: stored_name.clone(),
            kind: EvidenceKind::from_name(&stored_name),
            status: RecordStatus::New,
            content_hash: Some(content_hash.clone()),
            stored_name: Some(stored_name.clone()),
            stored_path: Some(rel_path.clone()),
            created_at_epoch_secs: crate::locker::util::now_epoch_secs()
                .map_err(|err| LockerError::StorageIo(err.to_string()))?,
            ..EvidenceRecord::default()
        };
        self.put_record(record);

        Ok(StoredAsset {
            record_id: id,
            stored_name,
            rel_path,
            content_hash,
        })
    }

    pub fn store_asset_file(&mut self, source: &Path) -> Result<StoredAsset, LockerError> {
        let bytes = fs::read(source).map_err(|err| {
            LockerError::StorageIo(format!("failed to read {}: {err}", source.display()))
        })?;
        let declared = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| LockerError::InvalidArgument("missing file name".to_string()))?;
        self.store_asset_bytes(&bytes, declared)
    }

    /// Fold a rename cascade back into the in-memory references: stored
    /// names, stored paths, report document lists, and unified report slots.
    pub fn apply_rename_changes(&mut self, changes: &[PathChange]) {
        if changes.is_empty() {
            return;
        }
        let by_old: BTreeMap<&str, &str> = changes
            .iter()
            .map(|c| (c.old.as_str(), c.new.as_str()))
            .collect();
        let base_of = |rel: &str| rel.rsplit('/').next().unwrap_or(rel).to_string();

        let ids: Vec<String> = self.state.records.keys().cloned().collect();
        for id in ids {
            let Some(record) = self.state.records.get(&id) else {
                continue;
            };
            let mut next = record.clone();
            let mut touched = false;

            if let Some(old_path) = next.stored_path.clone()
                && let Some(new_path) = by_old.get(old_path.as_str())
            {
                let new_base = base_of(new_path);
                next.stored_path = Some((*new_path).to_string());
                next.stored_name = Some(new_base.clone());
                next.display_name = new_base;
                touched = true;
            }
            for doc in next.report_documents.iter_mut() {
                if let Some(new_path) = by_old.get(doc.as_str()) {
                    *doc = (*new_path).to_string();
                    touched = true;
                }
            }
            if touched {
                self.state.records.insert(id, next);
            }
        }

        let case_ids: Vec<String> = self.state.cases.keys().cloned().collect();
        for id in case_ids {
            let Some(case) = self.state.cases.get(&id) else {
                continue;
            };
            let mut next = case.clone();
            let mut touched = false;
            if let Some(old_path) = next.unified_report_path.clone()
                && let Some(new_path) = by_old.get(old_path.as_str())
            {
                next.unified_report_name = Some(base_of(new_path));
                next.unified_report_path = Some((*new_path).to_string());
                touched = true;
            }
            if touched {
                self.state.cases.insert(id, next);
            }
        }
    }

    /// Fold a delete cascade back in: destroyed records leave any owning
    /// case's member set, and surviving records lose pruned report entries.
    pub fn apply_deletions(&mut self, deleted: &[String]) {
        if deleted.is_empty() {
            return;
        }
        let gone: Vec<&str> = deleted.iter().map(String::as_str).collect();

        let destroyed: Vec<String> = self
            .state
            .records
            .values()
            .filter(|r| {
                r.stored_path
                    .as_deref()
                    .is_some_and(|p| gone.contains(&p))
            })
            .map(|r| r.id.clone())
            .collect();
        for id in &destroyed {
            self.state.records.remove(id);
        }

        let ids: Vec<String> = self.state.records.keys().cloned().collect();
        for id in ids {
            let Some(record) = self.state.records.get(&id) else {
                continue;
            };
            if !record
                .report_documents
                .iter()
                .any(|d| gone.contains(&d.as_str()))
            {
                continue;
            }
            let mut next = record.clone();
            next.report_documents.retain(|d| !gone.contains(&d.as_str()));
            self.state.records.insert(id, next);
        }

        let case_ids: Vec<String> = self.state.cases.keys().cloned().collect();
        for id in case_ids {
            let Some(case) = self.state.cases.get(&id) else {
                continue;
            };
            let mut next = case.clone();
            let mut touched = false;
            if next.member_ids.iter().any(|m| destroyed.contains(m)) {
                next.member_ids.retain(|m| !destroyed.contains(m));
                touched = true;
            }
            if next
                .unified_report_path
                .as_deref()
                .is_some_and(|p| gone.contains(&p))
            {
                next.unified_report_name = None;
                next.unified_report_path = None;
                touched = true;
            }
            if touched {
                self.state.cases.insert(id, next);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store(tmp: &tempfile::TempDir) -> EvidenceStore {
        let paths = LockerPaths::rooted_at(tmp.path());
        paths.ensure_layout().expect("layout");
        EvidenceStore::load(&paths).expect("load")
    }

    #[test]
    fn uploads_are_unique_within_the_directory() {
        let tmp = tempdir().expect("tempdir");
        let mut store = store(&tmp);

        let first = store.store_asset_bytes(b"one", "a.txt").expect("store");
        let second = store.store_asset_bytes(b"two", "a.txt").expect("store");
        assert_eq!(first.stored_name, "a.txt");
        assert_eq!(second.stored_name, "a (2).txt");
        assert_ne!(first.record_id, second.record_id);
        assert_ne!(first.content_hash, second.content_hash);

        let record = store.record(&first.record_id).expect("record");
        assert_eq!(record.status, RecordStatus::New);
        assert_eq!(record.stored_path.as_deref(), Some("data/originals/a.txt"));
    }

    #[test]
    fn ledger_round_trips_through_disk() {
        let tmp = tempdir().expect("tempdir");
        let id = {
            let mut store = store(&tmp);
            let stored = store.store_asset_bytes(b"x", "clip.mp4").expect("store");
            store.save().expect("save");
            stored.record_id
        };

        let paths = LockerPaths::rooted_at(tmp.path());
        let reloaded = EvidenceStore::load(&paths).expect("reload");
        let record = reloaded.record(&id).expect("record");
        assert_eq!(record.stored_name.as_deref(), Some("clip.mp4"));
        assert_eq!(record.kind, EvidenceKind::Video);
    }

    #[test]
    fn load_drops_report_entries_outside_the_root() {
        let tmp = tempdir().expect("tempdir");
        let id = {
            let mut store = store(&tmp);
            let stored = store.store_asset_bytes(b"x", "a.png").expect("store");
            let mut record = store.record(&stored.record_id).expect("record").clone();
            record.report_documents = vec![
                "data/reports/Analysis of a.png.txt".to_string(),
                "data/../../outside.txt".to_string(),
            ];
            store.put_record(record);
            store.save().expect("save");
            stored.record_id
        };

        let paths = LockerPaths::rooted_at(tmp.path());
        let reloaded = EvidenceStore::load(&paths).expect("reload");
        let record = reloaded.record(&id).expect("record");
        assert_eq!(
            record.report_documents,
            vec!["data/reports/Analysis of a.png.txt".to_string()]
        );
    }

    #[test]
    fn rename_changes_update_records_in_place() {
        let tmp = tempdir().expect("tempdir");
        let mut store = store(&tmp);
        let stored = store.store_asset_bytes(b"x", "clip.mp4").expect("store");
        let mut record = store.record(&stored.record_id).expect("record").clone();
        record
            .report_documents
            .push("data/reports/Analysis of clip.mp4.txt".to_string());
        store.put_record(record);

        store.apply_rename_changes(&[
            PathChange {
                old: "data/originals/clip.mp4".to_string(),
                new: "data/originals/dockcam.mp4".to_string(),
            },
            PathChange {
                old: "data/reports/Analysis of clip.mp4.txt".to_string(),
                new: "data/reports/Analysis of dockcam.mp4.txt".to_string(),
            },
        ]);

        let record = store.record(&stored.record_id).expect("record");
        assert_eq!(record.stored_name.as_deref(), Some("dockcam.mp4"));
        assert_eq!(record.display_name, "dockcam.mp4");
        assert_eq!(
            record.report_documents,
            vec!["data/reports/Analysis of dockcam.mp4.txt".to_string()]
        );
    }

    #[test]
    fn deletions_destroy_records_and_shrink_case_membership() {
        let tmp = tempdir().expect("tempdir");
        let mut store = store(&tmp);
        let a = store.store_asset_bytes(b"a", "a.jpg").expect("store");
        let b = store.store_asset_bytes(b"b", "b.jpg").expect("store");

        let case = Case {
            id: "case-1".to_string(),
            display_name: "a.jpg + b.jpg".to_string(),
            member_ids: vec![a.record_id.clone(), b.record_id.clone()],
            ..Case::default()
        };
        store.put_case(case);

        store.apply_deletions(&["data/originals/a.jpg".to_string()]);

        assert!(store.record(&a.record_id).is_none());
        assert!(store.record(&b.record_id).is_some());
        let case = store.case("case-1").expect("case");
        assert_eq!(case.member_ids, vec![b.record_id]);
    }
}
