use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::model::{Photo, PhotoId};

/// Identity of a scanned photo as far as duplicate matching is concerned
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhotoFingerprint {
    /// md5 hex digest
    pub content_hash: String,
    pub file_name: String,
    /// Capture date at day granularity. Time of day drifts between the
    /// archive export and the remote store, days do not.
    pub taken_day: NaiveDate,
}

impl PhotoFingerprint {
    fn name_key(&self) -> (String, NaiveDate) {
        (self.file_name.to_lowercase(), self.taken_day)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    New,
    DuplicateInRemote { existing: PhotoId },
    DuplicateInBatch,
}

/// Lookup structure over all remote photos of one account known to the
/// catalog. Both matching predicates are indexed independently.
#[derive(Debug, Default)]
pub struct RemoteIndex {
    by_hash: HashMap<String, PhotoId>,
    by_name_day: HashMap<(String, NaiveDate), PhotoId>,
}

impl RemoteIndex {
    pub fn build<'a>(remote_photos: impl IntoIterator<Item = &'a Photo>) -> RemoteIndex {
        let mut index = RemoteIndex::default();
        for photo in remote_photos {
            if let Some(hash) = &photo.base.content_hash {
                index
                    .by_hash
                    .entry(hash.clone())
                    .or_insert_with(|| photo.base.id.clone());
            }
            index
                .by_name_day
                .entry((photo.base.file_name.to_lowercase(), photo.taken_day()))
                .or_insert_with(|| photo.base.id.clone());
        }
        index
    }

    fn lookup(&self, fingerprint: &PhotoFingerprint) -> Option<&PhotoId> {
        self.by_hash
            .get(&fingerprint.content_hash)
            .or_else(|| self.by_name_day.get(&fingerprint.name_key()))
    }
}

/// Fingerprints of everything already recorded earlier in the same scan
#[derive(Debug, Default)]
pub struct BatchIndex {
    hashes: HashSet<String>,
    name_days: HashSet<(String, NaiveDate)>,
}

impl BatchIndex {
    pub fn accept(&mut self, fingerprint: &PhotoFingerprint) {
        self.hashes.insert(fingerprint.content_hash.clone());
        self.name_days.insert(fingerprint.name_key());
    }

    fn contains(&self, fingerprint: &PhotoFingerprint) -> bool {
        self.hashes.contains(&fingerprint.content_hash)
            || self.name_days.contains(&fingerprint.name_key())
    }
}

/// Two predicates, each sufficient on its own: exact content digest equality,
/// or case-insensitive file name equality with the capture date matching at
/// day granularity. Items recorded earlier in the same scan shadow the remote
/// inventory, so the second copy of a file within one archive classifies as
/// an in-batch duplicate regardless of remote state.
pub fn classify(
    remote: &RemoteIndex,
    batch: &BatchIndex,
    fingerprint: &PhotoFingerprint,
) -> Classification {
    if batch.contains(fingerprint) {
        return Classification::DuplicateInBatch;
    }
    match remote.lookup(fingerprint) {
        Some(existing) => Classification::DuplicateInRemote {
            existing: existing.clone(),
        },
        None => Classification::New,
    }
}
