use std::collections::TryReserveError;

use concordance_text::normalize;
use concordance_types::{KeywordEntry, Occurrence};
use thiserror::Error;

const MIN_BUCKETS: usize = 8;
const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Slot of a registered keyword inside a [`KeywordIndex`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct EntryId(usize);

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("invalid keyword {keyword:?}: {reason}")]
    InvalidKeyword {
        keyword: String,
        reason: &'static str,
    },
    #[error("keyword {0:?} is registered more than once")]
    DuplicateKeyword(String),
    #[error("keyword table is full ({0} buckets)")]
    CapacityExhausted(usize),
    #[error("keyword {0:?} is not registered")]
    UnknownKeyword(String),
    #[error("out of memory while recording occurrences of {keyword:?}")]
    AllocationFailure {
        keyword: String,
        #[source]
        source: TryReserveError,
    },
}

/// Fixed-capacity open-addressing table from normalized keyword to entry.
///
/// The bucket count is a power of two chosen at construction and never
/// changes; collisions probe linearly and wrap around. Keys are compared
/// ASCII-case-insensitively, so lookups need no allocation.
#[derive(Debug, Clone)]
pub struct KeywordIndex {
    buckets: Box<[Option<KeywordEntry>]>,
    len: usize,
}

enum Probe {
    Occupied(usize),
    Vacant(usize),
    Full,
}

impl KeywordIndex {
    /// Empty table with room for `keywords` entries at a load factor of at
    /// most one half.
    pub fn with_capacity(keywords: usize) -> Self {
        let buckets = keywords
            .saturating_mul(2)
            .max(MIN_BUCKETS)
            .next_power_of_two();
        Self {
            buckets: (0..buckets).map(|_| None).collect(),
            len: 0,
        }
    }

    /// Build a table holding exactly the given keywords.
    pub fn from_keywords<S: AsRef<str>>(keywords: &[S]) -> Result<Self, IndexError> {
        let mut index = Self::with_capacity(keywords.len());
        for keyword in keywords {
            index.register(keyword.as_ref())?;
        }
        Ok(index)
    }

    /// Normalize `keyword` and insert it with a zero count.
    pub fn register(&mut self, keyword: &str) -> Result<EntryId, IndexError> {
        if keyword.chars().any(char::is_whitespace) {
            return Err(IndexError::InvalidKeyword {
                keyword: keyword.to_string(),
                reason: "keywords are single tokens and cannot contain whitespace",
            });
        }
        let normalized = normalize(keyword).ok_or_else(|| IndexError::InvalidKeyword {
            keyword: keyword.to_string(),
            reason: "nothing is left after removing punctuation",
        })?;
        match self.probe(&normalized) {
            Probe::Occupied(_) => Err(IndexError::DuplicateKeyword(normalized)),
            Probe::Vacant(slot) => {
                self.buckets[slot] = Some(KeywordEntry::new(normalized));
                self.len += 1;
                Ok(EntryId(slot))
            }
            Probe::Full => Err(IndexError::CapacityExhausted(self.buckets.len())),
        }
    }

    /// Case-insensitive exact match of `token` against registered keywords.
    pub fn lookup(&self, token: &str) -> Option<&KeywordEntry> {
        self.position(token).and_then(|id| self.entry(id))
    }

    /// Slot of the entry matching `token`, if any.
    pub fn position(&self, token: &str) -> Option<EntryId> {
        match self.probe(token) {
            Probe::Occupied(slot) => Some(EntryId(slot)),
            Probe::Vacant(_) | Probe::Full => None,
        }
    }

    pub fn entry(&self, id: EntryId) -> Option<&KeywordEntry> {
        self.buckets.get(id.0).and_then(Option::as_ref)
    }

    /// Append `occurrence` to the entry at `id`.
    pub fn record(&mut self, id: EntryId, occurrence: Occurrence) -> Result<(), IndexError> {
        let entry = self
            .buckets
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| IndexError::UnknownKeyword(format!("<slot {}>", id.0)))?;
        entry
            .push(occurrence)
            .map_err(|source| IndexError::AllocationFailure {
                keyword: entry.keyword().to_string(),
                source,
            })
    }

    /// Append `occurrence` to the entry for `keyword`, normalizing it first.
    pub fn record_occurrence(
        &mut self,
        keyword: &str,
        occurrence: Occurrence,
    ) -> Result<(), IndexError> {
        let id = normalize(keyword)
            .and_then(|normalized| self.position(&normalized))
            .ok_or_else(|| IndexError::UnknownKeyword(keyword.to_string()))?;
        self.record(id, occurrence)
    }

    /// Populated entries in bucket order.
    pub fn entries(&self) -> impl Iterator<Item = &KeywordEntry> + '_ {
        self.buckets.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn total_occurrences(&self) -> usize {
        self.entries().map(KeywordEntry::count).sum()
    }

    fn probe(&self, key: &str) -> Probe {
        let mask = self.buckets.len() - 1;
        let mut slot = (hash_key(key) as usize) & mask;
        for _ in 0..self.buckets.len() {
            match &self.buckets[slot] {
                None => return Probe::Vacant(slot),
                Some(entry) if entry.keyword().eq_ignore_ascii_case(key) => {
                    return Probe::Occupied(slot);
                }
                Some(_) => slot = (slot + 1) & mask,
            }
        }
        Probe::Full
    }
}

/// FNV-1a over ASCII-lowercased bytes. Fixed seed keeps bucket order, and
/// therefore report order, identical between runs.
fn hash_key(key: &str) -> u64 {
    key.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(byte.to_ascii_lowercase())).wrapping_mul(FNV_PRIME)
    })
}
