//! Read access to world record stores.
//!
//! Everything above this crate sees the world as an ordered key/value map
//! behind [`RecordStore`].

use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::{Context, Result};
use bedrockview_parse::binary::chunk_prefix;
use bedrockview_parse::{Chunk, ChunkPos, Decoder, Dimension, KeyType, KeyVal};

pub mod leveldb;

pub use leveldb::LevelDbStore;

pub trait RecordStore {
    /// Records whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KeyVal>>;

    /// Visit every record in key order.
    fn for_each_record(&self, f: &mut dyn FnMut(&[u8], &[u8])) -> Result<()>;
}

/// Ordered in-memory store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<Vec<u8>>, val: impl Into<Vec<u8>>) {
        self.records.insert(key.into(), val.into());
    }

    pub fn insert_record(&mut self, record: KeyVal) {
        self.records.insert(record.key, record.val);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<KeyVal> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = KeyVal>>(iter: I) -> Self {
        let mut store = MemoryStore::new();
        for record in iter {
            store.insert_record(record);
        }
        store
    }
}

impl RecordStore for MemoryStore {
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KeyVal>> {
        Ok(self
            .records
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| KeyVal::new(k.clone(), v.clone()))
            .collect())
    }

    fn for_each_record(&self, f: &mut dyn FnMut(&[u8], &[u8])) -> Result<()> {
        for (k, v) in &self.records {
            f(k, v);
        }
        Ok(())
    }
}

/// Coordinates of every chunk with at least one chunk record, per dimension.
pub fn occupied_chunks(store: &dyn RecordStore) -> Result<HashMap<Dimension, HashSet<ChunkPos>>> {
    let mut occupied: HashMap<Dimension, HashSet<ChunkPos>> =
        Dimension::ALL.iter().map(|d| (*d, HashSet::new())).collect();
    store.for_each_record(&mut |key, _| {
        if let Some((pos, dimension)) = bedrockview_parse::key::classify(key).location {
            occupied.entry(dimension).or_default().insert(pos);
        }
    })?;
    log::info!(
        "Occupied chunks: {} overworld, {} nether, {} end",
        occupied[&Dimension::Overworld].len(),
        occupied[&Dimension::Nether].len(),
        occupied[&Dimension::End].len()
    );
    Ok(occupied)
}

/// Records under a chunk prefix. An Overworld prefix also matches the
/// longer keys of other dimensions; the decoder drops those.
pub fn chunk_records(store: &dyn RecordStore, pos: ChunkPos, dimension: Dimension) -> Result<Vec<KeyVal>> {
    store.scan_prefix(&chunk_prefix(pos, dimension))
}

pub fn load_chunk(
    store: &dyn RecordStore,
    decoder: &mut Decoder,
    pos: ChunkPos,
    dimension: Dimension,
) -> Result<Chunk> {
    let records = chunk_records(store, pos, dimension)?;
    decoder
        .decode_chunk(pos, dimension, records)
        .with_context(|| format!("Failed to decode {} chunk {}", dimension, pos))
}

/// Number of records per key type.
pub fn key_type_counts(store: &dyn RecordStore) -> Result<BTreeMap<KeyType, usize>> {
    let mut counts = BTreeMap::new();
    store.for_each_record(&mut |key, _| {
        let key_type = bedrockview_parse::key::classify(key).key_type;
        if key_type == KeyType::Unknown {
            log::debug!("Unknown key {:02x?}", key);
        }
        *counts.entry(key_type).or_insert(0) += 1;
    })?;
    Ok(counts)
}
