//! LevelDB world store.
//!
//! World databases use zlib (id 2) and raw deflate (id 4) block compression
//! on top of the stock LevelDB table format. The database stays open and
//! every read walks a fresh iterator; the store is never written.

use std::cell::RefCell;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Result, anyhow};
use flate2::Compression;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, ZlibEncoder};
use rusty_leveldb::{Compressor, CompressorList, DB, DBIterator, LdbIterator, Options, Status, StatusCode};

use bedrockview_parse::KeyVal;

use crate::RecordStore;

pub const ZLIB_COMPRESSOR_ID: u8 = 2;
pub const RAW_DEFLATE_COMPRESSOR_ID: u8 = 4;

fn compression_error(e: std::io::Error) -> Status {
    Status::new(StatusCode::CompressionError, &e.to_string())
}

struct ZlibCompressor;

impl Compressor for ZlibCompressor {
    fn encode(&self, block: Vec<u8>) -> rusty_leveldb::Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&block).map_err(compression_error)?;
        encoder.finish().map_err(compression_error)
    }

    fn decode(&self, block: Vec<u8>) -> rusty_leveldb::Result<Vec<u8>> {
        let mut out = Vec::new();
        ZlibDecoder::new(block.as_slice())
            .read_to_end(&mut out)
            .map_err(compression_error)?;
        Ok(out)
    }
}

struct RawDeflateCompressor;

impl Compressor for RawDeflateCompressor {
    fn encode(&self, block: Vec<u8>) -> rusty_leveldb::Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&block).map_err(compression_error)?;
        encoder.finish().map_err(compression_error)
    }

    fn decode(&self, block: Vec<u8>) -> rusty_leveldb::Result<Vec<u8>> {
        let mut out = Vec::new();
        DeflateDecoder::new(block.as_slice())
            .read_to_end(&mut out)
            .map_err(compression_error)?;
        Ok(out)
    }
}

/// LevelDB options able to read world databases.
pub fn world_options() -> Options {
    let mut list = CompressorList::default();
    list.set_with_id(ZLIB_COMPRESSOR_ID, ZlibCompressor);
    list.set_with_id(RAW_DEFLATE_COMPRESSOR_ID, RawDeflateCompressor);
    Options {
        create_if_missing: false,
        compressor_list: Rc::new(list),
        ..Options::default()
    }
}

/// Resolve a world directory to its database directory.
pub fn db_path(world: &Path) -> PathBuf {
    let db = world.join("db");
    if db.is_dir() { db } else { world.to_path_buf() }
}

pub struct LevelDbStore {
    path: PathBuf,
    db: RefCell<DB>,
}

impl LevelDbStore {
    /// Open a world directory (or its `db` directory).
    pub fn open(world: &Path) -> Result<Self> {
        let path = db_path(world);
        log::info!("Opening world database at {}", path.display());

        let db = DB::open(&path, world_options())
            .map_err(|e| anyhow!("Failed to open LevelDB at {}: {}", path.display(), e))?;
        Ok(Self {
            path,
            db: RefCell::new(db),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn iter(&self) -> Result<DBIterator> {
        self.db
            .borrow_mut()
            .new_iter()
            .map_err(|e| anyhow!("Failed to iterate LevelDB at {}: {}", self.path.display(), e))
    }
}

impl RecordStore for LevelDbStore {
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KeyVal>> {
        let mut iter = self.iter()?;
        iter.seek(prefix);
        let mut records = Vec::new();
        let (mut key, mut val) = (Vec::new(), Vec::new());
        while iter.current(&mut key, &mut val) {
            if !key.starts_with(prefix) {
                break;
            }
            records.push(KeyVal::new(key.to_vec(), val.to_vec()));
            if !iter.advance() {
                break;
            }
        }
        Ok(records)
    }

    fn for_each_record(&self, f: &mut dyn FnMut(&[u8], &[u8])) -> Result<()> {
        let mut iter = self.iter()?;
        let mut count = 0usize;
        while let Some((key, val)) = iter.next() {
            f(&key[..], &val[..]);
            count += 1;
        }
        log::debug!("Visited {} records in {}", count, self.path.display());
        Ok(())
    }
}
