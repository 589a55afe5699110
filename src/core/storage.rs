//! History archive file.
//!
//! Layout:
//! - magic: `FIXSHR01`
//! - version: u32
//! - chunks, each `tag: [u8; 4]`, `len: u32`, payload:
//!   - `CONF`: run configuration as JSON
//!   - `HIST`: step records as JSON, LZ4-compressed and preceded by the
//!     uncompressed length (u32)
//!
//! Unknown chunks are skipped so later versions can add data.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::aggregator::AggregatorConfig;
use crate::error::{FixShareError, Result};
use crate::history::{History, StepRecord};

pub const MAGIC: &[u8; 8] = b"FIXSHR01";
pub const VERSION_V1: u32 = 1;
pub const VERSION_CURRENT: u32 = VERSION_V1;

const TAG_CONFIG: [u8; 4] = *b"CONF";
const TAG_HISTORY: [u8; 4] = *b"HIST";

pub fn compress_lz4(input: &[u8]) -> Vec<u8> {
    lz4_flex::compress(input)
}

pub fn decompress_lz4(input: &[u8], expected_size: usize) -> io::Result<Vec<u8>> {
    lz4_flex::decompress(input, expected_size)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "lz4 decompression failed"))
}

fn write_u32_le<W: Write>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn read_u32_le<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn chunk_len(len: usize) -> io::Result<u32> {
    u32::try_from(len).map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "chunk too large"))
}

fn write_chunk<W: Write>(w: &mut W, tag: [u8; 4], payload: &[u8]) -> io::Result<()> {
    w.write_all(&tag)?;
    write_u32_le(w, chunk_len(payload.len())?)?;
    w.write_all(payload)
}

fn write_chunk_lz4<W: Write>(w: &mut W, tag: [u8; 4], payload: &[u8]) -> io::Result<()> {
    let compressed = compress_lz4(payload);
    let total_len = 4u32.saturating_add(chunk_len(compressed.len())?);

    w.write_all(&tag)?;
    write_u32_le(w, total_len)?;
    write_u32_le(w, chunk_len(payload.len())?)?;
    w.write_all(&compressed)
}

fn read_chunk<R: Read>(r: &mut R) -> io::Result<Option<([u8; 4], Vec<u8>)>> {
    let mut tag = [0u8; 4];
    match r.read_exact(&mut tag) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let len = u64::from(read_u32_le(r)?);
    // The length comes from the file; only allocate what is actually there.
    let mut payload = Vec::new();
    Read::take(&mut *r, len).read_to_end(&mut payload)?;
    if payload.len() as u64 != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "truncated chunk",
        ));
    }
    Ok(Some((tag, payload)))
}

fn unpack_lz4(payload: &[u8]) -> io::Result<Vec<u8>> {
    if payload.len() < 4 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "compressed chunk too short",
        ));
    }
    let (len, body) = payload.split_at(4);
    let expected = u32::from_le_bytes([len[0], len[1], len[2], len[3]]) as usize;
    decompress_lz4(body, expected)
}

/// Records must be in step order, internally consistent, and the pool may only
/// grow.
fn validate_records(records: &[StepRecord]) -> Result<()> {
    let mut launched = 0;
    for (t, r) in records.iter().enumerate() {
        if r.t != t {
            return Err(FixShareError::Archive("step records out of order"));
        }
        if !r.is_consistent() {
            return Err(FixShareError::Archive("malformed step record"));
        }
        if r.launched < launched {
            return Err(FixShareError::Archive("expert count decreases"));
        }
        launched = r.launched;
    }
    Ok(())
}

pub fn write_history<W: Write>(w: &mut W, history: &History) -> Result<()> {
    w.write_all(MAGIC)?;
    write_u32_le(w, VERSION_CURRENT)?;

    write_chunk(w, TAG_CONFIG, &serde_json::to_vec(history.config())?)?;
    write_chunk_lz4(w, TAG_HISTORY, &serde_json::to_vec(history.records())?)?;
    w.flush()?;
    Ok(())
}

pub fn read_history<R: Read>(r: &mut R) -> Result<History> {
    let mut magic = [0u8; 8];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(FixShareError::Archive("bad magic"));
    }
    let version = read_u32_le(r)?;
    if version != VERSION_V1 {
        return Err(FixShareError::Archive("unsupported version"));
    }

    let mut config: Option<AggregatorConfig> = None;
    let mut records: Option<Vec<StepRecord>> = None;
    while let Some((tag, payload)) = read_chunk(r)? {
        match tag {
            TAG_CONFIG => config = Some(serde_json::from_slice(&payload)?),
            TAG_HISTORY => records = Some(serde_json::from_slice(&unpack_lz4(&payload)?)?),
            _ => {}
        }
    }

    let config = config.ok_or(FixShareError::Archive("missing CONF chunk"))?;
    let records = records.ok_or(FixShareError::Archive("missing HIST chunk"))?;
    validate_records(&records)?;
    Ok(History::from_parts(config, records))
}

pub fn save_history(path: impl AsRef<Path>, history: &History) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    write_history(&mut w, history)
}

pub fn load_history(path: impl AsRef<Path>) -> Result<History> {
    let mut r = BufReader::new(File::open(path)?);
    read_history(&mut r)
}
