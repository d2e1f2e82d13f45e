//! On-disk index format.
//!
//! Layout (little endian):
//!
//! ```text
//! magic "SSVI" | version u16 | kind u8 | metric u8 | dim u32 | count u64 | next_id u64
//! count x [ id u64 | dim x f32 | payload_len u32 | payload (JSON) ]
//! kind-specific trailer (empty for flat)
//! ```

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use crate::distance::DistanceMetric;
use crate::error::{Result, VectorDbError};
use crate::index::{FlatIndex, HnswIndex, IndexKind, Payload, Record, VectorIndex};

pub const MAGIC: &[u8; 4] = b"SSVI";
pub const FORMAT_VERSION: u16 = 1;

/// magic | version | kind | metric | dim | count | next_id
const HEADER_LEN: u64 = 4 + 2 + 1 + 1 + 4 + 8 + 8;

/// Caps up-front allocations driven by header counts.
const MAX_PREALLOC: usize = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub kind: IndexKind,
    pub metric: DistanceMetric,
    pub dimension: Option<usize>,
    pub count: u64,
    pub next_id: u64,
}

/// Translate a read failure: a short file is corruption, anything else is I/O.
pub(crate) fn read_err(e: io::Error) -> VectorDbError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        VectorDbError::corrupt("unexpected end of file")
    } else {
        VectorDbError::Storage(e)
    }
}

pub(crate) fn prealloc(count: u64) -> usize {
    usize::try_from(count).unwrap_or(usize::MAX).min(MAX_PREALLOC)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write through a temporary sibling and rename it over `path`.
pub(crate) fn write_atomic<F>(path: &Path, body: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = tmp_path(path);
    let result = (|| -> Result<()> {
        let mut w = BufWriter::new(File::create(&tmp)?);
        body(&mut w)?;
        w.flush()?;
        w.get_ref().sync_all()?;
        fs::rename(&tmp, path)?;
        Ok(())
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Open an index file and read its header.
///
/// The declared record count and dimension must fit in the file even with
/// empty payloads, so nothing is allocated from a header the file cannot back.
pub(crate) fn open(path: &Path) -> Result<(BufReader<File>, Header)> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut r = BufReader::new(file);
    let header = read_header(&mut r)?;

    let dim = header.dimension.unwrap_or(0) as u128;
    let min_record = 8 + 4 * dim + 4;
    let min_len = HEADER_LEN as u128 + header.count as u128 * min_record;
    if min_len > file_len as u128 {
        return Err(VectorDbError::corrupt(format!(
            "header declares {} records of dimension {dim} but the file holds only {file_len} bytes",
            header.count
        )));
    }
    Ok((r, header))
}

pub(crate) fn write_header<W: Write>(w: &mut W, header: &Header) -> Result<()> {
    let dim = u32::try_from(header.dimension.unwrap_or(0))
        .map_err(|_| VectorDbError::InvalidConfig("dimension exceeds u32".to_string()))?;
    w.write_all(MAGIC)?;
    w.write_u16::<LittleEndian>(FORMAT_VERSION)?;
    w.write_u8(header.kind.to_byte())?;
    w.write_u8(header.metric.to_byte())?;
    w.write_u32::<LittleEndian>(dim)?;
    w.write_u64::<LittleEndian>(header.count)?;
    w.write_u64::<LittleEndian>(header.next_id)?;
    Ok(())
}

fn read_header<R: Read>(r: &mut R) -> Result<Header> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic).map_err(read_err)?;
    if &magic != MAGIC {
        return Err(VectorDbError::corrupt("bad magic"));
    }
    let version = r.read_u16::<LittleEndian>().map_err(read_err)?;
    if version != FORMAT_VERSION {
        return Err(VectorDbError::corrupt(format!("unsupported format version {version}")));
    }
    let kind_byte = r.read_u8().map_err(read_err)?;
    let kind = IndexKind::from_byte(kind_byte)
        .ok_or_else(|| VectorDbError::corrupt(format!("unknown index kind {kind_byte}")))?;
    let metric_byte = r.read_u8().map_err(read_err)?;
    let metric = DistanceMetric::from_byte(metric_byte)
        .ok_or_else(|| VectorDbError::corrupt(format!("unknown metric {metric_byte}")))?;
    let dim = r.read_u32::<LittleEndian>().map_err(read_err)? as usize;
    let count = r.read_u64::<LittleEndian>().map_err(read_err)?;
    let next_id = r.read_u64::<LittleEndian>().map_err(read_err)?;
    Ok(Header {
        kind,
        metric,
        dimension: (dim > 0).then_some(dim),
        count,
        next_id,
    })
}

pub(crate) fn write_records<W: Write, P: Payload>(w: &mut W, records: &[Record<P>]) -> Result<()> {
    for record in records {
        let payload = serde_json::to_vec(&record.payload)
            .map_err(|e| VectorDbError::Serialization(e.to_string()))?;
        let payload_len = u32::try_from(payload.len())
            .map_err(|_| VectorDbError::Serialization("payload larger than 4 GiB".to_string()))?;
        w.write_u64::<LittleEndian>(record.id)?;
        for &val in &record.embedding {
            w.write_f32::<LittleEndian>(val)?;
        }
        w.write_u32::<LittleEndian>(payload_len)?;
        w.write_all(&payload)?;
    }
    Ok(())
}

pub(crate) fn read_records<R: Read, P: Payload>(r: &mut R, header: &Header) -> Result<Vec<Record<P>>> {
    let dim = header.dimension.unwrap_or(0);
    let mut records = Vec::with_capacity(prealloc(header.count));
    for i in 0..header.count {
        let id = r.read_u64::<LittleEndian>().map_err(read_err)?;
        let mut embedding = vec![0f32; dim];
        r.read_f32_into::<LittleEndian>(&mut embedding).map_err(read_err)?;
        let len = r.read_u32::<LittleEndian>().map_err(read_err)? as u64;
        let mut payload = Vec::with_capacity(prealloc(len));
        let got = r.by_ref().take(len).read_to_end(&mut payload)?;
        if got as u64 != len {
            return Err(VectorDbError::corrupt(format!(
                "record {i} of {} declares a {len}-byte payload but only {got} bytes remain",
                header.count
            )));
        }
        let payload = serde_json::from_slice(&payload)
            .map_err(|e| VectorDbError::corrupt(format!("record {id}: undecodable payload: {e}")))?;
        records.push(Record { id, embedding, payload });
    }
    Ok(records)
}

/// Fail unless the reader is exhausted.
pub(crate) fn expect_eof<R: Read>(r: &mut R) -> Result<()> {
    let mut probe = [0u8; 1];
    match r.read(&mut probe)? {
        0 => Ok(()),
        _ => Err(VectorDbError::corrupt(
            "trailing data after declared records",
        )),
    }
}

/// Read only the header of a persisted index.
pub fn read_index_header(path: &Path) -> Result<Header> {
    let (_, header) = open(path)?;
    Ok(header)
}

/// Restore whichever index kind was persisted at `path`.
pub fn load_index<P: Payload>(path: &Path) -> Result<Box<dyn VectorIndex<P>>> {
    let header = read_index_header(path)?;
    debug!(path = %path.display(), kind = %header.kind, count = header.count, "restoring index");
    let index: Box<dyn VectorIndex<P>> = match header.kind {
        IndexKind::Flat => Box::new(FlatIndex::<P>::load(path)?),
        IndexKind::Hnsw => Box::new(HnswIndex::<P>::load(path)?),
    };
    Ok(index)
}
