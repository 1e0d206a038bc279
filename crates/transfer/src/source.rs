use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::plan::{ByteRange, ChunkPlan};
use crate::TransferError;

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// One chunk's bytes, ready to upload.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: u32,
    pub range: ByteRange,
    pub data: Vec<u8>,
    /// SHA-256 hex digest of `data`.
    pub checksum: String,
}

/// Reads individual chunks of a file on demand.
///
/// Indexed rather than sequential: chunks are retried and dispatched
/// independently, so any chunk may be read at any time, in any order.
#[derive(Debug)]
pub struct ChunkSource {
    file: std::fs::File,
    plan: ChunkPlan,
}

impl ChunkSource {
    /// Opens `path` for chunked reading according to `plan`.
    ///
    /// Fails if the file's current size no longer matches the plan —
    /// re-uploading a file that changed underfoot would corrupt the
    /// server-side merge.
    pub fn open(path: &Path, plan: ChunkPlan) -> Result<Self, TransferError> {
        let file = std::fs::File::open(path)?;
        let actual = file.metadata()?.len();
        if actual != plan.total_size() {
            return Err(TransferError::SizeMismatch {
                expected: plan.total_size(),
                actual,
            });
        }
        Ok(Self { file, plan })
    }

    /// Reads the bytes of chunk `index` and computes its checksum.
    pub fn read_chunk(&mut self, index: u32) -> Result<Chunk, TransferError> {
        let range = self
            .plan
            .range(index)
            .ok_or(TransferError::ChunkOutOfRange {
                index,
                total: self.plan.total_chunks(),
            })?;

        let mut data = vec![0u8; range.len as usize];
        self.file.seek(SeekFrom::Start(range.offset))?;
        self.file.read_exact(&mut data)?;

        let checksum = checksum_bytes(&data);
        Ok(Chunk {
            index,
            range,
            data,
            checksum,
        })
    }

    pub fn plan(&self) -> &ChunkPlan {
        &self.plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(data).unwrap();
        path
    }

    #[test]
    fn checksum_bytes_deterministic() {
        let c1 = checksum_bytes(b"hello world");
        let c2 = checksum_bytes(b"hello world");
        assert_eq!(c1, c2);
        assert_eq!(c1.len(), 64); // SHA-256 = 64 hex chars.
    }

    #[test]
    fn reads_chunks_in_any_order() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "test.bin", b"AABBCCDDEE");

        let plan = ChunkPlan::new(10, 4);
        let mut src = ChunkSource::open(&path, plan).unwrap();

        // Last chunk first.
        let c2 = src.read_chunk(2).unwrap();
        assert_eq!(c2.range.offset, 8);
        assert_eq!(&c2.data, b"EE");

        let c0 = src.read_chunk(0).unwrap();
        assert_eq!(&c0.data, b"AABB");
        assert_eq!(c0.checksum, checksum_bytes(b"AABB"));

        let c1 = src.read_chunk(1).unwrap();
        assert_eq!(&c1.data, b"CCDD");
    }

    #[test]
    fn rereading_a_chunk_is_stable() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "test.bin", b"0123456789");

        let plan = ChunkPlan::new(10, 4);
        let mut src = ChunkSource::open(&path, plan).unwrap();
        let first = src.read_chunk(1).unwrap();
        let again = src.read_chunk(1).unwrap();
        assert_eq!(first.data, again.data);
        assert_eq!(first.checksum, again.checksum);
    }

    #[test]
    fn out_of_range_index_rejected() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "test.bin", b"xyz");

        let plan = ChunkPlan::new(3, 2);
        let mut src = ChunkSource::open(&path, plan).unwrap();
        let err = src.read_chunk(2).unwrap_err();
        assert!(matches!(
            err,
            TransferError::ChunkOutOfRange { index: 2, total: 2 }
        ));
    }

    #[test]
    fn size_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "test.bin", b"1234");

        let plan = ChunkPlan::new(10, 4);
        let err = ChunkSource::open(&path, plan).unwrap_err();
        assert!(matches!(
            err,
            TransferError::SizeMismatch {
                expected: 10,
                actual: 4
            }
        ));
    }

    #[test]
    fn empty_file_yields_empty_chunk() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "empty.bin", b"");

        let plan = ChunkPlan::new(0, 4);
        let mut src = ChunkSource::open(&path, plan).unwrap();
        let c = src.read_chunk(0).unwrap();
        assert!(c.data.is_empty());
        assert_eq!(c.checksum, checksum_bytes(b""));
    }
}
