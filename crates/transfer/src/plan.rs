use crate::DEFAULT_CHUNK_SIZE;

/// Byte range of one chunk within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub len: u64,
}

impl ByteRange {
    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }
}

/// Fixed-size chunking of a file.
///
/// Pure computation: chunk `i` covers
/// `[i * chunk_size, min((i + 1) * chunk_size, total_size))`. The final
/// chunk may be short. A zero-byte file still has exactly one (empty)
/// chunk, so every transfer has at least one chunk to acknowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total_size: u64,
    chunk_size: u64,
    total_chunks: u32,
}

impl ChunkPlan {
    /// Plans chunking for a file of `total_size` bytes.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] is used.
    pub fn new(total_size: u64, chunk_size: u64) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        let total_chunks = if total_size == 0 {
            1
        } else {
            total_size.div_ceil(chunk_size) as u32
        };
        Self {
            total_size,
            chunk_size,
            total_chunks,
        }
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    /// Byte range of chunk `index`, or `None` past the end.
    pub fn range(&self, index: u32) -> Option<ByteRange> {
        if index >= self.total_chunks {
            return None;
        }
        let offset = u64::from(index) * self.chunk_size;
        let len = self.chunk_size.min(self.total_size - offset.min(self.total_size));
        Some(ByteRange { offset, len })
    }

    /// All chunk ranges in ascending index order.
    pub fn ranges(&self) -> impl Iterator<Item = ByteRange> + '_ {
        (0..self.total_chunks).map(|i| self.range(i).unwrap())
    }

    /// Bytes covered by chunks `[0, index)`. Used to account for chunks
    /// the server already holds when resuming.
    pub fn bytes_before(&self, index: u32) -> u64 {
        (u64::from(index) * self.chunk_size).min(self.total_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_split() {
        let plan = ChunkPlan::new(40, 10);
        assert_eq!(plan.total_chunks(), 4);
        let ranges: Vec<_> = plan.ranges().collect();
        assert_eq!(ranges.len(), 4);
        for (i, r) in ranges.iter().enumerate() {
            assert_eq!(r.offset, i as u64 * 10);
            assert_eq!(r.len, 10);
        }
    }

    #[test]
    fn short_final_chunk() {
        // 50 MB at 16 MB chunks: 16 + 16 + 16 + 2.
        let mb = 1024 * 1024;
        let plan = ChunkPlan::new(50 * mb, 16 * mb);
        assert_eq!(plan.total_chunks(), 4);
        let ranges: Vec<_> = plan.ranges().collect();
        assert_eq!(ranges[0].len, 16 * mb);
        assert_eq!(ranges[1].len, 16 * mb);
        assert_eq!(ranges[2].len, 16 * mb);
        assert_eq!(ranges[3].len, 2 * mb);
        assert_eq!(ranges[3].end(), 50 * mb);
    }

    #[test]
    fn ranges_partition_exactly() {
        for (total, chunk) in [(1u64, 1u64), (10, 3), (10, 10), (10, 11), (999, 7)] {
            let plan = ChunkPlan::new(total, chunk);
            assert_eq!(
                plan.total_chunks() as u64,
                total.div_ceil(chunk),
                "total={total} chunk={chunk}"
            );
            let mut expected_offset = 0;
            for r in plan.ranges() {
                assert_eq!(r.offset, expected_offset, "gap or overlap at {expected_offset}");
                assert!(r.len > 0);
                expected_offset = r.end();
            }
            assert_eq!(expected_offset, total);
        }
    }

    #[test]
    fn zero_size_file_has_one_empty_chunk() {
        let plan = ChunkPlan::new(0, 16);
        assert_eq!(plan.total_chunks(), 1);
        assert_eq!(plan.range(0), Some(ByteRange { offset: 0, len: 0 }));
        assert_eq!(plan.range(1), None);
    }

    #[test]
    fn zero_chunk_size_falls_back_to_default() {
        let plan = ChunkPlan::new(DEFAULT_CHUNK_SIZE * 2, 0);
        assert_eq!(plan.chunk_size(), DEFAULT_CHUNK_SIZE);
        assert_eq!(plan.total_chunks(), 2);
    }

    #[test]
    fn range_past_end_is_none() {
        let plan = ChunkPlan::new(10, 4);
        assert_eq!(plan.total_chunks(), 3);
        assert!(plan.range(3).is_none());
    }

    #[test]
    fn bytes_before_clamps_to_total() {
        let plan = ChunkPlan::new(10, 4);
        assert_eq!(plan.bytes_before(0), 0);
        assert_eq!(plan.bytes_before(1), 4);
        assert_eq!(plan.bytes_before(2), 8);
        assert_eq!(plan.bytes_before(3), 10);
    }
}
