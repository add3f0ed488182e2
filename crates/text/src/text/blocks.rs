use std::{
    fs::File,
    io::{self, Read},
    ops::Range,
    path::{Path, PathBuf},
};

use memmap2::Mmap;

use super::error::TextError;

/// Default size for a scratch block. A single insertion larger than this gets
/// a block of its own.
pub(crate) const BLOCK_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BufferKind {
    Original,
    Add,
}

/// Original file content. Read only, alive for the whole lifetime of the
/// text so that pieces in any revision can keep referencing it.
#[derive(Debug)]
pub(crate) enum OriginalBuffer {
    File {
        map: Mmap,
        path: PathBuf,
        // Keeps the mapping valid on platforms that care about the fd.
        _file: File,
    },
    Memory {
        bytes: Vec<u8>,
    },
}

impl OriginalBuffer {
    #[inline]
    pub fn new() -> OriginalBuffer {
        OriginalBuffer::Memory { bytes: Vec::new() }
    }

    #[inline]
    pub fn from_reader<R: Read>(mut reader: R) -> io::Result<OriginalBuffer> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(OriginalBuffer::Memory { bytes })
    }

    /// Map a file read only. Empty files are not mapped at all.
    pub fn from_path<P: AsRef<Path>>(path: P) -> io::Result<OriginalBuffer> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let metadata = file.metadata()?;
        if metadata.len() == 0 {
            return Ok(OriginalBuffer::Memory { bytes: Vec::new() });
        }

        // SAFETY: the mapping is read only and the file handle is kept for
        // the lifetime of the buffer. Truncation by another process makes
        // reads fault with SIGBUS, which hosts detect through
        // is_in_mapped_region().
        let map = unsafe { Mmap::map(&file)? };
        Ok(OriginalBuffer::File {
            map,
            path: path.into(),
            _file: file,
        })
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        match self {
            OriginalBuffer::File { map, .. } => map,
            OriginalBuffer::Memory { bytes } => bytes,
        }
    }

    #[inline]
    pub fn slice(&self, range: Range<u64>) -> &[u8] {
        &self.as_slice()[range.start as usize..range.end as usize]
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.as_slice().len() as u64
    }

    #[inline]
    pub fn is_file_backed(&self) -> bool {
        matches!(self, OriginalBuffer::File { .. })
    }

    #[inline]
    pub fn file_path(&self) -> Option<&Path> {
        match self {
            OriginalBuffer::File { path, .. } => Some(path),
            OriginalBuffer::Memory { .. } => None,
        }
    }

    /// Whether `addr` points into the mapped region. Always false for
    /// in-memory originals.
    pub fn contains_addr(&self, addr: usize) -> bool {
        match self {
            OriginalBuffer::File { map, .. } => {
                let start = map.as_ptr() as usize;
                addr >= start && addr < start + map.len()
            }
            OriginalBuffer::Memory { .. } => false,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum AppendResult {
    /// Appended to the tail block, contiguous with the previous append.
    Append,
    /// A new block was allocated for the bytes.
    NewBlock,
}

#[derive(Debug)]
struct Block {
    /// Offset of the first byte of this block in the add buffer.
    start: u64,
    bytes: Vec<u8>,
}

/// Append only scratch storage for inserted bytes. Grows as a chain of heap
/// blocks; written bytes never move or change, so pieces and marks can refer
/// to them by offset for the lifetime of the text.
#[derive(Debug, Default)]
pub(crate) struct AddBuffer {
    blocks: Vec<Block>,
    len: u64,
}

impl AddBuffer {
    #[inline]
    pub fn new() -> AddBuffer {
        AddBuffer::default()
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Append `bytes` and return the offset they landed at. An append never
    /// spans two blocks: if the tail block cannot hold all of the bytes a new
    /// block of `max(BLOCK_SIZE, bytes.len())` is allocated.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(u64, AppendResult), TextError> {
        let off = self.len;

        if let Some(block) = self.blocks.last_mut() {
            if block.bytes.capacity() - block.bytes.len() >= bytes.len() {
                block.bytes.extend_from_slice(bytes);
                self.len += bytes.len() as u64;
                return Ok((off, AppendResult::Append));
            }
        }

        let mut vec = Vec::new();
        vec.try_reserve_exact(bytes.len().max(BLOCK_SIZE))
            .map_err(|_| TextError::OutOfMemory)?;
        vec.extend_from_slice(bytes);
        self.blocks.push(Block { start: off, bytes: vec });
        self.len += bytes.len() as u64;
        Ok((off, AppendResult::NewBlock))
    }

    /// `range` must lie within a single block. Pieces satisfy this because an
    /// append never spans blocks and coalesced inserts stay in one block.
    pub fn slice(&self, range: Range<u64>) -> &[u8] {
        let i = self.blocks.partition_point(|b| b.start <= range.start) - 1;
        let block = &self.blocks[i];
        let start = (range.start - block.start) as usize;
        let end = (range.end - block.start) as usize;
        &block.bytes[start..end]
    }
}
