use std::{
    fs::{self, File},
    io::{self, ErrorKind, Write},
    ops::Range,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use super::blocks::OriginalBuffer;
use super::error::TextError;
use super::Text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveMethod {
    /// ATOMIC, falling back to INPLACE when the directory cannot take a
    /// temporary file or the target is not a regular file.
    #[default]
    Auto,
    /// Write a temporary file in the target directory, fsync and rename it
    /// over the target. The target is never left half written.
    Atomic,
    /// Truncate the target and write into it. An IO failure mid-write leaves
    /// the file partially written.
    InPlace,
}

/// An in-progress save. Obtained from [`Text::save_begin`], fed through
/// [`Text::save_write`] and finished with [`Text::save_commit`] or
/// [`Saver::cancel`]. Dropping an atomic saver removes its temporary file.
///
/// An in-place saver captures the logical content when it is created and
/// truncates the target right away; ranges written later come from that
/// capture.
#[derive(Debug)]
pub struct Saver {
    target: PathBuf,
    out: SaveOutput,
}

#[derive(Debug)]
enum SaveOutput {
    Atomic(NamedTempFile),
    InPlace {
        file: File,
        /// Logical content at `begin` time, the truncated target may back
        /// the pieces themselves.
        content: Vec<u8>,
        /// Copy of the mapped original when the target is the backing file;
        /// swapped in at commit so the pieces outlive the rewrite.
        orig_copy: Option<Vec<u8>>,
    },
}

impl Saver {
    /// Abandon the save. For ATOMIC the temporary file is removed and the
    /// target is untouched; an INPLACE target has already been truncated.
    pub fn cancel(self) {
        if let SaveOutput::Atomic(tmp) = self.out {
            log::debug!("cancelled atomic save of {:?}", self.target);
            drop(tmp);
        }
    }
}

fn begin(text: &Text, target: &Path, method: SaveMethod) -> Result<Saver, TextError> {
    match method {
        SaveMethod::Atomic => begin_atomic(target),
        SaveMethod::InPlace => begin_in_place(text, target),
        SaveMethod::Auto => match begin_atomic(target) {
            Ok(saver) => Ok(saver),
            Err(e) if atomic_fallback(&e) => {
                log::debug!("atomic save unavailable for {target:?}: {e}");
                begin_in_place(text, target)
            }
            Err(e) => Err(e),
        },
    }
}

/// Whether an atomic failure should make AUTO retry in place.
fn atomic_fallback(e: &TextError) -> bool {
    match e {
        TextError::Unsupported => true,
        TextError::Io(e) => {
            e.kind() == ErrorKind::PermissionDenied || e.raw_os_error() == Some(libc::EXDEV)
        }
        _ => false,
    }
}

fn begin_atomic(target: &Path) -> Result<Saver, TextError> {
    // Renaming over a symlink, device or pipe would replace it with a
    // regular file.
    let metadata = match target.symlink_metadata() {
        Ok(m) if !m.file_type().is_file() => return Err(TextError::Unsupported),
        Ok(m) => Some(m),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)?;

    let permissions = match &metadata {
        Some(m) => m.permissions(),
        None => {
            // No previous file, honor the process umask like a plain create
            // would.
            let mask = unsafe { libc::umask(0) };
            unsafe { libc::umask(mask) };
            fs::Permissions::from_mode(0o666 & !(mask as u32))
        }
    };
    tmp.as_file().set_permissions(permissions)?;

    Ok(Saver {
        target: target.into(),
        out: SaveOutput::Atomic(tmp),
    })
}

fn begin_in_place(text: &Text, target: &Path) -> Result<Saver, TextError> {
    // Both copies are taken while the mapping is still intact. Truncating
    // the backing file first would fault every read of the pieces that
    // reference it.
    let content = text.content();
    let orig_copy = if text.orig.file_path() == Some(target) {
        Some(text.orig.as_slice().to_vec())
    } else {
        None
    };

    let file = File::options()
        .write(true)
        .create(true)
        .truncate(true)
        .open(target)?;
    Ok(Saver {
        target: target.into(),
        out: SaveOutput::InPlace {
            file,
            content,
            orig_copy,
        },
    })
}

impl Text {
    /// Save the whole text to `path`, choosing the strategy automatically.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<(), TextError> {
        self.save_with(path, SaveMethod::Auto)
    }

    pub fn save_with<P: AsRef<Path>>(
        &mut self,
        path: P,
        method: SaveMethod,
    ) -> Result<(), TextError> {
        let mut saver = self.save_begin(&path, method)?;
        self.save_write(&mut saver, 0..self.len())?;
        self.save_commit(saver)
    }

    pub fn save_range<P: AsRef<Path>>(
        &mut self,
        range: Range<u64>,
        path: P,
    ) -> Result<(), TextError> {
        let mut saver = self.save_begin(&path, SaveMethod::Auto)?;
        self.save_write(&mut saver, range)?;
        self.save_commit(saver)
    }

    /// Open the destination and pick the strategy. The returned handle is
    /// written with [`save_write`](Self::save_write) and finished with
    /// [`save_commit`](Self::save_commit).
    pub fn save_begin<P: AsRef<Path>>(
        &self,
        path: P,
        method: SaveMethod,
    ) -> Result<Saver, TextError> {
        begin(self, path.as_ref(), method)
    }

    /// Write `range` of the text at the destination's current offset.
    /// Returns the number of bytes written.
    pub fn save_write(&self, saver: &mut Saver, range: Range<u64>) -> Result<u64, TextError> {
        if range.end > self.len() {
            return Err(TextError::InvalidPosition {
                pos: range.end,
                len: self.len(),
            });
        }
        match &mut saver.out {
            SaveOutput::Atomic(tmp) => Ok(self.write_range_to(range, tmp.as_file_mut())?),
            SaveOutput::InPlace { file, content, .. } => {
                let end = (range.end as usize).min(content.len());
                let bytes = &content[(range.start as usize).min(end)..end];
                file.write_all(bytes)?;
                Ok(bytes.len() as u64)
            }
        }
    }

    /// Flush the destination, rename it over the target for ATOMIC, then
    /// take a snapshot and remember it as the last saved state.
    pub fn save_commit(&mut self, saver: Saver) -> Result<(), TextError> {
        let Saver { target, out } = saver;
        match out {
            SaveOutput::Atomic(tmp) => {
                tmp.as_file().sync_all()?;
                tmp.persist(&target).map_err(|e| {
                    log::error!("rename failed while saving {target:?}: {}", e.error);
                    TextError::Io(e.error)
                })?;
            }
            SaveOutput::InPlace {
                file, orig_copy, ..
            } => {
                file.sync_all()?;
                if let Some(bytes) = orig_copy {
                    // The backing file was rewritten underneath the mapping,
                    // keep serving the original bytes from the heap.
                    self.orig = OriginalBuffer::Memory { bytes };
                }
            }
        }

        self.snapshot();
        let head = self.history.head();
        self.history.set_saved(head);
        self.stat = fs::metadata(&target).ok();
        log::debug!("saved {target:?}, {} bytes known on disk", self.len());
        Ok(())
    }

    /// Abandon an in-progress save, see [`Saver::cancel`].
    pub fn save_cancel(&mut self, saver: Saver) {
        saver.cancel();
    }

    /// Write the whole logical content to `writer`.
    pub fn write_to<W: Write>(&self, writer: W) -> io::Result<u64> {
        self.write_range_to(0..self.len(), writer)
    }

    /// Write a byte range of the logical content to `writer`. The range is
    /// clamped to the text length.
    pub fn write_range_to<W: Write>(&self, range: Range<u64>, mut writer: W) -> io::Result<u64> {
        let end = range.end.min(self.len());
        let mut written = 0;

        let mut chunks = self.chunks_at(range.start.min(end));
        let mut chunk = chunks.get();
        while let Some((start, bytes)) = chunk {
            if start >= end {
                break;
            }
            let skip = range.start.saturating_sub(start) as usize;
            let take = ((end - start) as usize).min(bytes.len());
            if skip < take {
                writer.write_all(&bytes[skip..take])?;
                written += (take - skip) as u64;
            }
            chunk = chunks.next();
        }

        writer.flush()?;
        Ok(written)
    }
}
