pub(crate) mod blocks;
pub(crate) mod bytes;
pub(crate) mod chars;
pub(crate) mod chunks;
pub(crate) mod eol;
pub(crate) mod error;
pub(crate) mod graphemes;
pub(crate) mod history;
pub(crate) mod lines;
pub(crate) mod list;
pub(crate) mod mark;
pub(crate) mod piece;
pub(crate) mod save;

use std::{
    cell::RefCell,
    fmt, fs,
    io::{self, Read},
    ops::{Bound, Range, RangeBounds},
    path::{Path, PathBuf},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use self::blocks::{AddBuffer, AppendResult, BufferKind, OriginalBuffer};
use self::bytes::Bytes;
use self::chars::Chars;
use self::chunks::Chunks;
use self::eol::EndOfLine;
use self::error::TextError;
use self::graphemes::Graphemes;
use self::history::{Change, History, RevisionId};
use self::lines::{Anchor, LineCache};
use self::list::PieceList;
use self::mark::{Mark, MarkKind};
use self::piece::{Piece, PieceId, Span, HEAD, TAIL};

/// An editable text.
///
/// The content is a piece table over two buffers: the immutable original
/// (memory mapped when loaded from a file) and an append only scratch buffer
/// for inserted bytes. Every edit is recorded as a reversible splice of the
/// piece list, grouped into revisions that form the undo tree. Between
/// mutations readers always see one consistent byte sequence.
///
/// A text has a single owner; it provides no internal locking.
#[derive(Debug)]
pub struct Text {
    orig: OriginalBuffer,
    add: AddBuffer,
    pub(crate) list: PieceList,
    pub(crate) history: History,
    size: u64,
    eol: EndOfLine,
    /// Trailing piece of the last insert, extended in place when the next
    /// insert continues exactly where it ended.
    cache: Option<InsertCache>,
    lines: RefCell<LineCache>,
    path: Option<PathBuf>,
    pub(crate) stat: Option<fs::Metadata>,
}

#[derive(Debug, Clone, Copy)]
struct InsertCache {
    piece: PieceId,
    /// Text position right after the cached insert.
    end: u64,
    /// Add buffer offset right after the cached insert.
    add_end: u64,
}

impl Text {
    /// Create a new empty text.
    #[inline]
    pub fn new() -> Text {
        Self::from_original(OriginalBuffer::new(), None, None)
    }

    /// Create a text from a reader. The content is read into memory.
    #[inline]
    pub fn from_reader<R: Read>(reader: R) -> io::Result<Text> {
        let orig = OriginalBuffer::from_reader(reader)?;
        Ok(Self::from_original(orig, None, None))
    }

    /// Load a file, memory mapping it read only for the lifetime of the
    /// text.
    pub fn from_path<P: AsRef<Path>>(path: P) -> io::Result<Text> {
        let path = path.as_ref();
        let stat = fs::metadata(path).ok();
        let orig = OriginalBuffer::from_path(path)?;
        log::debug!("loaded {:?}, {} bytes", path, orig.len());
        Ok(Self::from_original(orig, Some(path.into()), stat))
    }

    fn from_original(
        orig: OriginalBuffer,
        path: Option<PathBuf>,
        stat: Option<fs::Metadata>,
    ) -> Text {
        let eol = EndOfLine::detect(orig.as_slice());
        let size = orig.len();
        let mut list = PieceList::new();
        if size > 0 {
            let id = list.alloc(BufferKind::Original, 0, size, HEAD, TAIL);
            list.get_mut(HEAD).next = id;
            list.get_mut(TAIL).prev = id;
        }

        Text {
            orig,
            add: AddBuffer::new(),
            list,
            history: History::new(now_secs()),
            size,
            eol,
            cache: None,
            lines: RefCell::new(LineCache::default()),
            path,
            stat,
        }
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Metadata of the loaded file, refreshed by every successful save.
    #[inline]
    pub fn stat(&self) -> Option<&fs::Metadata> {
        self.stat.as_ref()
    }

    /// True when the current revision differs from the last saved one.
    #[inline]
    pub fn modified(&self) -> bool {
        self.history.modified()
    }

    /// Number of live pieces.
    #[inline]
    pub fn piece_count(&self) -> usize {
        self.list.count()
    }

    /// Newline flavor detected at load time.
    #[inline]
    pub fn newline_type(&self) -> EndOfLine {
        self.eol
    }

    #[inline]
    pub fn newline_str(&self) -> &'static str {
        self.eol.as_str()
    }

    /// Whether `addr` points into the memory mapped original file. Hosts
    /// consult this from their SIGBUS handler to tell a truncated mapping
    /// apart from a plain crash; the engine installs no handlers itself.
    #[inline]
    pub fn is_in_mapped_region(&self, addr: usize) -> bool {
        self.orig.contains_addr(addr)
    }

    // ------------------------------------------------------------------
    // Mutation

    /// Insert bytes at `pos`.
    ///
    /// Consecutive inserts within one revision that continue exactly where
    /// the previous one ended extend the same piece instead of fragmenting
    /// the list.
    pub fn insert<B: AsRef<[u8]>>(&mut self, pos: u64, bytes: B) -> Result<(), TextError> {
        let bytes = bytes.as_ref();
        if pos > self.size {
            return Err(TextError::InvalidPosition {
                pos,
                len: self.size,
            });
        }
        if bytes.is_empty() {
            return Ok(());
        }

        let (off, result) = self.add.append(bytes)?;
        let len = bytes.len() as u64;

        if let Some(cache) = self.cache {
            if self.history.has_open()
                && cache.end == pos
                && cache.add_end == off
                && result == AppendResult::Append
            {
                self.list.get_mut(cache.piece).len += len;
                if let Some(change) = self.history.last_change_mut() {
                    change.new.len += len;
                }
                self.size += len;
                self.cache = Some(InsertCache {
                    piece: cache.piece,
                    end: pos + len,
                    add_end: off + len,
                });
                self.lines.borrow_mut().invalidate(pos);
                return Ok(());
            }
        }

        let loc = self.list.find(pos);
        let (change, inserted) = if loc.off == 0 {
            // On a boundary, insert before the piece at the position.
            let prev = self.list.get(loc.piece).prev;
            let id = self.list.alloc(BufferKind::Add, off, len, prev, loc.piece);
            let change = Change {
                pos,
                old: Span::empty(),
                new: Span::new(id, id, len),
            };
            (change, id)
        } else {
            // In the interior, split the piece around the insertion.
            let piece = self.list.get(loc.piece).clone();
            let left = self.list.alloc(piece.kind, piece.off, loc.off, piece.prev, 0);
            let mid = self.list.alloc(BufferKind::Add, off, len, left, 0);
            let right = self.list.alloc(
                piece.kind,
                piece.off + loc.off,
                piece.len - loc.off,
                mid,
                piece.next,
            );
            self.list.get_mut(left).next = mid;
            self.list.get_mut(mid).next = right;
            let change = Change {
                pos,
                old: Span::new(loc.piece, loc.piece, piece.len),
                new: Span::new(left, right, piece.len + len),
            };
            (change, mid)
        };

        self.list.swap(&change.old, &change.new);
        self.size += len;
        self.history.record(change);
        self.cache = Some(InsertCache {
            piece: inserted,
            end: pos + len,
            add_end: off + len,
        });
        self.lines.borrow_mut().invalidate(pos);
        Ok(())
    }

    #[inline]
    pub fn insert_char(&mut self, pos: u64, ch: char) -> Result<(), TextError> {
        let mut buf = [0; 4];
        let string = ch.encode_utf8(&mut buf);
        self.insert(pos, string)
    }

    #[inline]
    pub fn append<B: AsRef<[u8]>>(&mut self, bytes: B) -> Result<(), TextError> {
        self.insert(self.size, bytes)
    }

    /// Insert the newline flavor of this text.
    #[inline]
    pub fn insert_newline(&mut self, pos: u64) -> Result<(), TextError> {
        self.insert(pos, self.eol.as_str())
    }

    /// Render `args` and insert the result at `pos`.
    pub fn insert_fmt(&mut self, pos: u64, args: fmt::Arguments<'_>) -> Result<(), TextError> {
        let mut rendered = String::new();
        fmt::write(&mut rendered, args).map_err(|_| TextError::Format)?;
        self.insert(pos, rendered)
    }

    /// Render `args` and append the result.
    pub fn append_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<(), TextError> {
        self.insert_fmt(self.size, args)
    }

    /// Delete `len` bytes starting at `pos`.
    pub fn delete(&mut self, pos: u64, len: u64) -> Result<(), TextError> {
        let end = pos.checked_add(len).filter(|end| *end <= self.size).ok_or(
            TextError::InvalidPosition {
                pos: pos.saturating_add(len),
                len: self.size,
            },
        )?;
        if len == 0 {
            return Ok(());
        }

        let start = self.list.find(pos);
        // Walk to the piece containing the last deleted byte.
        let mut last = start.piece;
        let mut last_start = start.start;
        loop {
            let piece = self.list.get(last);
            if end <= last_start + piece.len {
                break;
            }
            last_start += piece.len;
            last = piece.next;
        }

        let first_piece = self.list.get(start.piece).clone();
        let last_piece = self.list.get(last).clone();
        let last_off = end - last_start;
        let prev = first_piece.prev;
        let next = last_piece.next;

        // Up to two pieces survive: the prefix of the first and the suffix
        // of the last.
        let prefix = start.off;
        let suffix = last_piece.len - last_off;
        let new = match (prefix > 0, suffix > 0) {
            (false, false) => Span::empty(),
            (true, false) => {
                let id = self
                    .list
                    .alloc(first_piece.kind, first_piece.off, prefix, prev, next);
                Span::new(id, id, prefix)
            }
            (false, true) => {
                let id = self.list.alloc(
                    last_piece.kind,
                    last_piece.off + last_off,
                    suffix,
                    prev,
                    next,
                );
                Span::new(id, id, suffix)
            }
            (true, true) => {
                let left = self
                    .list
                    .alloc(first_piece.kind, first_piece.off, prefix, prev, 0);
                let right = self.list.alloc(
                    last_piece.kind,
                    last_piece.off + last_off,
                    suffix,
                    left,
                    next,
                );
                self.list.get_mut(left).next = right;
                Span::new(left, right, prefix + suffix)
            }
        };

        let old_len = (last_start + last_piece.len) - start.start;
        let change = Change {
            pos,
            old: Span::new(start.piece, last, old_len),
            new,
        };
        self.list.swap(&change.old, &change.new);
        self.size -= len;
        self.history.record(change);
        self.cache = None;
        self.lines.borrow_mut().invalidate(pos);
        Ok(())
    }

    /// Delete the bytes in `range`.
    pub fn delete_range<R: RangeBounds<u64>>(&mut self, range: R) -> Result<(), TextError> {
        let Range { start, end } = self.resolve_range(range);
        self.delete(start, end.saturating_sub(start))
    }

    fn resolve_range<R: RangeBounds<u64>>(&self, range: R) -> Range<u64> {
        let start = match range.start_bound() {
            Bound::Included(n) => *n,
            Bound::Excluded(n) => *n + 1,
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(n) => *n + 1,
            Bound::Excluded(n) => *n,
            Bound::Unbounded => self.size,
        };
        start..end
    }

    // ------------------------------------------------------------------
    // History

    /// Seal the edits made since the last snapshot into a revision. No-op
    /// when nothing has changed.
    pub fn snapshot(&mut self) {
        self.cache = None;
        self.history.snapshot(now_secs());
    }

    /// Undo the most recent revision, sealing uncommitted changes first.
    /// Returns the position of the last reverted change, or `None` when
    /// there is no earlier state.
    pub fn undo(&mut self) -> Option<u64> {
        self.snapshot();
        let head = self.history.head();
        let parent = self.history.parent(head)?;
        let pos = self.revert_revision(head);
        self.history.set_head(parent);
        self.lines.borrow_mut().clear();
        pos
    }

    /// Reapply the most recently created child revision. Returns the
    /// position after the last reapplied change, or `None` when there is no
    /// later state.
    pub fn redo(&mut self) -> Option<u64> {
        self.snapshot();
        let child = self.history.latest_child(self.history.head())?;
        let pos = self.apply_revision(child);
        self.history.set_head(child);
        self.lines.borrow_mut().clear();
        pos
    }

    /// Walk up to `count` revisions toward the root. Stops early at the root
    /// and returns the last position reached, `None` if no step was
    /// possible.
    pub fn earlier(&mut self, count: usize) -> Option<u64> {
        self.snapshot();
        let mut pos = None;
        for _ in 0..count {
            let head = self.history.head();
            let Some(parent) = self.history.parent(head) else {
                break;
            };
            pos = self.revert_revision(head).or(pos);
            self.history.set_head(parent);
        }
        self.lines.borrow_mut().clear();
        pos
    }

    /// Walk up to `count` revisions along the most recent children.
    pub fn later(&mut self, count: usize) -> Option<u64> {
        self.snapshot();
        let mut pos = None;
        for _ in 0..count {
            let Some(child) = self.history.latest_child(self.history.head()) else {
                break;
            };
            pos = self.apply_revision(child).or(pos);
            self.history.set_head(child);
        }
        self.lines.borrow_mut().clear();
        pos
    }

    /// Move to the revision whose timestamp is closest to `time`, reverting
    /// and reapplying changes through the common ancestor.
    pub fn restore(&mut self, time: SystemTime) -> Option<u64> {
        self.snapshot();
        let target = self.history.nearest(secs_of(time));
        let head = self.history.head();
        let (up, down) = self.history.path(head, target);

        let mut pos = None;
        for id in up {
            pos = self.revert_revision(id).or(pos);
            if let Some(parent) = self.history.parent(id) {
                self.history.set_head(parent);
            }
        }
        for id in down {
            pos = self.apply_revision(id).or(pos);
            self.history.set_head(id);
        }
        self.lines.borrow_mut().clear();
        pos
    }

    /// Timestamp of the revision the text is currently at.
    pub fn state(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(self.history.time(self.history.head()))
    }

    /// Position of the revision `index` steps back in history, `0` being the
    /// most recent.
    pub fn history_get(&self, index: usize) -> Option<u64> {
        self.history.get(index)
    }

    fn revert_revision(&mut self, id: RevisionId) -> Option<u64> {
        let mut pos = None;
        for i in (0..self.history.changes(id).len()).rev() {
            let change = self.history.changes(id)[i];
            self.list.swap(&change.new, &change.old);
            self.size = self.size - change.new.len + change.old.len;
            pos = Some(change.pos);
        }
        pos
    }

    fn apply_revision(&mut self, id: RevisionId) -> Option<u64> {
        let mut pos = None;
        for i in 0..self.history.changes(id).len() {
            let change = self.history.changes(id)[i];
            self.list.swap(&change.old, &change.new);
            self.size = self.size - change.old.len + change.new.len;
            let mut p = change.pos;
            if change.new.len > change.old.len {
                p += change.new.len - change.old.len;
            }
            pos = Some(p);
        }
        pos
    }

    // ------------------------------------------------------------------
    // Queries

    /// Byte at `pos`, `None` past the end.
    #[inline]
    pub fn byte_at(&self, pos: u64) -> Option<u8> {
        if pos >= self.size {
            return None;
        }
        Bytes::new(self, pos).get()
    }

    /// Copy bytes starting at `pos` into `buf`. Returns how many were
    /// copied, which is short only at the end of the text.
    pub fn read_at(&self, pos: u64, buf: &mut [u8]) -> u64 {
        let mut copied = 0usize;
        let mut chunks = Chunks::new(self, pos.min(self.size));
        let mut chunk = chunks.get();
        while let Some((start, bytes)) = chunk {
            if copied == buf.len() {
                break;
            }
            let skip = pos.saturating_sub(start) as usize;
            if skip < bytes.len() {
                let take = (bytes.len() - skip).min(buf.len() - copied);
                buf[copied..copied + take].copy_from_slice(&bytes[skip..skip + take]);
                copied += take;
            }
            chunk = chunks.next();
        }
        copied as u64
    }

    /// An owned, lossily decoded string copy of `len` bytes at `pos`.
    pub fn string_at(&self, pos: u64, len: u64) -> String {
        let len = len.min(self.size.saturating_sub(pos.min(self.size))) as usize;
        let mut buf = vec![0u8; len];
        let n = self.read_at(pos, &mut buf) as usize;
        buf.truncate(n);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// The whole logical content as one owned buffer.
    pub fn content(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.size as usize];
        self.read_at(0, &mut buf);
        buf
    }

    /// Codepoint at `pos`, folding CR LF into a single `'\n'`.
    pub fn char_at(&self, pos: u64) -> Option<char> {
        let mut chars = Chars::new(self, pos);
        let (_, end, ch) = chars.next()?;
        if ch == '\r' && self.byte_at(end) == Some(b'\n') {
            return Some('\n');
        }
        Some(ch)
    }

    // ------------------------------------------------------------------
    // Iterators

    #[inline]
    pub fn bytes(&self) -> Bytes<'_> {
        self.bytes_at(0)
    }

    #[inline]
    pub fn bytes_at(&self, pos: u64) -> Bytes<'_> {
        debug_assert!(pos <= self.size, "bytes_at: {pos} over len {}", self.size);
        Bytes::new(self, pos)
    }

    #[inline]
    pub fn chars(&self) -> Chars<'_> {
        self.chars_at(0)
    }

    #[inline]
    pub fn chars_at(&self, pos: u64) -> Chars<'_> {
        debug_assert!(pos <= self.size, "chars_at: {pos} over len {}", self.size);
        Chars::new(self, pos)
    }

    #[inline]
    pub fn chunks(&self) -> Chunks<'_> {
        self.chunks_at(0)
    }

    #[inline]
    pub fn chunks_at(&self, pos: u64) -> Chunks<'_> {
        debug_assert!(pos <= self.size, "chunks_at: {pos} over len {}", self.size);
        Chunks::new(self, pos)
    }

    #[inline]
    pub fn graphemes(&self) -> Graphemes<'_> {
        self.graphemes_at(0)
    }

    #[inline]
    pub fn graphemes_at(&self, pos: u64) -> Graphemes<'_> {
        debug_assert!(
            pos <= self.size,
            "graphemes_at: {pos} over len {}",
            self.size
        );
        Graphemes::new(self, pos)
    }

    // ------------------------------------------------------------------
    // Marks

    /// Mark the byte at `pos`. `pos == len()` yields the reserved end
    /// mark. `None` when `pos` is past the end.
    pub fn mark_set(&self, pos: u64) -> Option<Mark> {
        if pos > self.size {
            return None;
        }
        if pos == self.size {
            return Some(Mark::end());
        }
        let loc = self.list.find(pos);
        let piece = self.list.get(loc.piece);
        Some(Mark::at(piece.kind, piece.off + loc.off))
    }

    /// Resolve a mark to its current position. `None` when the marked bytes
    /// are not part of the current content; an undo that brings them back
    /// makes the mark resolvable again.
    pub fn mark_get(&self, mark: Mark) -> Option<u64> {
        match mark.0 {
            MarkKind::End => Some(self.size),
            MarkKind::At { kind, off } => {
                let mut start = 0;
                let mut id = self.list.get(HEAD).next;
                while id != TAIL {
                    let piece = self.list.get(id);
                    if piece.kind == kind && piece.off <= off && off < piece.off + piece.len {
                        return Some(start + (off - piece.off));
                    }
                    start += piece.len;
                    id = piece.next;
                }
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Lines

    /// 1 based line number of the line containing `pos`.
    pub fn lineno_by_pos(&self, pos: u64) -> u64 {
        let pos = pos.min(self.size);
        let mut cache = self.lines.borrow_mut();
        let anchor = cache.before_pos(pos);
        let (line, _) = self.scan_lines(anchor, ScanUntil::Pos(pos), &mut cache);
        line
    }

    /// Position of the first byte of line `lineno`, clamped to the text
    /// length for lines past the last one.
    pub fn pos_by_lineno(&self, lineno: u64) -> u64 {
        if lineno <= 1 {
            return 0;
        }
        let mut cache = self.lines.borrow_mut();
        let anchor = cache.before_line(lineno);
        if anchor.line == lineno {
            return anchor.pos;
        }
        let (_, pos) = self.scan_lines(anchor, ScanUntil::Line(lineno), &mut cache);
        pos
    }

    /// Scan forward from `anchor` counting line feeds, planting new anchors
    /// along the way. Returns the line and position reached.
    fn scan_lines(&self, anchor: Anchor, until: ScanUntil, cache: &mut LineCache) -> (u64, u64) {
        let limit = match until {
            ScanUntil::Pos(pos) => pos,
            ScanUntil::Line(_) => self.size,
        };
        let mut line = anchor.line;

        let mut chunks = Chunks::new(self, anchor.pos);
        let mut chunk = chunks.get();
        while let Some((start, bytes)) = chunk {
            if start >= limit {
                break;
            }
            let skip = anchor.pos.saturating_sub(start) as usize;
            let take = ((limit - start) as usize).min(bytes.len());
            for i in memchr::memchr_iter(b'\n', &bytes[skip..take]) {
                line += 1;
                let line_start = start + (skip + i) as u64 + 1;
                cache.push(Anchor {
                    pos: line_start,
                    line,
                });
                if let ScanUntil::Line(target) = until {
                    if line == target {
                        return (line, line_start);
                    }
                }
            }
            chunk = chunks.next();
        }

        match until {
            ScanUntil::Pos(pos) => (line, pos),
            // Ran out of text before the requested line.
            ScanUntil::Line(_) => (line, self.size),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ScanUntil {
    Pos(u64),
    Line(u64),
}

impl Text {
    #[inline]
    pub(crate) fn piece_slice(&self, piece: &Piece) -> &[u8] {
        match piece.kind {
            BufferKind::Original => self.orig.slice(piece.off..piece.off + piece.len),
            BufferKind::Add => self.add.slice(piece.off..piece.off + piece.len),
        }
    }
}

impl Default for Text {
    fn default() -> Self {
        Text::new()
    }
}

impl From<&Text> for Vec<u8> {
    fn from(text: &Text) -> Self {
        text.content()
    }
}

impl From<&Text> for String {
    fn from(text: &Text) -> Self {
        String::from_utf8_lossy(&text.content()).into_owned()
    }
}

fn now_secs() -> u64 {
    secs_of(SystemTime::now())
}

fn secs_of(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
