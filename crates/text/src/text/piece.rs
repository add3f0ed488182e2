use super::blocks::BufferKind;

/// Index of a piece in the arena. Pieces are never freed while the text
/// lives, so ids stay valid across undo and redo.
pub(crate) type PieceId = usize;

pub(crate) const HEAD: PieceId = 0;
pub(crate) const TAIL: PieceId = 1;

/// A contiguous view into one of the two buffers, linked into the logical
/// order of the text. The sentinels at `HEAD` and `TAIL` have length zero and
/// are never removed.
#[derive(Debug, Clone)]
pub(crate) struct Piece {
    pub kind: BufferKind,
    /// Offset into the backing buffer.
    pub off: u64,
    pub len: u64,
    pub prev: PieceId,
    pub next: PieceId,
}

/// A run of pieces removed or inserted by one change. The endpoints keep
/// their outward links, which is what makes the splice reversible.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Span {
    pub ends: Option<(PieceId, PieceId)>,
    pub len: u64,
}

impl Span {
    #[inline]
    pub fn empty() -> Span {
        Span { ends: None, len: 0 }
    }

    #[inline]
    pub fn new(first: PieceId, last: PieceId, len: u64) -> Span {
        Span {
            ends: Some((first, last)),
            len,
        }
    }
}
