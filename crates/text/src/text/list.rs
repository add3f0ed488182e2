use super::blocks::BufferKind;
use super::piece::{Piece, PieceId, Span, HEAD, TAIL};

/// Where a byte position falls in the piece list.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Location {
    /// Piece covering the position, `TAIL` when the position equals the text
    /// length. A position exactly on a boundary belongs to the successor
    /// piece.
    pub piece: PieceId,
    /// Start position of that piece in the text.
    pub start: u64,
    /// Offset of the position inside the piece. Zero at `TAIL`.
    pub off: u64,
}

/// Arena backed doubly linked list of pieces. Ids are stable for the lifetime
/// of the text; removing a span from the list leaves the span's internal
/// links intact so a recorded change can splice it back in.
#[derive(Debug)]
pub(crate) struct PieceList {
    arena: Vec<Piece>,
}

impl PieceList {
    pub fn new() -> PieceList {
        let sentinel = |prev, next| Piece {
            kind: BufferKind::Original,
            off: 0,
            len: 0,
            prev,
            next,
        };
        PieceList {
            arena: vec![sentinel(HEAD, TAIL), sentinel(HEAD, TAIL)],
        }
    }

    #[inline]
    pub fn get(&self, id: PieceId) -> &Piece {
        &self.arena[id]
    }

    #[inline]
    pub fn get_mut(&mut self, id: PieceId) -> &mut Piece {
        &mut self.arena[id]
    }

    /// Allocate a piece with its links already pointing at its future
    /// neighbors. The list itself is not modified until a `swap`.
    pub fn alloc(
        &mut self,
        kind: BufferKind,
        off: u64,
        len: u64,
        prev: PieceId,
        next: PieceId,
    ) -> PieceId {
        let id = self.arena.len();
        self.arena.push(Piece {
            kind,
            off,
            len,
            prev,
            next,
        });
        id
    }

    /// Number of live pieces, sentinels excluded.
    pub fn count(&self) -> usize {
        let mut n = 0;
        let mut id = self.arena[HEAD].next;
        while id != TAIL {
            n += 1;
            id = self.arena[id].next;
        }
        n
    }

    pub fn find(&self, pos: u64) -> Location {
        let mut start = 0;
        let mut id = self.arena[HEAD].next;
        while id != TAIL {
            let piece = &self.arena[id];
            if pos < start + piece.len {
                return Location {
                    piece: id,
                    start,
                    off: pos - start,
                };
            }
            start += piece.len;
            id = piece.next;
        }
        Location {
            piece: TAIL,
            start,
            off: 0,
        }
    }

    /// Replace span `old` with span `new` in the list. The anchors are taken
    /// from `old`'s outward links (or `new`'s when nothing is removed); both
    /// spans keep all of their links so the swap can be run in either
    /// direction to apply or revert a change.
    pub fn swap(&mut self, old: &Span, new: &Span) {
        match (old.ends, new.ends) {
            (None, None) => {}
            (None, Some((first, last))) => {
                let prev = self.arena[first].prev;
                let next = self.arena[last].next;
                self.arena[prev].next = first;
                self.arena[next].prev = last;
            }
            (Some((first, last)), None) => {
                let prev = self.arena[first].prev;
                let next = self.arena[last].next;
                self.arena[prev].next = next;
                self.arena[next].prev = prev;
            }
            (Some((of, ol)), Some((nf, nl))) => {
                let prev = self.arena[of].prev;
                let next = self.arena[ol].next;
                self.arena[prev].next = nf;
                self.arena[next].prev = nl;
            }
        }
    }
}

/// Cursor over the live pieces in list order.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Pieces<'a> {
    list: &'a PieceList,
    id: PieceId,
    /// Start position of the current piece, text length at `TAIL`.
    start: u64,
}

impl<'a> Pieces<'a> {
    #[inline]
    pub fn at(list: &'a PieceList, loc: Location) -> Pieces<'a> {
        Pieces {
            list,
            id: loc.piece,
            start: loc.start,
        }
    }

    #[inline]
    pub fn get(&self) -> Option<(u64, &'a Piece)> {
        if self.id == TAIL {
            return None;
        }
        Some((self.start, self.list.get(self.id)))
    }

    #[inline]
    pub fn next(&mut self) -> Option<(u64, &'a Piece)> {
        let piece = self.list.get(self.id);
        if self.id == TAIL {
            return None;
        }
        self.start += piece.len;
        self.id = piece.next;
        self.get()
    }

    #[inline]
    pub fn prev(&mut self) -> Option<(u64, &'a Piece)> {
        let prev = self.list.get(self.id).prev;
        if prev == HEAD {
            return None;
        }
        let piece = self.list.get(prev);
        self.id = prev;
        self.start -= piece.len;
        self.get()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn list_of(lens: &[u64]) -> PieceList {
        let mut list = PieceList::new();
        let mut off = 0;
        let mut prev = HEAD;
        for len in lens {
            let id = list.alloc(BufferKind::Add, off, *len, prev, TAIL);
            list.get_mut(prev).next = id;
            list.get_mut(TAIL).prev = id;
            off += len;
            prev = id;
        }
        list
    }

    #[test]
    fn find_empty() {
        let list = PieceList::new();
        let loc = list.find(0);
        assert_eq!(TAIL, loc.piece);
        assert_eq!(0, loc.start);
    }

    #[test]
    fn find_boundary_belongs_to_successor() {
        let list = list_of(&[3, 4]);
        let loc = list.find(3);
        assert_eq!(3, loc.start);
        assert_eq!(0, loc.off);
        assert_eq!(4, list.get(loc.piece).len);
    }

    #[test]
    fn find_interior_and_end() {
        let list = list_of(&[3, 4]);

        let loc = list.find(5);
        assert_eq!(3, loc.start);
        assert_eq!(2, loc.off);

        let loc = list.find(7);
        assert_eq!(TAIL, loc.piece);
        assert_eq!(7, loc.start);
    }

    #[test]
    fn swap_roundtrip_restores_links() {
        let mut list = list_of(&[3, 4, 5]);
        let mid = list.find(3).piece;

        // Replace the middle piece with a fresh one and revert.
        let prev = list.get(mid).prev;
        let next = list.get(mid).next;
        let new = list.alloc(BufferKind::Add, 100, 2, prev, next);

        let old_span = Span::new(mid, mid, 4);
        let new_span = Span::new(new, new, 2);

        list.swap(&old_span, &new_span);
        assert_eq!(new, list.get(prev).next);
        assert_eq!(new, list.get(next).prev);

        list.swap(&new_span, &old_span);
        assert_eq!(mid, list.get(prev).next);
        assert_eq!(mid, list.get(next).prev);
        assert_eq!(3, list.count());
    }

    #[test]
    fn swap_delete_and_reinsert() {
        let mut list = list_of(&[3, 4, 5]);
        let mid = list.find(3).piece;

        let old_span = Span::new(mid, mid, 4);
        list.swap(&old_span, &Span::empty());
        assert_eq!(2, list.count());
        assert_eq!(8, list.find(3).start + list.get(list.find(3).piece).len);

        list.swap(&Span::empty(), &old_span);
        assert_eq!(3, list.count());
        assert_eq!(4, list.get(list.find(3).piece).len);
    }

    #[test]
    fn pieces_cursor_walks_both_ways() {
        let list = list_of(&[3, 4]);
        let mut pieces = Pieces::at(&list, list.find(0));

        assert_eq!(3, pieces.get().unwrap().1.len);
        assert_eq!(4, pieces.next().unwrap().1.len);
        assert!(pieces.next().is_none());
        assert!(pieces.get().is_none());
        assert_eq!(4, pieces.prev().unwrap().1.len);
        assert_eq!(3, pieces.prev().unwrap().1.len);
        assert!(pieces.prev().is_none());
        assert_eq!(3, pieces.get().unwrap().1.len);
    }
}
