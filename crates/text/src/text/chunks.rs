use super::list::Pieces;
use super::Text;

/// Cursor over the contiguous byte runs of the text, one per piece.
#[derive(Debug, Clone, Copy)]
pub struct Chunks<'a> {
    text: &'a Text,
    pieces: Pieces<'a>,
}

impl<'a> Chunks<'a> {
    #[inline]
    pub(crate) fn new(text: &'a Text, at: u64) -> Chunks<'a> {
        let pieces = Pieces::at(&text.list, text.list.find(at));
        Chunks { text, pieces }
    }

    /// The chunk covering the cursor and its start position.
    #[inline]
    pub fn get(&self) -> Option<(u64, &'a [u8])> {
        let (start, piece) = self.pieces.get()?;
        Some((start, self.text.piece_slice(piece)))
    }

    #[inline]
    pub fn next(&mut self) -> Option<(u64, &'a [u8])> {
        let (start, piece) = self.pieces.next()?;
        Some((start, self.text.piece_slice(piece)))
    }

    #[inline]
    pub fn prev(&mut self) -> Option<(u64, &'a [u8])> {
        let (start, piece) = self.pieces.prev()?;
        Some((start, self.text.piece_slice(piece)))
    }
}
