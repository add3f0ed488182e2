use super::piece::{PieceId, HEAD, TAIL};
use super::Text;

/// Byte cursor over the logical text.
///
/// `next` reads the byte under the cursor and advances, `prev` steps back and
/// reads, `get` peeks without moving. Both directions cross piece boundaries
/// transparently.
#[derive(Debug, Clone, Copy)]
pub struct Bytes<'a> {
    text: &'a Text,
    piece: PieceId,
    /// Start position of the current piece, text length at `TAIL`.
    start: u64,
    off: u64,
}

impl<'a> Bytes<'a> {
    #[inline]
    pub(crate) fn new(text: &'a Text, at: u64) -> Bytes<'a> {
        let loc = text.list.find(at);
        Bytes {
            text,
            piece: loc.piece,
            start: loc.start,
            off: loc.off,
        }
    }

    #[inline]
    pub fn pos(&self) -> u64 {
        self.start + self.off
    }

    /// Byte under the cursor, `None` at the end of the text.
    #[inline]
    pub fn get(&self) -> Option<u8> {
        if self.piece == TAIL {
            return None;
        }
        let piece = self.text.list.get(self.piece);
        Some(self.text.piece_slice(piece)[self.off as usize])
    }

    #[inline]
    pub fn next(&mut self) -> Option<u8> {
        let byte = self.get()?;
        self.off += 1;
        let piece = self.text.list.get(self.piece);
        if self.off == piece.len {
            self.start += piece.len;
            self.off = 0;
            self.piece = piece.next;
        }
        Some(byte)
    }

    #[inline]
    pub fn prev(&mut self) -> Option<u8> {
        if self.off == 0 {
            let prev = self.text.list.get(self.piece).prev;
            if prev == HEAD {
                return None;
            }
            let piece = self.text.list.get(prev);
            self.piece = prev;
            self.start -= piece.len;
            self.off = piece.len - 1;
        } else {
            self.off -= 1;
        }
        self.get()
    }
}

#[cfg(test)]
mod test {
    use crate::Text;

    fn as_byte(string: &str) -> Option<u8> {
        Some(string.as_bytes()[0])
    }

    #[test]
    fn bytes_empty() {
        let text = Text::new();
        let mut bytes = text.bytes();
        assert_eq!(None, bytes.next());
        assert_eq!(None, bytes.prev());
    }

    #[test]
    fn bytes_next() {
        let mut text = Text::new();
        text.insert(0, "foo").unwrap();
        let mut bytes = text.bytes();

        assert_eq!(as_byte("f"), bytes.next());
        assert_eq!(as_byte("o"), bytes.next());
        assert_eq!(as_byte("o"), bytes.next());
        assert!(bytes.next().is_none());
        assert!(bytes.next().is_none());
    }

    #[test]
    fn bytes_prev() {
        let mut text = Text::new();
        text.insert(0, "foo").unwrap();
        let mut bytes = text.bytes_at(text.len());

        assert_eq!(text.len(), bytes.pos());
        assert!(bytes.next().is_none());
        assert_eq!(as_byte("o"), bytes.prev());
        assert_eq!(2, bytes.pos());
        assert_eq!(as_byte("o"), bytes.prev());
        assert_eq!(as_byte("f"), bytes.prev());
        assert_eq!(0, bytes.pos());
        assert!(bytes.prev().is_none());
        assert_eq!(as_byte("f"), bytes.next());
    }

    #[test]
    fn bytes_across_pieces() {
        let mut text = Text::new();
        text.insert(0, "bar").unwrap();
        text.snapshot();
        text.insert(0, "foo").unwrap();

        let mut bytes = text.bytes();
        let mut collected = Vec::new();
        while let Some(b) = bytes.next() {
            collected.push(b);
        }
        assert_eq!(b"foobar".to_vec(), collected);

        let mut reversed = Vec::new();
        while let Some(b) = bytes.prev() {
            reversed.push(b);
        }
        reversed.reverse();
        assert_eq!(collected, reversed);
    }

    #[test]
    fn bytes_start_middle() {
        let mut text = Text::new();
        text.insert(0, "bar").unwrap();
        text.snapshot();
        text.insert(0, "foo").unwrap();
        let mut bytes = text.bytes_at(3);

        assert_eq!(3, bytes.pos());
        assert_eq!(as_byte("b"), bytes.get());
        assert_eq!(as_byte("o"), bytes.prev());
        assert_eq!(2, bytes.pos());
    }
}
