/// Distance kept between cached line anchors. Queries scan at most this many
/// bytes past the nearest anchor.
const ANCHOR_GAP: u64 = 4096;

/// A known line start: `lineno(pos) == line` and `pos` is the first byte of
/// that line. Line numbers are 1 based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Anchor {
    pub pos: u64,
    pub line: u64,
}

impl Anchor {
    const START: Anchor = Anchor { pos: 0, line: 1 };
}

/// Lazily maintained line anchors, ordered by position. Edits drop every
/// anchor at or past the mutation point; queries repopulate on demand.
#[derive(Debug, Default)]
pub(crate) struct LineCache {
    anchors: Vec<Anchor>,
}

impl LineCache {
    pub fn invalidate(&mut self, from: u64) {
        let keep = self.anchors.partition_point(|a| a.pos < from);
        self.anchors.truncate(keep);
    }

    pub fn clear(&mut self) {
        self.anchors.clear();
    }

    /// Closest anchor at or before `pos`.
    pub fn before_pos(&self, pos: u64) -> Anchor {
        let i = self.anchors.partition_point(|a| a.pos <= pos);
        if i == 0 {
            Anchor::START
        } else {
            self.anchors[i - 1]
        }
    }

    /// Closest anchor at or before the start of `line`.
    pub fn before_line(&self, line: u64) -> Anchor {
        let i = self.anchors.partition_point(|a| a.line <= line);
        if i == 0 {
            Anchor::START
        } else {
            self.anchors[i - 1]
        }
    }

    /// Record an anchor discovered during a scan. Keeps the vector sparse and
    /// sorted; anchors behind the current tail are not worth storing.
    pub fn push(&mut self, anchor: Anchor) {
        let last = self.anchors.last().copied().unwrap_or(Anchor::START);
        if anchor.pos >= last.pos + ANCHOR_GAP {
            self.anchors.push(anchor);
        }
    }
}

#[cfg(test)]
mod test {
    use crate::Text;

    #[test]
    fn lineno_by_pos() {
        let text = Text::from_reader("line1\nline2\nline3\n".as_bytes()).unwrap();

        assert_eq!(1, text.lineno_by_pos(0));
        assert_eq!(1, text.lineno_by_pos(5));
        assert_eq!(2, text.lineno_by_pos(6));
        assert_eq!(3, text.lineno_by_pos(12));
        assert_eq!(4, text.lineno_by_pos(text.len()));
    }

    #[test]
    fn pos_by_lineno() {
        let text = Text::from_reader("line1\nline2\nline3\n".as_bytes()).unwrap();

        assert_eq!(0, text.pos_by_lineno(1));
        assert_eq!(6, text.pos_by_lineno(2));
        assert_eq!(12, text.pos_by_lineno(3));
        // Past the last line clamps to the end.
        assert_eq!(text.len(), text.pos_by_lineno(40));
    }

    #[test]
    fn crlf_terminators_count() {
        let text = Text::from_reader("a\r\nb\r\nc".as_bytes()).unwrap();

        assert_eq!(1, text.lineno_by_pos(0));
        assert_eq!(2, text.lineno_by_pos(3));
        assert_eq!(3, text.pos_by_lineno(2));
        assert_eq!(6, text.pos_by_lineno(3));
    }

    #[test]
    fn queries_follow_edits() {
        let mut text = Text::from_reader("aa\nbb\ncc".as_bytes()).unwrap();
        assert_eq!(3, text.lineno_by_pos(7));

        text.insert(0, "x\n").unwrap();
        assert_eq!(4, text.lineno_by_pos(9));
        assert_eq!(2, text.pos_by_lineno(2));

        text.delete(0, 2).unwrap();
        assert_eq!(3, text.lineno_by_pos(7));
    }

    #[test]
    fn round_trip_property() {
        let text = Text::from_reader("one\ntwo\nthree\nfour".as_bytes()).unwrap();
        for pos in 0..=text.len() {
            let line = text.lineno_by_pos(pos);
            assert!(text.pos_by_lineno(line) <= pos);
            assert!(pos < text.pos_by_lineno(line + 1) || line == 4);
        }
    }
}
