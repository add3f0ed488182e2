use unicode_segmentation::UnicodeSegmentation;

use super::chars::Chars;
use super::Text;

/// How many codepoints of context are collected around a position before
/// segmenting. Clusters longer than this are split approximately; real text
/// stays far below it.
const WINDOW: usize = 64;

/// End of the grapheme cluster starting at `pos`, `None` at the end of the
/// text.
pub fn next_grapheme_boundary(text: &Text, pos: u64) -> Option<u64> {
    if pos >= text.len() {
        return None;
    }

    let mut chars = Chars::new(text, pos);
    // (offset in window string, width in the text) per codepoint
    let mut window = String::new();
    let mut widths: Vec<(usize, u64)> = Vec::new();

    while widths.len() < WINDOW {
        let Some((start, end, ch)) = chars.next() else {
            break;
        };
        widths.push((window.len(), end - start));
        window.push(ch);

        // Stop once the first cluster no longer touches the window edge.
        if let Some(cluster) = window.graphemes(true).next() {
            if cluster.len() < window.len() {
                break;
            }
        }
    }

    let cluster = window.graphemes(true).next()?;
    let width: u64 = widths
        .iter()
        .filter(|(off, _)| *off < cluster.len())
        .map(|(_, w)| w)
        .sum();
    Some(pos + width)
}

/// Start of the grapheme cluster ending at `pos`, `None` at the start of the
/// text.
pub fn prev_grapheme_boundary(text: &Text, pos: u64) -> Option<u64> {
    if pos == 0 {
        return None;
    }

    // The whole window is collected before segmenting: how a regional
    // indicator run pairs up depends on where the run starts, so a shorter
    // window could pick the wrong boundary.
    let pos = pos.min(text.len());
    let mut chars = Chars::new(text, pos);
    let mut window = String::new();
    let mut widths: Vec<u64> = Vec::new();

    for _ in 0..WINDOW {
        let Some((start, end, ch)) = chars.prev() else {
            break;
        };
        window.insert(0, ch);
        widths.insert(0, end - start);
    }

    let cluster = window.graphemes(true).next_back()?;
    let chars_in_cluster = cluster.chars().count();
    let width: u64 = widths[widths.len() - chars_in_cluster..].iter().sum();
    Some(pos - width)
}

/// Grapheme cluster cursor, yielding the byte range of each cluster.
#[derive(Debug, Clone, Copy)]
pub struct Graphemes<'a> {
    text: &'a Text,
    pos: u64,
}

impl<'a> Graphemes<'a> {
    #[inline]
    pub(crate) fn new(text: &'a Text, at: u64) -> Graphemes<'a> {
        Graphemes { text, pos: at }
    }

    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn next(&mut self) -> Option<(u64, u64)> {
        let start = self.pos;
        let end = next_grapheme_boundary(self.text, start)?;
        self.pos = end;
        Some((start, end))
    }

    pub fn prev(&mut self) -> Option<(u64, u64)> {
        let end = self.pos;
        let start = prev_grapheme_boundary(self.text, end)?;
        self.pos = start;
        Some((start, end))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Text;

    fn boundaries(text: &Text) -> Vec<u64> {
        let mut result = vec![0];
        let mut graphemes = text.graphemes();
        while let Some((_, end)) = graphemes.next() {
            result.push(end);
        }
        result
    }

    #[test]
    fn ascii() {
        let text = Text::from_reader("foo".as_bytes()).unwrap();
        assert_eq!(vec![0, 1, 2, 3], boundaries(&text));
    }

    #[test]
    fn combining_marks_stay_together() {
        // "e" + COMBINING ACUTE ACCENT
        let text = Text::from_reader("e\u{0301}x".as_bytes()).unwrap();
        assert_eq!(vec![0, 3, 4], boundaries(&text));
    }

    #[test]
    fn crlf_is_one_grapheme() {
        let text = Text::from_reader("a\r\nb".as_bytes()).unwrap();
        assert_eq!(vec![0, 1, 3, 4], boundaries(&text));
    }

    #[test]
    fn zwj_emoji_is_one_grapheme() {
        // family emoji built from three people joined with ZWJ
        let family = "\u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F466}";
        let text = Text::from_reader(family.as_bytes()).unwrap();
        assert_eq!(vec![0, family.len() as u64], boundaries(&text));
    }

    #[test]
    fn regional_indicators_pair_up() {
        // two flags back to back
        let flags = "\u{1F1EB}\u{1F1EE}\u{1F1F8}\u{1F1EA}";
        let text = Text::from_reader(flags.as_bytes()).unwrap();
        assert_eq!(vec![0, 8, 16], boundaries(&text));
    }

    #[test]
    fn prev_mirrors_next() {
        let content = "a\r\ne\u{0301}\u{1F1EB}\u{1F1EE}x";
        let text = Text::from_reader(content.as_bytes()).unwrap();

        let forward = boundaries(&text);
        let mut backward = vec![text.len()];
        let mut graphemes = text.graphemes_at(text.len());
        while let Some((start, _)) = graphemes.prev() {
            backward.push(start);
        }
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[test]
    fn across_pieces() {
        let mut text = Text::new();
        text.insert(0, "e").unwrap();
        text.snapshot();
        text.insert(1, "\u{0301}").unwrap();
        assert_eq!(vec![0, 3], boundaries(&text));
    }
}
