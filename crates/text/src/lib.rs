mod text;

pub use text::{
    bytes::Bytes,
    chars::Chars,
    chunks::Chunks,
    eol::EndOfLine,
    error::TextError,
    graphemes::{next_grapheme_boundary, prev_grapheme_boundary, Graphemes},
    mark::Mark,
    save::{SaveMethod, Saver},
    Text,
};
