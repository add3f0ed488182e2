use std::fmt;

/// Newline flavor of a text, decided by its first line terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EndOfLine {
    /// LF: Line Feed, U+000A
    #[default]
    LF,
    /// CR+LF: CR (U+000D) followed by LF (U+000A)
    CRLF,
}

impl EndOfLine {
    /// Detect from the first terminator in `bytes`. Texts without one
    /// default to LF.
    pub(crate) fn detect(bytes: &[u8]) -> EndOfLine {
        match memchr::memchr(b'\n', bytes) {
            Some(i) if i > 0 && bytes[i - 1] == b'\r' => EndOfLine::CRLF,
            _ => EndOfLine::LF,
        }
    }

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            EndOfLine::LF => "\u{000A}",
            EndOfLine::CRLF => "\u{000D}\u{000A}",
        }
    }
}

impl AsRef<str> for EndOfLine {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<[u8]> for EndOfLine {
    fn as_ref(&self) -> &[u8] {
        self.as_str().as_bytes()
    }
}

impl fmt::Display for EndOfLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndOfLine::LF => write!(f, "LF"),
            EndOfLine::CRLF => write!(f, "CRLF"),
        }
    }
}
