//! # Decoding source bytes into runes.
//!
//! [`RuneSource`] turns an in-memory byte buffer into `char`s on demand, with
//! bounded lookahead. Scanners only ever look a few runes ahead of the cursor,
//! so runes are decoded lazily and the consumed prefix of the buffer is
//! dropped as the cursor moves.
use snafu::prelude::*;

use crate::{DecodeSnafu, Error, InvalidCharsetSnafu, PeekTooLargeSnafu};

/// The largest lookahead a [`RuneSource`] allows by default.
pub const MAX_PEEK: usize = 1024;

/// Runes that have been consumed are dropped from the front of the buffer once
/// there are at least this many of them.
const COMPACT_AT: usize = 4096;

/// A text encoding the rune source can decode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Encoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Encoding {
    /// Sniff the encoding from a byte-order mark, falling back to UTF-8.
    ///
    /// ```rust
    /// use todo_scanner_lib::parser::runes::Encoding;
    ///
    /// assert_eq!(Encoding::detect(b"\xFF\xFEh\x00i\x00"), Encoding::Utf16Le);
    /// assert_eq!(Encoding::detect(b"\xFE\xFF\x00h\x00i"), Encoding::Utf16Be);
    /// assert_eq!(Encoding::detect(b"plain old text"), Encoding::Utf8);
    /// ```
    pub fn detect(bytes: &[u8]) -> Self {
        match bytes {
            [0xFF, 0xFE, ..] => Encoding::Utf16Le,
            [0xFE, 0xFF, ..] => Encoding::Utf16Be,
            _ => Encoding::Utf8,
        }
    }

    /// Look up an encoding by its label, eg. "utf-8" or "UTF-16LE".
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Encoding::Utf8),
            "utf-16le" | "utf16le" => Some(Encoding::Utf16Le),
            "utf-16be" | "utf16be" => Some(Encoding::Utf16Be),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Utf16Le => "UTF-16LE",
            Encoding::Utf16Be => "UTF-16BE",
        }
    }

    /// The byte-order mark of this encoding.
    pub fn bom(&self) -> &'static [u8] {
        match self {
            Encoding::Utf8 => &[0xEF, 0xBB, 0xBF],
            Encoding::Utf16Le => &[0xFF, 0xFE],
            Encoding::Utf16Be => &[0xFE, 0xFF],
        }
    }
}

/// How to pick the encoding of a file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Charset {
    /// Sniff a byte-order mark and fall back to UTF-8.
    #[default]
    Auto,
    Fixed(Encoding),
}

impl Charset {
    /// Resolve the encoding for the given file contents.
    pub fn resolve(&self, bytes: &[u8]) -> Encoding {
        match self {
            Charset::Auto => Encoding::detect(bytes),
            Charset::Fixed(encoding) => *encoding,
        }
    }
}

impl std::str::FromStr for Charset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(Charset::Auto);
        }
        Encoding::from_label(s)
            .map(Charset::Fixed)
            .context(InvalidCharsetSnafu { name: s })
    }
}

/// Byte length of a UTF-8 sequence, given its first byte. Zero means the byte
/// cannot start a sequence.
fn utf8_width(first: u8) -> usize {
    match first {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

/// A lazily decoded stream of runes with lookahead and line tracking.
///
/// ```rust
/// use todo_scanner_lib::parser::runes::{Encoding, RuneSource};
///
/// let mut source = RuneSource::new("ab\ncd".as_bytes(), Encoding::Utf8);
/// assert_eq!(source.peek(2).unwrap(), &['a', 'b']);
/// source.advance(3).unwrap();
/// assert_eq!(source.line(), 2);
/// // A short peek means the input ran out.
/// assert_eq!(source.peek(5).unwrap(), &['c', 'd']);
/// ```
#[derive(Clone, Debug)]
pub struct RuneSource<'a> {
    bytes: &'a [u8],
    encoding: Encoding,
    // Offset of the next byte that has not been decoded yet.
    offset: usize,
    runes: Vec<char>,
    // Index of the next unconsumed rune in `runes`.
    pos: usize,
    line: usize,
    column: usize,
    max_peek: usize,
}

impl<'a> RuneSource<'a> {
    /// Create a rune source over `bytes`. A leading byte-order mark for the
    /// given encoding is skipped.
    pub fn new(bytes: &'a [u8], encoding: Encoding) -> Self {
        let offset = if bytes.starts_with(encoding.bom()) {
            encoding.bom().len()
        } else {
            0
        };
        RuneSource {
            bytes,
            encoding,
            offset,
            runes: vec![],
            pos: 0,
            line: 1,
            column: 0,
            max_peek: MAX_PEEK,
        }
    }

    /// Set the largest lookahead this source allows.
    pub fn with_max_peek(mut self, max_peek: usize) -> Self {
        self.max_peek = max_peek;
        self
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// The 1-indexed line of the next unconsumed rune.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Whether the next unconsumed rune sits in the very first column of its
    /// line.
    pub fn at_first_column(&self) -> bool {
        self.column == 0
    }

    fn decode_utf8(&mut self) -> Result<Option<char>, Error> {
        let Some(&first) = self.bytes.get(self.offset) else {
            return Ok(None);
        };
        let width = utf8_width(first);
        let c = self
            .bytes
            .get(self.offset..self.offset + width)
            .filter(|_| width > 0)
            .and_then(|seq| std::str::from_utf8(seq).ok())
            .and_then(|s| s.chars().next())
            .context(DecodeSnafu {
                offset: self.offset,
                encoding: self.encoding,
            })?;
        self.offset += width;
        Ok(Some(c))
    }

    fn utf16_unit(&self, at: usize) -> Option<u16> {
        let pair = self.bytes.get(at..at + 2)?;
        let pair = [pair[0], pair[1]];
        Some(match self.encoding {
            Encoding::Utf16Le => u16::from_le_bytes(pair),
            _ => u16::from_be_bytes(pair),
        })
    }

    fn decode_utf16(&mut self) -> Result<Option<char>, Error> {
        if self.offset >= self.bytes.len() {
            return Ok(None);
        }
        let decode_error = DecodeSnafu {
            offset: self.offset,
            encoding: self.encoding,
        };
        let unit = self.utf16_unit(self.offset).context(decode_error)?;
        let (c, width) = if (0xD800..0xDC00).contains(&unit) {
            let low = self.utf16_unit(self.offset + 2).context(decode_error)?;
            let c = char::decode_utf16([unit, low])
                .next()
                .and_then(|r| r.ok())
                .context(decode_error)?;
            (c, 4)
        } else {
            (char::from_u32(unit as u32).context(decode_error)?, 2)
        };
        self.offset += width;
        Ok(Some(c))
    }

    fn decode(&mut self) -> Result<Option<char>, Error> {
        match self.encoding {
            Encoding::Utf8 => self.decode_utf8(),
            Encoding::Utf16Le | Encoding::Utf16Be => self.decode_utf16(),
        }
    }

    /// Make sure at least `n` runes are buffered, unless the input runs out
    /// first.
    ///
    /// Bytes that fail to decode end the buffer early. The error itself is
    /// only returned once every rune before those bytes has been consumed, so
    /// lookahead never costs the caller text that did decode.
    fn fill(&mut self, n: usize) -> Result<(), Error> {
        if self.pos >= COMPACT_AT {
            self.runes.drain(..self.pos);
            self.pos = 0;
        }
        while self.runes.len() - self.pos < n {
            match self.decode() {
                Ok(Some(c)) => self.runes.push(c),
                Ok(None) => break,
                Err(e) if self.runes.len() == self.pos => return Err(e),
                Err(e) => {
                    log::trace!("deferring until the buffer drains: {e}");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Look at up to `n` runes without consuming them. A result shorter than
    /// `n` means the end of the input, or undecodable bytes, lie ahead.
    pub fn peek(&mut self, n: usize) -> Result<&[char], Error> {
        ensure!(
            n <= self.max_peek,
            PeekTooLargeSnafu {
                requested: n,
                max: self.max_peek,
            }
        );
        self.fill(n)?;
        let end = self.runes.len().min(self.pos + n);
        Ok(&self.runes[self.pos..end])
    }

    /// Whether the upcoming runes spell out `s`.
    pub fn starts_with(&mut self, s: &str) -> Result<bool, Error> {
        let len = s.chars().count();
        let runes = self.peek(len)?;
        Ok(runes.len() == len && runes.iter().copied().eq(s.chars()))
    }

    /// Consume up to `n` runes, returning how many were consumed.
    pub fn advance(&mut self, n: usize) -> Result<usize, Error> {
        let mut consumed = 0;
        while consumed < n {
            if self.next_rune()?.is_none() {
                break;
            }
            consumed += 1;
        }
        Ok(consumed)
    }

    /// Consume and return the next rune, or `None` at the end of the input.
    pub fn next_rune(&mut self) -> Result<Option<char>, Error> {
        self.fill(1)?;
        let Some(&c) = self.runes.get(self.pos) else {
            return Ok(None);
        };
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Ok(Some(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    #[test]
    fn peek_does_not_consume() {
        let mut source = RuneSource::new("hello".as_bytes(), Encoding::Utf8);
        assert_eq!(source.peek(3).unwrap(), &['h', 'e', 'l']);
        assert_eq!(source.peek(3).unwrap(), &['h', 'e', 'l']);
        assert_eq!(source.next_rune().unwrap(), Some('h'));
        assert_eq!(source.peek(10).unwrap(), &['e', 'l', 'l', 'o']);
    }

    #[test]
    fn peek_past_the_max_is_an_error() {
        let mut source = RuneSource::new("hello".as_bytes(), Encoding::Utf8).with_max_peek(4);
        assert!(source.peek(4).is_ok());
        assert!(matches!(
            source.peek(5),
            Err(Error::PeekTooLarge {
                requested: 5,
                max: 4
            })
        ));
    }

    #[test]
    fn tracks_lines_and_columns() {
        let mut source = RuneSource::new("a\nbc\n\nd".as_bytes(), Encoding::Utf8);
        assert!(source.at_first_column());
        source.advance(1).unwrap();
        assert!(!source.at_first_column());
        source.advance(1).unwrap();
        assert_eq!(source.line(), 2);
        assert!(source.at_first_column());
        assert_eq!(source.advance(10).unwrap(), 5);
        assert_eq!(source.line(), 4);
        assert_eq!(source.next_rune().unwrap(), None);
    }

    #[test]
    fn decodes_multibyte_utf8() {
        let mut source = RuneSource::new("é→🦀".as_bytes(), Encoding::Utf8);
        assert_eq!(source.peek(3).unwrap(), &['é', '→', '🦀']);
        assert!(source.starts_with("é→").unwrap());
        assert!(!source.starts_with("é→🦀!").unwrap());
    }

    #[test]
    fn skips_the_utf8_bom() {
        let mut source = RuneSource::new(b"\xEF\xBB\xBF// hi", Encoding::Utf8);
        assert!(source.starts_with("//").unwrap());
    }

    #[test]
    fn invalid_utf8_is_a_decode_error() {
        let mut source = RuneSource::new(b"ok\xFFnope", Encoding::Utf8);
        assert_eq!(source.advance(2).unwrap(), 2);
        assert!(matches!(
            source.next_rune(),
            Err(Error::Decode {
                offset: 2,
                encoding: Encoding::Utf8
            })
        ));

        // Truncated sequence at the end of the input. Lookahead stops short of
        // it, and consuming up to it surfaces the error.
        let mut source = RuneSource::new(b"ab\xE2\x86", Encoding::Utf8);
        assert_eq!(source.peek(4).unwrap(), &['a', 'b']);
        assert_eq!(source.advance(2).unwrap(), 2);
        assert!(source.peek(1).is_err());
    }

    #[test]
    fn decodes_utf16() {
        let mut bytes = Encoding::Utf16Le.bom().to_vec();
        bytes.extend(utf16le("# 🦀\n"));
        let mut source = RuneSource::new(&bytes, Encoding::Utf16Le);
        assert_eq!(source.peek(5).unwrap(), &['#', ' ', '🦀', '\n']);

        let bytes: Vec<u8> = "hi".encode_utf16().flat_map(|u| u.to_be_bytes()).collect();
        let mut source = RuneSource::new(&bytes, Encoding::Utf16Be);
        assert_eq!(source.peek(2).unwrap(), &['h', 'i']);
    }

    #[test]
    fn odd_utf16_input_is_a_decode_error() {
        let mut bytes = utf16le("a");
        bytes.push(b'b');
        let mut source = RuneSource::new(&bytes, Encoding::Utf16Le);
        assert_eq!(source.next_rune().unwrap(), Some('a'));
        assert!(source.next_rune().is_err());

        // A lone low surrogate.
        let mut source = RuneSource::new(&[0x00, 0xDC], Encoding::Utf16Le);
        assert!(source.next_rune().is_err());
    }

    #[test]
    fn compacts_long_inputs() {
        let text = "x".repeat(COMPACT_AT * 3);
        let mut source = RuneSource::new(text.as_bytes(), Encoding::Utf8);
        assert_eq!(source.advance(COMPACT_AT * 2 + 1).unwrap(), COMPACT_AT * 2 + 1);
        assert!(source.runes.len() < COMPACT_AT * 2);
        assert_eq!(source.peek(MAX_PEEK).unwrap().len(), MAX_PEEK);
    }

    #[test]
    fn parses_charsets() {
        assert_eq!("auto".parse::<Charset>().unwrap(), Charset::Auto);
        assert_eq!(
            "UTF-16le".parse::<Charset>().unwrap(),
            Charset::Fixed(Encoding::Utf16Le)
        );
        assert!(matches!(
            "latin1".parse::<Charset>(),
            Err(Error::InvalidCharset { .. })
        ));
    }
}
