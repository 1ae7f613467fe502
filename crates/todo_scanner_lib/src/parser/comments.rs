//! # Finding comments in source code.
//!
//! [`CommentScanner`] is a small state machine driven by a
//! [`LanguageConfig`]. It walks the runes of a file, skipping string literals,
//! and yields each comment it finds along with the line the comment starts
//! on. It knows nothing about any particular language beyond the delimiters in
//! its config, so its output only ever "looks approximately like" a comment.
use super::{
    langs::{Escape, LanguageConfig, LineCommentConfig, MultilineCommentConfig, StringConfig},
    runes::{Encoding, RuneSource},
};
use crate::Error;

/// Which rule of the language config matched a comment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommentKind<'c> {
    Line(&'c LineCommentConfig),
    Multiline(&'c MultilineCommentConfig),
}

/// A comment found in source code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Comment<'c> {
    /// The raw text of the comment, including its delimiters but not the line
    /// ending after a line comment.
    pub text: String,
    /// The 1-indexed line the comment starts on.
    pub line: usize,
    pub kind: CommentKind<'c>,
}

impl Comment<'_> {
    pub fn is_multiline(&self) -> bool {
        matches!(self.kind, CommentKind::Multiline(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Code,
    InString(usize),
    InLineComment(usize),
    InMultilineComment { index: usize, depth: usize },
    /// A line comment start that is also a string start. Whichever of a line
    /// ending or the string's end comes first decides what it was.
    InLineCommentOrString { line: usize, string: usize },
}

/// What one step of the state machine produced.
enum Step<'c> {
    Continue,
    Emit(Comment<'c>),
    Eof,
}

/// A delimiter match at the cursor: the index of the rule and the rune length
/// of the delimiter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Match {
    index: usize,
    len: usize,
}

fn rune_len(s: &str) -> usize {
    s.chars().count()
}

/// Scans source code for comments.
///
/// ```rust
/// use todo_scanner_lib::parser::{comments::CommentScanner, langs::language, runes::Encoding};
///
/// let go = language("Go").unwrap();
/// let src = "x := \"// not a comment\" // a comment\n/* and\nanother */\n";
/// let comments = CommentScanner::from_bytes(src.as_bytes(), Encoding::Utf8, go)
///     .collect::<Result<Vec<_>, _>>()
///     .unwrap();
///
/// assert_eq!(comments.len(), 2);
/// assert_eq!(comments[0].text, "// a comment");
/// assert_eq!(comments[0].line, 1);
/// assert_eq!(comments[1].text, "/* and\nanother */");
/// assert_eq!(comments[1].line, 2);
/// ```
pub struct CommentScanner<'a, 'c> {
    source: RuneSource<'a>,
    config: &'c LanguageConfig,
    state: State,
    // The comment being collected, and the line it started on.
    text: String,
    start_line: usize,
    done: bool,
}

impl<'a, 'c> CommentScanner<'a, 'c> {
    pub fn new(source: RuneSource<'a>, config: &'c LanguageConfig) -> Self {
        CommentScanner {
            source,
            config,
            state: State::Code,
            text: String::new(),
            start_line: 1,
            done: false,
        }
    }

    pub fn from_bytes(bytes: &'a [u8], encoding: Encoding, config: &'c LanguageConfig) -> Self {
        Self::new(RuneSource::new(bytes, encoding), config)
    }

    pub fn config(&self) -> &'c LanguageConfig {
        self.config
    }

    /// Find the next comment. Returns `Ok(None)` once the input is exhausted,
    /// including when it ends inside an unterminated string or comment.
    ///
    /// After an error the scanner is spent and only returns `Ok(None)`.
    pub fn next_comment(&mut self) -> Result<Option<Comment<'c>>, Error> {
        while !self.done {
            let step = match self.state {
                State::Code => self.step_code(),
                State::InString(index) => self.step_string(index),
                State::InLineComment(index) => self.step_line_comment(index),
                State::InMultilineComment { index, depth } => {
                    self.step_multiline_comment(index, depth)
                }
                State::InLineCommentOrString { line, string } => {
                    self.step_line_comment_or_string(line, string)
                }
            };
            match step {
                Ok(Step::Continue) => {}
                Ok(Step::Emit(comment)) => return Ok(Some(comment)),
                Ok(Step::Eof) => self.done = true,
                Err(e) => {
                    self.done = true;
                    return Err(e);
                }
            }
        }
        Ok(None)
    }

    /// The longest of the given delimiters found at the cursor. Among
    /// delimiters of equal length the first one wins.
    fn longest_match<'d>(
        &mut self,
        delims: impl IntoIterator<Item = (&'d str, bool)>,
    ) -> Result<Option<Match>, Error> {
        let mut best: Option<Match> = None;
        for (index, (delim, allowed)) in delims.into_iter().enumerate() {
            let len = rune_len(delim);
            if !allowed || best.is_some_and(|m| m.len >= len) {
                continue;
            }
            if self.source.starts_with(delim)? {
                best = Some(Match { index, len });
            }
        }
        Ok(best)
    }

    /// Whether a multi-line comment delimiter may match at the cursor.
    fn column_allows(&self, rule: &MultilineCommentConfig) -> bool {
        !rule.at_first_column || self.source.at_first_column()
    }

    /// Take the matched delimiter from the input and start collecting a comment
    /// with it.
    fn start_comment(&mut self, delim: &str) -> Result<(), Error> {
        self.text.clear();
        self.text.push_str(delim);
        self.start_line = self.source.line();
        self.source.advance(rune_len(delim))?;
        Ok(())
    }

    fn emit(&mut self, kind: CommentKind<'c>) -> Step<'c> {
        self.state = State::Code;
        Step::Emit(Comment {
            text: std::mem::take(&mut self.text),
            line: self.start_line,
            kind,
        })
    }

    fn step_code(&mut self) -> Result<Step<'c>, Error> {
        let config = self.config;
        let at_first_column = self.source.at_first_column();
        let line = self.longest_match(config.line_comments.iter().map(|c| (c.start, true)))?;
        let multi = self.longest_match(
            config
                .multiline_comments
                .iter()
                .map(|c| (c.start, !c.at_first_column || at_first_column)),
        )?;
        let string = self.longest_match(config.strings.iter().map(|s| (s.start, true)))?;

        let len_of = |m: Option<Match>| m.map(|m| m.len).unwrap_or_default();
        let longest = len_of(line).max(len_of(multi)).max(len_of(string));
        if longest == 0 {
            return Ok(match self.source.next_rune()? {
                Some(_) => Step::Continue,
                None => Step::Eof,
            });
        }

        if let Some(m) = multi.filter(|m| m.len == longest) {
            let rule = &config.multiline_comments[m.index];
            self.start_comment(rule.start)?;
            self.state = State::InMultilineComment {
                index: m.index,
                depth: 1,
            };
        } else if let Some(l) = line.filter(|m| m.len == longest) {
            let rule = &config.line_comments[l.index];
            self.start_comment(rule.start)?;
            self.state = match string.filter(|m| m.len == longest) {
                Some(s) => State::InLineCommentOrString {
                    line: l.index,
                    string: s.index,
                },
                None => State::InLineComment(l.index),
            };
        } else if let Some(s) = string {
            let rule = &config.strings[s.index];
            self.source.advance(s.len)?;
            self.state = State::InString(s.index);
            log::trace!("string opened with {:?} on line {}", rule.start, self.source.line());
        }
        Ok(Step::Continue)
    }

    /// Skip an escaped terminator at the cursor, if there is one. Skipped runes
    /// are returned so they can be kept when the string turns out to be a
    /// comment.
    fn skip_escape(&mut self, rule: &StringConfig) -> Result<Option<String>, Error> {
        let end_len = rune_len(rule.end);
        let skip = match rule.escape {
            Escape::None => 0,
            Escape::Char(c) => {
                let runes = self.source.peek(1 + end_len)?;
                match runes.split_first() {
                    Some((&first, rest)) if first == c => {
                        if rest.iter().copied().eq(rule.end.chars()) {
                            1 + end_len
                        } else if rest.first() == Some(&c) {
                            // An escaped escape character.
                            2
                        } else {
                            0
                        }
                    }
                    _ => 0,
                }
            }
            Escape::Double => {
                let runes = self.source.peek(2 * end_len)?;
                if runes.iter().copied().eq(rule.end.chars().chain(rule.end.chars())) {
                    2 * end_len
                } else {
                    0
                }
            }
        };
        if skip == 0 {
            return Ok(None);
        }
        let skipped = self.source.peek(skip)?.iter().collect::<String>();
        self.source.advance(skip)?;
        Ok(Some(skipped))
    }

    fn step_string(&mut self, index: usize) -> Result<Step<'c>, Error> {
        let config = self.config;
        let rule = &config.strings[index];
        if self.skip_escape(rule)?.is_some() {
            return Ok(Step::Continue);
        }
        if self.source.starts_with(rule.end)? {
            self.source.advance(rune_len(rule.end))?;
            self.state = State::Code;
            return Ok(Step::Continue);
        }
        Ok(match self.source.next_rune()? {
            Some(_) => Step::Continue,
            None => Step::Eof,
        })
    }

    /// Whether a line ending, `\n` or `\r\n`, is at the cursor.
    fn at_line_ending(&mut self) -> Result<bool, Error> {
        Ok(matches!(self.source.peek(2)?, ['\n', ..] | ['\r', '\n']))
    }

    fn step_line_comment(&mut self, index: usize) -> Result<Step<'c>, Error> {
        let config = self.config;
        let rule = &config.line_comments[index];
        if self.at_line_ending()? {
            return Ok(self.emit(CommentKind::Line(rule)));
        }
        match self.source.next_rune()? {
            Some(c) => {
                self.text.push(c);
                Ok(Step::Continue)
            }
            None => Ok(self.emit(CommentKind::Line(rule))),
        }
    }

    fn step_multiline_comment(&mut self, index: usize, depth: usize) -> Result<Step<'c>, Error> {
        let config = self.config;
        let rule = &config.multiline_comments[index];
        if self.column_allows(rule) && self.source.starts_with(rule.end)? {
            self.text.push_str(rule.end);
            self.source.advance(rune_len(rule.end))?;
            if depth <= 1 {
                return Ok(self.emit(CommentKind::Multiline(rule)));
            }
            self.state = State::InMultilineComment {
                index,
                depth: depth - 1,
            };
            return Ok(Step::Continue);
        }
        if rule.nested && self.column_allows(rule) && self.source.starts_with(rule.start)? {
            self.text.push_str(rule.start);
            self.source.advance(rune_len(rule.start))?;
            self.state = State::InMultilineComment {
                index,
                depth: depth + 1,
            };
            return Ok(Step::Continue);
        }
        match self.source.next_rune()? {
            Some(c) => {
                self.text.push(c);
                Ok(Step::Continue)
            }
            None => {
                log::trace!(
                    "unterminated {:?} comment from line {}",
                    rule.start,
                    self.start_line
                );
                self.text.clear();
                Ok(Step::Eof)
            }
        }
    }

    fn step_line_comment_or_string(
        &mut self,
        line: usize,
        string: usize,
    ) -> Result<Step<'c>, Error> {
        let config = self.config;
        let line_rule = &config.line_comments[line];
        let string_rule = &config.strings[string];
        if self.at_line_ending()? {
            return Ok(self.emit(CommentKind::Line(line_rule)));
        }
        if let Some(skipped) = self.skip_escape(string_rule)? {
            self.text.push_str(&skipped);
            return Ok(Step::Continue);
        }
        if self.source.starts_with(string_rule.end)? {
            // It was a string after all.
            self.source.advance(rune_len(string_rule.end))?;
            self.text.clear();
            self.state = State::Code;
            return Ok(Step::Continue);
        }
        match self.source.next_rune()? {
            Some(c) => {
                self.text.push(c);
                Ok(Step::Continue)
            }
            None => Ok(self.emit(CommentKind::Line(line_rule))),
        }
    }
}

impl<'c> Iterator for CommentScanner<'_, 'c> {
    type Item = Result<Comment<'c>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_comment().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::langs::{self, lang, language};

    fn scan(config: &LanguageConfig, src: &str) -> Vec<(usize, String)> {
        CommentScanner::from_bytes(src.as_bytes(), Encoding::Utf8, config)
            .map(|c| c.map(|c| (c.line, c.text)))
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    fn comment(line: usize, text: &str) -> (usize, String) {
        (line, text.to_string())
    }

    #[test]
    fn finds_line_comments() {
        let go = language("Go").unwrap();
        assert_eq!(
            scan(go, "package main\n\n// one\nfunc main() { // two\r\n}\n//"),
            vec![comment(3, "// one"), comment(4, "// two"), comment(6, "//")]
        );
    }

    #[test]
    fn line_numbers_count_preceding_newlines() {
        let go = language("Go").unwrap();
        let src = "a\n\"b\nc\"\n/* d\n\ne */ // f\n`g\nh` // i";
        let comments = scan(go, src);
        assert_eq!(
            comments,
            vec![
                comment(4, "/* d\n\ne */"),
                comment(6, "// f"),
                comment(8, "// i")
            ]
        );
        for (line, text) in comments {
            let offset = src.find(&text).unwrap();
            assert_eq!(line, src[..offset].matches('\n').count() + 1);
        }
    }

    #[test]
    fn strings_hide_comment_starts() {
        let go = language("Go").unwrap();
        assert!(scan(go, "x := \"// not a comment\"").is_empty());
        assert!(scan(go, "x := '/*'").is_empty());
        assert!(scan(go, "x := \"\\\"// still a string\"").is_empty());
    }

    #[test]
    fn escaped_terminators_do_not_end_strings() {
        let c = language("C").unwrap();
        assert_eq!(
            scan(c, "char *s = \"a\\\"b // c\"; // d"),
            vec![comment(1, "// d")]
        );
        // An escaped backslash right before the terminator.
        assert_eq!(
            scan(c, "char *s = \"a\\\\\"; // d"),
            vec![comment(1, "// d")]
        );
    }

    #[test]
    fn raw_strings_ignore_backslashes() {
        let go = language("Go").unwrap();
        assert_eq!(
            scan(go, "x := `C:\\` // windows path\ny := `//`"),
            vec![comment(1, "// windows path")]
        );
    }

    #[test]
    fn rust_quote_chars_do_not_open_strings() {
        let rust = language("Rust").unwrap();
        assert_eq!(
            scan(rust, "s.push('\"'); // one\n    // two"),
            vec![comment(1, "// one"), comment(2, "// two")]
        );
        assert_eq!(
            scan(rust, "let c = '\\\"'; // three\nlet d = '\\''; // four"),
            vec![comment(1, "// three"), comment(2, "// four")]
        );
    }

    #[test]
    fn rust_raw_strings() {
        let rust = language("Rust").unwrap();
        assert_eq!(
            scan(rust, "let p = r\"C:\\\"; // path\n"),
            vec![comment(1, "// path")]
        );
        assert_eq!(
            scan(rust, "let s = r##\"a \"# // no\"##; // yes\n"),
            vec![comment(1, "// yes")]
        );
        assert_eq!(
            scan(rust, "let s = r#\"// no \\\"#; // yes"),
            vec![comment(1, "// yes")]
        );
    }

    #[test]
    fn doubled_delimiters_escape() {
        let sql = language("SQL").unwrap();
        assert_eq!(
            scan(sql, "SELECT 'it''s -- here' -- real\n"),
            vec![comment(1, "-- real")]
        );

        let cs = language("C#").unwrap();
        assert_eq!(
            scan(cs, "var s = @\"say \"\"// hi\"\"\"; // real"),
            vec![comment(1, "// real")]
        );
    }

    #[test]
    fn nested_comments_need_every_terminator() {
        let rust = language("Rust").unwrap();
        assert_eq!(
            scan(rust, "/* outer /* inner */ still-inside */ fn main() {}"),
            vec![comment(1, "/* outer /* inner */ still-inside */")]
        );

        let c = language("C").unwrap();
        assert_eq!(
            scan(c, "/* outer /* inner */ // after"),
            vec![comment(1, "/* outer /* inner */"), comment(1, "// after")]
        );
    }

    #[test]
    fn first_column_comments() {
        let ruby = language("Ruby").unwrap();
        let src = "x = 1 =begin\n=begin\nTODO: this\n  =end\n=end\n# tail";
        assert_eq!(
            scan(ruby, src),
            vec![
                comment(2, "=begin\nTODO: this\n  =end\n=end"),
                comment(6, "# tail")
            ]
        );
    }

    #[test]
    fn longest_delimiter_wins() {
        let lua = language("Lua").unwrap();
        assert_eq!(
            scan(lua, "--[[ block\n]] x = 1 -- line\ns = [[ -- not ]]"),
            vec![comment(1, "--[[ block\n]]"), comment(2, "-- line")]
        );

        let rust = language("Rust").unwrap();
        let comments: Vec<_> = CommentScanner::from_bytes(b"/// doc", Encoding::Utf8, rust)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            comments[0].kind,
            CommentKind::Line(&rust.line_comments[1])
        );
    }

    #[test]
    fn comment_or_string_is_decided_by_what_comes_first() {
        let vim = language("Vim Script").unwrap();
        let src = "\" a comment\nlet x = \"a string\"\nlet y = 1 \" trailing\n\"";
        assert_eq!(
            scan(vim, src),
            vec![
                comment(1, "\" a comment"),
                comment(3, "\" trailing"),
                comment(4, "\"")
            ]
        );
        let src = "echo \"esc \\\" still\" \" after";
        assert_eq!(scan(vim, src), vec![comment(1, "\" after")]);
    }

    #[test]
    fn multiline_wins_ties() {
        let tied = lang(
            "Tied",
            vec![
                langs::from_single("##"),
                langs::from_multi("##", "!!"),
                langs::raw("##"),
            ],
            vec![],
        );
        assert_eq!(
            scan(&tied, "## a\nb !! ## c"),
            vec![comment(1, "## a\nb !!")]
        );

        let string_tie = lang(
            "StringTie",
            vec![langs::from_multi("%%", "%%"), langs::raw("%%")],
            vec![],
        );
        assert_eq!(scan(&string_tie, "%% x %%"), vec![comment(1, "%% x %%")]);
    }

    #[test]
    fn eof_inside_a_token_is_not_an_error() {
        let c = language("C").unwrap();
        assert_eq!(
            scan(c, "// one\nchar *s = \"open // nope"),
            vec![comment(1, "// one")]
        );
        assert_eq!(scan(c, "// one\n/* never closed"), vec![comment(1, "// one")]);
        assert!(scan(c, "").is_empty());
    }

    #[test]
    fn decode_errors_halt_the_scan() {
        let c = language("C").unwrap();
        let mut scanner = CommentScanner::from_bytes(b"// ok\n\xFF// nope", Encoding::Utf8, c);
        assert_eq!(scanner.next().unwrap().unwrap().text, "// ok");
        assert!(matches!(scanner.next(), Some(Err(Error::Decode { .. }))));
        assert!(scanner.next().is_none());
    }

    #[test]
    fn scanning_twice_gives_the_same_comments() {
        let python = language("Python").unwrap();
        let src = "# one\ns = '# two'\n\"\"\"\nthree\n\"\"\"\nx = 1 # four\n";
        let first = scan(python, src);
        assert_eq!(first.len(), 3);
        assert_eq!(first, scan(python, src));
    }

    #[test]
    fn utf16_sources() {
        let c = language("C").unwrap();
        let mut bytes = Encoding::Utf16Le.bom().to_vec();
        bytes.extend("int x; // é\n".encode_utf16().flat_map(|u| u.to_le_bytes()));
        let comments: Vec<_> = CommentScanner::from_bytes(&bytes, Encoding::Utf16Le, c)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(comments[0].text, "// é");
    }
}
