//! # Parsing TODOs out of comments.
use nom::{
    bytes::complete as bytes, character::complete as character, combinator, error::ErrorKind,
    Err, IResult, Parser,
};
use serde::Serialize;
use std::collections::VecDeque;

use super::comments::{Comment, CommentKind};
use crate::Error;

/// Annotation types recognized when none are configured.
pub const DEFAULT_TODO_TYPES: &[&str] = &["TODO", "FIXME", "BUG", "HACK", "XXX", "COMBAK"];

/// A TODO found in a comment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Todo {
    /// The annotation keyword, eg. "TODO".
    #[serde(rename = "type")]
    pub kind: String,
    /// The comment line the TODO was found on.
    pub text: String,
    pub label: String,
    pub message: String,
    /// The line of the TODO itself.
    pub line: usize,
    /// The line the enclosing comment starts on.
    pub comment_line: usize,
}

/// The pieces of an annotation at the start of a comment body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Annotation<'a> {
    pub kind: &'a str,
    pub label: &'a str,
    pub message: &'a str,
}

fn is_delimiter(c: char) -> bool {
    c == ':' || c == '-' || c == '/'
}

/// Whether the text following an annotation type lets the type stand on its
/// own, so that `TODOS` is not read as `TODO` followed by "S".
fn ends_type(rest: &str) -> bool {
    match rest.chars().next() {
        None => true,
        Some(c) => c.is_whitespace() || c == '(' || is_delimiter(c),
    }
}

/// Eat one of the given annotation types. Types are tried in order, so list
/// longer types before any of their prefixes.
///
/// ```rust
/// use todo_scanner_lib::parser::todos::todo_type;
///
/// let types = vec!["FIXME".to_string(), "TODO".to_string()];
/// assert_eq!(todo_type(&types, "TODO: eat"), Ok((": eat", "TODO")));
/// assert!(todo_type(&types, "TODOS").is_err());
/// assert!(todo_type(&types, "todo").is_err());
/// ```
pub fn todo_type<'i>(types: &[String], i: &'i str) -> IResult<&'i str, &'i str> {
    for kind in types.iter() {
        if let Ok((rest, kind)) = bytes::tag::<_, _, nom::error::Error<&str>>(kind.as_str())(i) {
            if ends_type(rest) {
                return Ok((rest, kind));
            }
        }
    }
    Err(Err::Error(nom::error::Error {
        input: i,
        code: ErrorKind::Tag,
    }))
}

/// Eat text up to the `)` that closes an already opened `(`, keeping any
/// nested pairs of parentheses.
fn balanced(i: &str) -> IResult<&str, &str> {
    let mut depth = 0usize;
    for (at, c) in i.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => return Ok((&i[at..], &i[..at])),
            ')' => depth -= 1,
            _ => {}
        }
    }
    Err(Err::Error(nom::error::Error {
        input: i,
        code: ErrorKind::TakeUntil,
    }))
}

/// Eat a parenthesized label.
///
/// ```rust
/// use todo_scanner_lib::parser::todos::label;
///
/// assert_eq!(label("(#123): fix"), Ok((": fix", "#123")));
/// assert_eq!(label("( https://example.com/1 )"), Ok(("", "https://example.com/1")));
/// assert_eq!(label("(foo(bar)): baz"), Ok((": baz", "foo(bar)")));
/// assert!(label("(unclosed").is_err());
/// assert!(label("(foo(bar): baz").is_err());
/// ```
pub fn label(i: &str) -> IResult<&str, &str> {
    let (i, _) = character::char('(')(i)?;
    let (i, label) = balanced(i)?;
    let (i, _) = character::char(')')(i)?;
    Ok((i, label.trim()))
}

/// Eat a whole annotation: an optional `@`, the type, an optional label, and
/// an optional message after any run of `:`, `-` or `/`.
///
/// The input should be a single trimmed line of comment text with the comment
/// delimiters already removed.
///
/// ```rust
/// use todo_scanner_lib::parser::todos::{annotation, Annotation};
///
/// let types = vec!["TODO".to_string()];
/// assert_eq!(
///     annotation(&types, "@TODO(#123): fix this"),
///     Ok((
///         "",
///         Annotation {
///             kind: "TODO",
///             label: "#123",
///             message: "fix this"
///         }
///     ))
/// );
/// assert!(annotation(&types, "see TODO later").is_err());
/// ```
pub fn annotation<'i>(types: &[String], i: &'i str) -> IResult<&'i str, Annotation<'i>> {
    let (i, _) = combinator::opt(character::char('@')).parse(i)?;
    let (i, kind) = todo_type(types, i)?;
    let (i, label) = combinator::opt(label).parse(i)?;
    if label.is_none() && i.starts_with('(') {
        // An opened but never closed label.
        return Err(Err::Error(nom::error::Error {
            input: i,
            code: ErrorKind::Char,
        }));
    }
    let (i, _) = character::space0(i)?;
    let (i, _) = bytes::take_while(is_delimiter)(i)?;
    let (i, _) = character::space0(i)?;
    Ok((
        "",
        Annotation {
            kind,
            label: label.unwrap_or_default(),
            message: i.trim_end(),
        },
    ))
}

fn todo_from(annotation: Annotation<'_>, text: &str, line: usize, comment_line: usize) -> Todo {
    Todo {
        kind: annotation.kind.to_string(),
        text: text.to_string(),
        label: annotation.label.to_string(),
        message: annotation.message.to_string(),
        line,
        comment_line,
    }
}

/// Sort annotation types longest first, so a type is never shadowed by one of
/// its prefixes.
pub fn sort_types(types: impl IntoIterator<Item = impl Into<String>>) -> Vec<String> {
    let mut types = types.into_iter().map(Into::into).collect::<Vec<String>>();
    types.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    types.dedup();
    types
}

/// Find every TODO in a comment.
///
/// `types` must already be sorted with [`sort_types`].
pub fn find_todos(types: &[String], comment: &Comment<'_>) -> Vec<Todo> {
    match comment.kind {
        CommentKind::Line(rule) => {
            let body = comment
                .text
                .strip_prefix(rule.start)
                .unwrap_or(&comment.text)
                .trim();
            annotation(types, body)
                .map(|(_, a)| vec![todo_from(a, &comment.text, comment.line, comment.line)])
                .unwrap_or_default()
        }
        CommentKind::Multiline(rule) => {
            let lines = comment.text.split('\n').collect::<Vec<_>>();
            let last = lines.len() - 1;
            let mut todos = vec![];
            for (offset, text) in lines.into_iter().enumerate() {
                let text = text.strip_suffix('\r').unwrap_or(text);
                let mut body = text;
                if offset == 0 {
                    body = body.strip_prefix(rule.start).unwrap_or(body);
                }
                if offset == last {
                    body = body.strip_suffix(rule.end).unwrap_or(body);
                }
                let body = body
                    .trim_start_matches(|c: char| c == '*' || c.is_whitespace())
                    .trim_end();
                if let Ok((_, a)) = annotation(types, body) {
                    todos.push(todo_from(a, text, comment.line + offset, comment.line));
                }
            }
            todos
        }
    }
}

/// Scans comments for TODOs.
///
/// ```rust
/// use todo_scanner_lib::parser::{
///     comments::CommentScanner, langs::language, runes::Encoding, todos::TodoScanner,
/// };
///
/// let rust = language("Rust").unwrap();
/// let src = "// TODO(#1): first\nfn main() {}\n/*\n * FIXME: second\n */\n";
/// let comments = CommentScanner::from_bytes(src.as_bytes(), Encoding::Utf8, rust);
/// let todos = TodoScanner::new(comments, ["TODO", "FIXME"])
///     .collect::<Result<Vec<_>, _>>()
///     .unwrap();
///
/// assert_eq!(todos.len(), 2);
/// assert_eq!(todos[0].label, "#1");
/// assert_eq!(todos[1].kind, "FIXME");
/// assert_eq!((todos[1].line, todos[1].comment_line), (4, 3));
/// ```
pub struct TodoScanner<I> {
    comments: I,
    types: Vec<String>,
    pending: VecDeque<Todo>,
}

impl<'c, I> TodoScanner<I>
where
    I: Iterator<Item = Result<Comment<'c>, Error>>,
{
    pub fn new(comments: I, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        TodoScanner {
            comments,
            types: sort_types(types),
            pending: VecDeque::new(),
        }
    }

    /// Find the next TODO. Returns `Ok(None)` once the comments run out.
    pub fn next_todo(&mut self) -> Result<Option<Todo>, Error> {
        loop {
            if let Some(todo) = self.pending.pop_front() {
                return Ok(Some(todo));
            }
            match self.comments.next() {
                None => return Ok(None),
                Some(comment) => {
                    let comment = comment?;
                    self.pending.extend(find_todos(&self.types, &comment));
                }
            }
        }
    }
}

impl<'c, I> Iterator for TodoScanner<I>
where
    I: Iterator<Item = Result<Comment<'c>, Error>>,
{
    type Item = Result<Todo, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_todo().transpose()
    }
}
