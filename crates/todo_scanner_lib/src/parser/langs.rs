//! # Comment and string syntax of supported languages.
//!
//! The table is compiled in and built once on first use. Nothing mutates it
//! afterwards.
use std::{collections::HashMap, path::Path, sync::LazyLock};

use crate::{Error, UnsupportedLanguageSnafu};

/// How a string literal escapes its own terminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Escape {
    /// Nothing escapes the terminator, eg. Go's raw strings.
    None,
    /// The terminator is escaped when preceded by this character.
    Char(char),
    /// The terminator is escaped by doubling it, eg. SQL's `''`.
    Double,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LineCommentConfig {
    pub start: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MultilineCommentConfig {
    pub start: &'static str,
    pub end: &'static str,
    /// Both delimiters only count in the very first column of a line.
    pub at_first_column: bool,
    /// The start delimiter may recur inside the comment, and each occurrence
    /// needs its own end delimiter.
    pub nested: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StringConfig {
    pub start: &'static str,
    pub end: &'static str,
    pub escape: Escape,
}

/// One piece of a language's syntax.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Syntax {
    Single(LineCommentConfig),
    Multi(MultilineCommentConfig),
    Str(StringConfig),
}

/// The comment and string syntax of one language.
///
/// Order matters within each list: among candidates of equal length the one
/// declared first wins.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LanguageConfig {
    pub name: &'static str,
    /// Lowercase file extensions, without the dot.
    pub extensions: Vec<&'static str>,
    /// Exact file names, eg. "Makefile".
    pub filenames: Vec<&'static str>,
    pub line_comments: Vec<LineCommentConfig>,
    pub multiline_comments: Vec<MultilineCommentConfig>,
    pub strings: Vec<StringConfig>,
}

impl LanguageConfig {
    pub fn add_syntax(&mut self, syntax: Syntax) {
        match syntax {
            Syntax::Single(c) => self.line_comments.push(c),
            Syntax::Multi(c) => self.multiline_comments.push(c),
            Syntax::Str(s) => self.strings.push(s),
        }
    }

    pub fn with_filenames(mut self, filenames: Vec<&'static str>) -> Self {
        self.filenames = filenames;
        self
    }
}

pub fn lang(name: &'static str, syntax: Vec<Syntax>, exts: Vec<&'static str>) -> LanguageConfig {
    let mut language = LanguageConfig {
        name,
        extensions: exts,
        filenames: vec![],
        line_comments: vec![],
        multiline_comments: vec![],
        strings: vec![],
    };
    syntax.into_iter().for_each(|s| language.add_syntax(s));
    language
}

pub fn from_single(start: &'static str) -> Syntax {
    Syntax::Single(LineCommentConfig { start })
}

fn multi(start: &'static str, end: &'static str) -> MultilineCommentConfig {
    MultilineCommentConfig {
        start,
        end,
        at_first_column: false,
        nested: false,
    }
}

pub fn from_multi(start: &'static str, end: &'static str) -> Syntax {
    Syntax::Multi(multi(start, end))
}

pub fn from_nested(start: &'static str, end: &'static str) -> Syntax {
    Syntax::Multi(MultilineCommentConfig {
        nested: true,
        ..multi(start, end)
    })
}

pub fn from_first_column(start: &'static str, end: &'static str) -> Syntax {
    Syntax::Multi(MultilineCommentConfig {
        at_first_column: true,
        ..multi(start, end)
    })
}

pub fn from_string(start: &'static str, end: &'static str, escape: Escape) -> Syntax {
    Syntax::Str(StringConfig { start, end, escape })
}

/// A string delimited by the same sequence on both ends, escaped with a
/// backslash.
pub fn quoted(delim: &'static str) -> Syntax {
    from_string(delim, delim, Escape::Char('\\'))
}

pub fn raw(delim: &'static str) -> Syntax {
    from_string(delim, delim, Escape::None)
}

pub fn doubled(delim: &'static str) -> Syntax {
    from_string(delim, delim, Escape::Double)
}

pub fn c_style() -> Vec<Syntax> {
    vec![
        from_single("//"),
        from_multi("/*", "*/"),
        quoted("\""),
        quoted("'"),
    ]
}

/// C style plus `///` and `//!` doc comments.
pub fn c_doc_style() -> Vec<Syntax> {
    let mut c = c_style();
    c.extend([from_single("///"), from_single("//!")]);
    c
}

pub fn hash_style() -> Vec<Syntax> {
    vec![from_single("#"), quoted("\""), quoted("'")]
}

pub fn haskell_style() -> Vec<Syntax> {
    vec![from_single("--"), from_nested("{-", "-}"), quoted("\"")]
}

pub fn lisp_style() -> Vec<Syntax> {
    vec![from_single(";"), quoted("\"")]
}

pub fn xml_style() -> Vec<Syntax> {
    vec![from_multi("<!--", "-->")]
}

pub fn all_languages() -> Vec<LanguageConfig> {
    vec![
        lang(
            "Assembly",
            vec![from_single(";"), quoted("\"")],
            vec!["asm", "s", "nasm"],
        ),
        lang(
            "Batchfile",
            vec![
                from_single("REM "),
                from_single("rem "),
                from_single("@REM "),
                from_single("@rem "),
                from_single("::"),
            ],
            vec!["bat", "cmd", "btm"],
        ),
        lang("C", c_style(), vec!["c", "h"]),
        lang(
            "C#",
            {
                let mut cs = c_doc_style();
                // Verbatim strings, where `""` stands for a quote.
                cs.push(from_string("@\"", "\"", Escape::Double));
                cs
            },
            vec!["cs"],
        ),
        lang(
            "C++",
            {
                let mut cpp = c_doc_style();
                cpp.push(from_string("R\"(", ")\"", Escape::None));
                cpp
            },
            vec!["cpp", "cc", "cxx", "c++", "hpp", "hh", "hxx", "ino"],
        ),
        lang("Clojure", lisp_style(), vec!["clj", "cljs", "cljc", "edn"]),
        lang(
            "CMake",
            vec![from_single("#"), from_multi("#[[", "]]"), quoted("\"")],
            vec!["cmake"],
        )
        .with_filenames(vec!["CMakeLists.txt"]),
        lang(
            "CoffeeScript",
            vec![
                from_single("#"),
                from_multi("###", "###"),
                quoted("\"\"\""),
                quoted("'''"),
                quoted("\""),
                quoted("'"),
            ],
            vec!["coffee", "litcoffee"],
        ),
        lang(
            "Common Lisp",
            {
                let mut lisp = lisp_style();
                lisp.push(from_nested("#|", "|#"));
                lisp
            },
            vec!["lisp", "lsp", "cl"],
        ),
        lang(
            "CSS",
            vec![from_multi("/*", "*/"), quoted("\""), quoted("'")],
            vec!["css"],
        ),
        lang(
            "D",
            {
                let mut d = c_doc_style();
                d.extend([from_nested("/+", "+/"), raw("`")]);
                d
            },
            vec!["d"],
        ),
        lang(
            "Dart",
            vec![
                from_single("//"),
                from_single("///"),
                from_nested("/*", "*/"),
                quoted("\"\"\""),
                quoted("'''"),
                quoted("\""),
                quoted("'"),
            ],
            vec!["dart"],
        ),
        lang("Dockerfile", vec![from_single("#")], vec!["dockerfile"])
            .with_filenames(vec!["Dockerfile", "Containerfile"]),
        lang(
            "Elixir",
            vec![
                from_single("#"),
                quoted("\"\"\""),
                quoted("\""),
                quoted("'"),
            ],
            vec!["ex", "exs"],
        ),
        lang(
            "Elm",
            {
                let mut elm = haskell_style();
                elm.push(quoted("\"\"\""));
                elm
            },
            vec!["elm"],
        ),
        lang("Emacs Lisp", lisp_style(), vec!["el"]),
        lang(
            "Erlang",
            vec![from_single("%"), quoted("\"")],
            vec!["erl", "hrl"],
        ),
        lang(
            "F#",
            vec![
                from_single("//"),
                from_single("///"),
                from_multi("(*", "*)"),
                raw("\"\"\""),
                quoted("\""),
            ],
            vec!["fs", "fsi", "fsx"],
        ),
        lang(
            "Fortran",
            vec![from_single("!"), doubled("\""), doubled("'")],
            vec!["f90", "f95", "f03", "f08"],
        ),
        lang(
            "Go",
            {
                let mut go = c_style();
                go.push(raw("`"));
                go
            },
            vec!["go"],
        ),
        lang(
            "GraphQL",
            vec![from_single("#"), quoted("\"\"\""), quoted("\"")],
            vec!["graphql", "gql"],
        ),
        lang(
            "Groovy",
            {
                let mut groovy = c_style();
                groovy.extend([quoted("\"\"\""), quoted("'''")]);
                groovy
            },
            vec!["groovy", "gradle"],
        ),
        lang("Haskell", haskell_style(), vec!["hs"]),
        lang(
            "HCL",
            vec![
                from_single("#"),
                from_single("//"),
                from_multi("/*", "*/"),
                quoted("\""),
            ],
            vec!["tf", "tfvars", "hcl"],
        ),
        lang("HTML", xml_style(), vec!["html", "htm", "xhtml"]),
        lang(
            "Java",
            {
                let mut java = c_style();
                java.push(quoted("\"\"\""));
                java
            },
            vec!["java"],
        ),
        lang(
            "JavaScript",
            {
                let mut js = c_style();
                js.push(quoted("`"));
                js
            },
            vec!["js", "mjs", "cjs", "jsx", "es6"],
        ),
        lang(
            "Julia",
            vec![
                from_single("#"),
                from_nested("#=", "=#"),
                quoted("\"\"\""),
                quoted("\""),
            ],
            vec!["jl"],
        ),
        lang(
            "Kotlin",
            vec![
                from_single("//"),
                from_nested("/*", "*/"),
                raw("\"\"\""),
                quoted("\""),
                quoted("'"),
            ],
            vec!["kt", "kts"],
        ),
        lang("Less", c_style(), vec!["less"]),
        lang(
            "Lua",
            vec![
                from_single("--"),
                from_multi("--[[", "]]"),
                quoted("\""),
                quoted("'"),
                from_string("[[", "]]", Escape::None),
            ],
            vec!["lua"],
        ),
        lang("Makefile", vec![from_single("#")], vec!["mk", "mak"])
            .with_filenames(vec!["Makefile", "makefile", "GNUmakefile"]),
        lang(
            "Nim",
            vec![
                from_single("#"),
                from_nested("#[", "]#"),
                raw("\"\"\""),
                quoted("\""),
            ],
            vec!["nim"],
        ),
        lang(
            "Nix",
            vec![
                from_single("#"),
                from_multi("/*", "*/"),
                quoted("\""),
                raw("''"),
            ],
            vec!["nix"],
        ),
        lang("Objective-C", c_style(), vec!["m", "mm"]),
        lang(
            "OCaml",
            vec![from_nested("(*", "*)"), quoted("\"")],
            vec!["ml", "mli"],
        ),
        lang(
            "Pascal",
            vec![
                from_single("//"),
                from_multi("{", "}"),
                from_multi("(*", "*)"),
                doubled("'"),
            ],
            vec!["pas", "pp", "dpr", "lpr"],
        ),
        lang(
            "Perl",
            {
                let mut perl = hash_style();
                perl.push(from_first_column("=pod", "=cut"));
                perl
            },
            vec!["pl", "pm", "t"],
        ),
        lang(
            "PHP",
            {
                let mut php = c_style();
                php.push(from_single("#"));
                php
            },
            vec!["php", "phtml", "php3", "php4", "php5", "php7", "phps"],
        ),
        lang(
            "PowerShell",
            vec![
                from_single("#"),
                from_multi("<#", "#>"),
                from_string("\"", "\"", Escape::Char('`')),
                doubled("'"),
            ],
            vec!["ps1", "psm1", "psd1"],
        ),
        lang("Protocol Buffer", c_style(), vec!["proto"]),
        lang(
            "PureScript",
            {
                let mut purs = haskell_style();
                purs.push(raw("\"\"\""));
                purs
            },
            vec!["purs"],
        ),
        lang(
            "Python",
            {
                let mut python = hash_style();
                python.extend([
                    from_multi("\"\"\"", "\"\"\""),
                    from_multi("'''", "'''"),
                ]);
                python
            },
            vec!["py", "pyw", "pyi"],
        ),
        lang("R", hash_style(), vec!["r"]),
        lang(
            "Ruby",
            {
                let mut ruby = hash_style();
                ruby.push(from_first_column("=begin", "=end"));
                ruby
            },
            vec!["rb", "rake", "gemspec"],
        )
        .with_filenames(vec!["Rakefile", "Gemfile"]),
        lang(
            "Rust",
            vec![
                from_single("//"),
                from_single("///"),
                from_single("//!"),
                from_nested("/*", "*/"),
                quoted("\""),
                // Char literals holding a quote, so they don't open a string.
                from_string("'\"", "'", Escape::None),
                from_string("'\\\"", "'", Escape::None),
                from_string("r\"", "\"", Escape::None),
                from_string("r#\"", "\"#", Escape::None),
                from_string("r##\"", "\"##", Escape::None),
                from_string("r###\"", "\"###", Escape::None),
            ],
            vec!["rs"],
        ),
        lang(
            "Scala",
            vec![
                from_single("//"),
                from_nested("/*", "*/"),
                raw("\"\"\""),
                quoted("\""),
                quoted("'"),
            ],
            vec!["scala", "sc", "sbt"],
        ),
        lang("SCSS", c_style(), vec!["scss", "sass"]),
        lang(
            "Shell",
            vec![from_single("#"), quoted("\""), raw("'")],
            vec!["sh", "bash", "zsh", "ksh", "fish"],
        ),
        lang("Solidity", c_doc_style(), vec!["sol"]),
        lang(
            "SQL",
            vec![
                from_single("--"),
                from_multi("/*", "*/"),
                doubled("'"),
                doubled("\""),
            ],
            vec!["sql"],
        ),
        lang(
            "Starlark",
            {
                let mut starlark = hash_style();
                starlark.extend([quoted("\"\"\""), quoted("'''")]);
                starlark
            },
            vec!["bzl", "star"],
        )
        .with_filenames(vec!["BUILD", "BUILD.bazel", "WORKSPACE"]),
        lang(
            "Swift",
            vec![
                from_single("//"),
                from_single("///"),
                from_nested("/*", "*/"),
                quoted("\"\"\""),
                quoted("\""),
            ],
            vec!["swift"],
        ),
        lang(
            "TeX",
            vec![from_single("%")],
            vec!["tex", "sty", "cls", "ltx"],
        ),
        lang(
            "TOML",
            vec![
                from_single("#"),
                quoted("\"\"\""),
                raw("'''"),
                quoted("\""),
                raw("'"),
            ],
            vec!["toml"],
        ),
        lang(
            "TypeScript",
            {
                let mut ts = c_style();
                ts.push(quoted("`"));
                ts
            },
            vec!["ts", "tsx", "mts", "cts"],
        ),
        lang(
            "Verilog",
            vec![from_single("//"), from_multi("/*", "*/"), quoted("\"")],
            vec!["v", "sv", "svh", "vh"],
        ),
        lang(
            "VHDL",
            vec![from_single("--"), doubled("\"")],
            vec!["vhd", "vhdl"],
        ),
        lang(
            "Vim Script",
            // `"` opens both a comment and a string.
            vec![from_single("\""), quoted("\""), doubled("'")],
            vec!["vim"],
        )
        .with_filenames(vec![".vimrc", "_vimrc"]),
        lang(
            "Visual Basic",
            vec![from_single("'"), doubled("\"")],
            vec!["vb", "vbs", "bas", "frm"],
        ),
        lang(
            "XML",
            xml_style(),
            vec!["xml", "xsd", "xsl", "xslt", "svg", "plist"],
        ),
        lang(
            "YAML",
            vec![from_single("#"), quoted("\""), doubled("'")],
            vec!["yaml", "yml"],
        ),
        lang(
            "Zig",
            vec![
                from_single("//"),
                from_single("///"),
                from_single("//!"),
                quoted("\""),
                quoted("'"),
            ],
            vec!["zig"],
        ),
    ]
}

/// Every supported language. Where two languages claim the same extension the
/// one listed first wins.
pub static LANGUAGES: LazyLock<Vec<LanguageConfig>> = LazyLock::new(all_languages);

static BY_NAME: LazyLock<HashMap<String, &'static LanguageConfig>> = LazyLock::new(|| {
    LANGUAGES
        .iter()
        .map(|language| (language.name.to_lowercase(), language))
        .collect()
});

static BY_EXTENSION: LazyLock<HashMap<&'static str, &'static LanguageConfig>> =
    LazyLock::new(|| {
        let mut map = HashMap::new();
        for language in LANGUAGES.iter() {
            for ext in language.extensions.iter() {
                map.entry(*ext).or_insert(language);
            }
        }
        map
    });

static BY_FILENAME: LazyLock<HashMap<&'static str, &'static LanguageConfig>> =
    LazyLock::new(|| {
        let mut map = HashMap::new();
        for language in LANGUAGES.iter() {
            for filename in language.filenames.iter() {
                map.entry(*filename).or_insert(language);
            }
        }
        map
    });

/// Look up a language by name, ignoring case.
///
/// ```rust
/// use todo_scanner_lib::parser::langs::language;
///
/// assert_eq!(language("rust").unwrap().name, "Rust");
/// assert!(language("Klingon").is_err());
/// ```
pub fn language(name: &str) -> Result<&'static LanguageConfig, Error> {
    BY_NAME
        .get(&name.to_lowercase())
        .copied()
        .ok_or_else(|| UnsupportedLanguageSnafu { name }.build())
}

/// Detect the language of a file from its name or extension.
///
/// ```rust
/// use todo_scanner_lib::parser::langs::language_for_path;
///
/// assert_eq!(language_for_path("src/main.rs").unwrap().name, "Rust");
/// assert_eq!(language_for_path("Makefile").unwrap().name, "Makefile");
/// assert_eq!(language_for_path("LIB.GO").unwrap().name, "Go");
/// assert!(language_for_path("notes.unknown").is_none());
/// ```
pub fn language_for_path(path: impl AsRef<Path>) -> Option<&'static LanguageConfig> {
    let path = path.as_ref();
    let by_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| BY_FILENAME.get(name));
    if let Some(language) = by_name {
        return Some(language);
    }
    let ext = path.extension()?.to_str()?.to_lowercase();
    BY_EXTENSION.get(ext.as_str()).copied()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn names_are_unique() {
        let names: HashSet<_> = LANGUAGES.iter().map(|l| l.name.to_lowercase()).collect();
        assert_eq!(names.len(), LANGUAGES.len());
    }

    #[test]
    fn extensions_are_lowercase() {
        for language in LANGUAGES.iter() {
            for ext in language.extensions.iter() {
                assert_eq!(ext.to_lowercase(), *ext, "{}", language.name);
                assert!(!ext.starts_with('.'), "{}", language.name);
            }
        }
    }

    #[test]
    fn delimiters_are_not_empty() {
        for language in LANGUAGES.iter() {
            assert!(language.line_comments.iter().all(|c| !c.start.is_empty()));
            assert!(language
                .multiline_comments
                .iter()
                .all(|c| !c.start.is_empty() && !c.end.is_empty()));
            assert!(language
                .strings
                .iter()
                .all(|s| !s.start.is_empty() && !s.end.is_empty()));
        }
    }

    #[test]
    fn string_starts_are_distinct() {
        for language in LANGUAGES.iter() {
            let starts: HashSet<_> = language.strings.iter().map(|s| s.start).collect();
            assert_eq!(starts.len(), language.strings.len(), "{}", language.name);
        }
    }

    #[test]
    fn syntax_keeps_declaration_order() {
        let rust = language("Rust").unwrap();
        let starts: Vec<_> = rust.line_comments.iter().map(|c| c.start).collect();
        assert_eq!(starts, vec!["//", "///", "//!"]);
        assert!(rust.multiline_comments[0].nested);

        let ruby = language("ruby").unwrap();
        assert!(ruby.multiline_comments[0].at_first_column);
        assert!(!ruby.multiline_comments[0].nested);
    }

    #[test]
    fn unknown_language_is_unsupported() {
        match language("Brainfudge") {
            Err(Error::UnsupportedLanguage { name }) => assert_eq!(name, "Brainfudge"),
            other => panic!("expected an unsupported language, got {other:?}"),
        }
    }

    #[test]
    fn first_listed_language_wins_an_extension() {
        assert_eq!(language_for_path("a.h").unwrap().name, "C");
        assert_eq!(language_for_path("a.m").unwrap().name, "Objective-C");
        assert_eq!(language_for_path("a.s").unwrap().name, "Assembly");
    }

    #[test]
    fn detects_by_filename() {
        assert_eq!(
            language_for_path("docker/Dockerfile").unwrap().name,
            "Dockerfile"
        );
        assert_eq!(language_for_path("CMakeLists.txt").unwrap().name, "CMake");
        assert_eq!(
            language_for_path("/home/me/.vimrc").unwrap().name,
            "Vim Script"
        );
        assert!(language_for_path("README").is_none());
    }
}
