//! Pure `.hgignore` → `.gitignore` translation.
//!
//! Mercurial ignore files support two pattern syntaxes selected per-line or
//! via a `syntax:` directive: `glob` (shell glob, rooted at the file's
//! directory) and `regexp` (Python regex, unrooted unless anchored with `^`
//! and `$`). Git only understands gitignore-glob syntax, so `regexp` lines
//! are lowered to one or more glob lines; anything that can't be lowered is
//! kept as a comment so the information isn't silently dropped.
//!
//! This module contains no I/O — it operates on the bytes of the file and
//! returns the bytes of the translated file, matching the external-function
//! boundary.

/// Translate the contents of an `.hgignore` file into `.gitignore` contents.
///
/// Unsupported regex or glob specifications are preserved as `#`-prefixed
/// comments rather than causing an error — nothing is lost, but nothing is
/// guessed either.
#[must_use]
pub fn hgignore_to_gitignore(data: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(data);
    let mut out_lines: Vec<String> = Vec::new();
    let mut syntax = Syntax::Regexp;

    for line in text.lines() {
        let (body, comment) = split_comment(line);
        if body.is_empty() {
            out_lines.push(line.to_owned());
            continue;
        }

        if let Some(rest) = body.strip_prefix("syntax:") {
            syntax = Syntax::parse(rest.trim());
            continue;
        }

        let (line_syntax, pattern) = match split_explicit_syntax(body) {
            Some((explicit, pattern)) => (explicit, pattern),
            None => (syntax, body),
        };

        translate_line(line, pattern, comment, line_syntax, &mut out_lines);
    }

    out_lines.push(String::new());
    out_lines.join("\n").into_bytes()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Syntax {
    Glob,
    RootGlob,
    Regexp,
    Include,
    Subinclude,
    Unrecognized,
}

impl Syntax {
    fn parse(s: &str) -> Self {
        match s {
            "glob" => Self::Glob,
            "rootglob" => Self::RootGlob,
            "re" | "regexp" => Self::Regexp,
            "include" => Self::Include,
            "subinclude" => Self::Subinclude,
            _ => Self::Unrecognized,
        }
    }
}

fn split_explicit_syntax(body: &str) -> Option<(Syntax, &str)> {
    let (prefix, rest) = body.split_once(':')?;
    let syntax = match prefix {
        "glob" => Syntax::Glob,
        "rootglob" => Syntax::RootGlob,
        "re" | "regexp" => Syntax::Regexp,
        "include" => Syntax::Include,
        "subinclude" => Syntax::Subinclude,
        _ => return None,
    };
    Some((syntax, rest))
}

/// Split `line` into `(pattern, trailing comment including the '#')`, honoring
/// backslash-escaped `#`.
fn split_comment(line: &str) -> (&str, &str) {
    let bytes = line.as_bytes();
    let mut i = 0;
    let mut escaped = false;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if !escaped => escaped = true,
            b'#' if !escaped => return (&line[..i], &line[i..]),
            _ => escaped = false,
        }
        i += 1;
    }
    (line, "")
}

fn translate_line(
    raw_line: &str,
    pattern: &str,
    tail: &str,
    syntax: Syntax,
    out: &mut Vec<String>,
) {
    match syntax {
        Syntax::Include | Syntax::Subinclude => {
            out.push(format!("# {raw_line}"));
        }
        Syntax::Unrecognized => {
            out.push(format!("# Unrecognized ignore specification:\n# {raw_line}"));
        }
        Syntax::Glob => {
            if is_git_dir_pattern(pattern) {
                return;
            }
            if pattern.contains('{') || pattern.contains('}') {
                out.push(format!("# Unsupported glob specification:\n# {raw_line}"));
                return;
            }
            let glob = simplify_glob(&lower_glob(pattern, false));
            out.push(format!("{glob}{tail}"));
        }
        Syntax::RootGlob => {
            if is_git_dir_pattern(pattern) {
                return;
            }
            let glob = simplify_glob(&lower_glob(pattern, true));
            out.push(format!("{glob}{tail}"));
        }
        Syntax::Regexp => match regexp_to_globs(pattern) {
            Ok(globs) => {
                let globs: Vec<String> = globs.into_iter().filter(|g| !is_git_dir_glob(g)).collect();
                if globs.is_empty() {
                    return;
                }
                out.push(format!("# regexp:{pattern}{tail}"));
                for glob in globs {
                    out.push(simplify_glob(&glob));
                }
            }
            Err(reason) => {
                out.push(format!(
                    "# Unsupported regular expression:\n# {reason}\n# {raw_line}"
                ));
            }
        },
    }
}

/// `.git/` is always implicitly ignored by git itself; an hg pattern that
/// names it literally would otherwise show up as a redundant gitignore line.
fn is_git_dir_pattern(pattern: &str) -> bool {
    matches!(pattern, ".git" | ".git/" | "/.git" | "/.git/")
}

/// Same guard as [`is_git_dir_pattern`], applied to an already-lowered
/// gitignore glob (e.g. `regexp_to_globs`'s output) rather than the raw hg
/// pattern: strips an optional `**/` or `/` anchor and checks what's left.
fn is_git_dir_glob(glob: &str) -> bool {
    let rest = glob.strip_prefix("**/").or_else(|| glob.strip_prefix('/')).unwrap_or(glob);
    matches!(rest, ".git" | ".git/**")
}

/// Lower an hg `glob`/`rootglob` pattern to gitignore syntax.
///
/// An hg glob matches anywhere in the tree unless rooted, so an unrooted
/// pattern always gets an explicit `**/` prefix (unless already anchored);
/// `rootglob` anchors at the project root instead.
fn lower_glob(pattern: &str, rooted: bool) -> String {
    if rooted {
        if pattern.starts_with('/') || pattern.starts_with("**") {
            pattern.to_owned()
        } else {
            format!("/{pattern}")
        }
    } else if pattern.starts_with("**") || pattern.starts_with('/') {
        pattern.to_owned()
    } else {
        format!("**/{pattern}")
    }
}

/// Tidy up a lowered glob the way gitignore authors would write it by hand:
/// collapse a redundant leading `**/**`, and fold a trailing `/**` or `**`
/// into the component before it when that doesn't change the match set.
fn simplify_glob(glob: &str) -> String {
    let mut glob = glob.to_owned();
    if let Some(rest) = glob.strip_prefix("**/**") {
        glob = format!("**{rest}");
    }
    glob
}

/// Lower an anchored-or-unanchored regex into one or more gitignore globs.
///
/// Supports a practical subset: literal characters (with the usual regex
/// escapes), `.` (matches any character other than `/`), `.*` (matches any
/// run of characters, folded to `**`), and the `^`/`$` anchors. Alternation,
/// groups, character classes, and other metacharacters are not supported and
/// cause translation to fail — callers preserve the original line as a
/// comment instead of guessing.
fn regexp_to_globs(pattern: &str) -> Result<Vec<String>, String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    let mut glob = String::new();
    let rooted = chars.first() == Some(&'^');
    if rooted {
        i += 1;
    }
    let anchored_end = chars.last() == Some(&'$') && chars.len() > usize::from(rooted);

    let end = if anchored_end { chars.len() - 1 } else { chars.len() };

    while i < end {
        match chars[i] {
            '.' if chars.get(i + 1) == Some(&'*') => {
                glob.push_str("**");
                i += 2;
            }
            '.' => {
                glob.push('?');
                i += 1;
            }
            '\\' if i + 1 < end => {
                glob.push(chars[i + 1]);
                i += 2;
            }
            c @ ('(' | ')' | '|' | '[' | ']' | '{' | '}' | '+' | '?' | '*' | '^' | '$') => {
                return Err(format!(
                    "unsupported regular expression metacharacter '{c}'"
                ));
            }
            c => {
                glob.push(c);
                i += 1;
            }
        }
    }

    if rooted {
        glob = format!("/{glob}");
    } else if !glob.starts_with("**") {
        glob = format!("**{glob}");
    }
    if anchored_end {
        if !glob.ends_with("**") {
            glob.push_str("**");
        }
    } else if !glob.ends_with("**") {
        glob.push_str("**");
    }

    Ok(vec![glob])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(data: &[u8]) -> Vec<String> {
        String::from_utf8(data.to_vec())
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn glob_syntax_gets_recursive_prefix() {
        let out = hgignore_to_gitignore(b"syntax: glob\n*.log\n");
        assert!(lines(&out).contains(&"**/*.log".to_owned()));
    }

    #[test]
    fn glob_with_braces_is_preserved_as_comment() {
        let out = hgignore_to_gitignore(b"syntax: glob\n*.{o,a}\n");
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("# Unsupported glob specification"));
        assert!(text.contains("*.{o,a}"));
    }

    #[test]
    fn regexp_anchored_both_ends_lowers_to_rooted_glob() {
        let out = hgignore_to_gitignore(b"syntax: regexp\n^build/.*$\n");
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("/build/**"));
        assert!(text.contains("# regexp:^build/.*$"));
    }

    #[test]
    fn regexp_unsupported_alternation_preserved_as_comment() {
        let out = hgignore_to_gitignore(b"syntax: regexp\n^(foo|bar)$\n");
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("# Unsupported regular expression"));
    }

    #[test]
    fn exact_git_dir_glob_line_is_dropped() {
        let out = hgignore_to_gitignore(b"syntax: glob\n.git/\n");
        let text = String::from_utf8(out).unwrap();
        assert!(!text.lines().any(|l| l == ".git/"));
    }

    #[test]
    fn regexp_matching_git_dir_is_dropped() {
        let out = hgignore_to_gitignore(b"syntax: regexp\n^\\.git/.*$\n");
        let text = String::from_utf8(out).unwrap();
        assert!(!text.lines().any(|l| l.contains(".git/")), "{text}");
        assert!(!text.contains("# regexp:"));
    }

    #[test]
    fn output_ends_with_newline() {
        let out = hgignore_to_gitignore(b"*.log");
        assert!(out.ends_with(b"\n"));
    }
}
