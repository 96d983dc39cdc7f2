//! Supplemental `.hgeol` → `.gitattributes` translation.
//!
//! Mercurial's `.hgeol` extension stores per-pattern line-ending policy as an
//! INI file:
//!
//! ```ini
//! [patterns]
//! **.py = native
//! **.txt = LF
//! win32/** = CRLF
//!
//! [repository]
//! native = LF
//! ```
//!
//! Git expresses the same policy per pattern in `.gitattributes` via the
//! `text`/`eol` attributes. This is a separate translation from
//! `.hgignore`, enabled by its own `--convert-hgeol` flag, and is a
//! self-contained pure function, same shape as
//! [`crate::hgignore::hgignore_to_gitignore`].

/// Translate the contents of an `.hgeol` file into `.gitattributes` contents.
///
/// Unrecognized sections and keys are preserved as comments rather than
/// dropped.
#[must_use]
pub fn hgeol_to_gitattributes(data: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(data);
    let mut out = Vec::new();
    let mut section = Section::None;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            section = Section::parse(name.trim());
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            out.push(format!("# unrecognized .hgeol line: {raw_line}"));
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        match section {
            Section::Patterns => match eol_attribute(value) {
                Some(attr) => out.push(format!("{key} {attr}")),
                None => out.push(format!(
                    "# unrecognized .hgeol line-ending '{value}' for pattern '{key}'"
                )),
            },
            Section::Repository => {
                if key == "native" {
                    match eol_attribute(value) {
                        Some(attr) => out.push(format!("* {attr}")),
                        None => out.push(format!("# unrecognized .hgeol native setting '{value}'")),
                    }
                }
            }
            Section::None => {
                out.push(format!("# unrecognized .hgeol line: {raw_line}"));
            }
        }
    }

    out.push(String::new());
    out.join("\n").into_bytes()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Patterns,
    Repository,
}

impl Section {
    fn parse(name: &str) -> Self {
        match name {
            "patterns" => Self::Patterns,
            "repository" => Self::Repository,
            _ => Self::None,
        }
    }
}

fn eol_attribute(value: &str) -> Option<&'static str> {
    match value.to_ascii_uppercase().as_str() {
        "LF" => Some("text eol=lf"),
        "CRLF" => Some("text eol=crlf"),
        "NATIVE" => Some("text"),
        "BIN" | "BINARY" => Some("-text"),
        _ => None,
    }
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
    fn translates_pattern_policies() {
        let out = hgeol_to_gitattributes(b"[patterns]\n**.py = native\n**.txt = LF\n");
        let out = lines(&out);
        assert!(out.contains(&"**.py text".to_owned()));
        assert!(out.contains(&"**.txt text eol=lf".to_owned()));
    }

    #[test]
    fn translates_repository_native_default() {
        let out = hgeol_to_gitattributes(b"[repository]\nnative = CRLF\n");
        assert!(lines(&out).contains(&"* text eol=crlf".to_owned()));
    }

    #[test]
    fn unrecognized_lines_kept_as_comments() {
        let out = hgeol_to_gitattributes(b"[patterns]\n**.dat = weird\n");
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("# unrecognized"));
    }
}
