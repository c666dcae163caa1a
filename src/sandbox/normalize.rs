use std::sync::LazyLock;

use regex::Regex;

const DEFAULT_CLASS: &str = "Main";

static MAIN_METHOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bstatic\s+void\s+main\s*\(").expect("valid regex"));
static PUBLIC_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bpublic\s+(?:final\s+|abstract\s+)*class\s+([A-Za-z_$][\w$]*)").expect("valid regex"));
static TYPE_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:class|interface|enum|record)\s+([A-Za-z_$][\w$]*)").expect("valid regex")
});

/// Source text ready to be written and compiled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSource {
    pub text: String,
    /// Name the source file must carry, without extension
    pub file_stem: String,
    /// Class whose `main` the runner starts
    pub entry_class: String,
    pub wrapped: bool,
}

impl NormalizedSource {
    pub fn file_name(&self) -> String {
        format!("{}.java", self.file_stem)
    }
}

/// Makes a submission compilable as a standalone program
///
/// Text that already declares `static void main(` passes through untouched;
/// the type whose body holds that `main` becomes the entry class.
/// Anything else is placed verbatim inside a canonical `Main` class, with
/// leading `import` lines hoisted above it. No semantic checks happen here:
/// broken input is left for the compiler to report.
pub fn normalize(source: &str) -> NormalizedSource {
    let stripped = strip_comments_and_literals(source);

    if let Some(main_at) = MAIN_METHOD.find(&stripped) {
        let file_stem = PUBLIC_CLASS
            .captures_iter(&stripped)
            .find(|c| brace_depth(&stripped[..c.get(0).map_or(0, |m| m.start())]) == 0)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| DEFAULT_CLASS.to_string());
        let entry_class =
            enclosing_class(&stripped, main_at.start()).unwrap_or_else(|| file_stem.clone());

        return NormalizedSource {
            text: source.to_string(),
            file_stem,
            entry_class,
            wrapped: false,
        };
    }

    let (imports, body) = split_leading_imports(source);
    let mut text = String::with_capacity(source.len() + 128);
    for line in imports {
        text.push_str(line.trim());
        text.push('\n');
    }
    text.push_str("public class Main {\n");
    text.push_str("    public static void main(String[] args) throws Exception {\n");
    text.push_str(body);
    if !body.ends_with('\n') {
        text.push('\n');
    }
    text.push_str("    }\n}\n");

    NormalizedSource {
        text,
        file_stem: DEFAULT_CLASS.to_string(),
        entry_class: DEFAULT_CLASS.to_string(),
        wrapped: true,
    }
}

/// Splits off leading blank and `import ...;` lines
fn split_leading_imports(source: &str) -> (Vec<&str>, &str) {
    let mut imports = Vec::new();
    let mut offset = 0;
    for line in source.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            offset += line.len();
        } else if trimmed.starts_with("import ") && trimmed.ends_with(';') {
            imports.push(trimmed);
            offset += line.len();
        } else {
            break;
        }
    }
    (imports, &source[offset..])
}

/// Binary name of the type whose body contains `at`, e.g. `Outer$Inner`
fn enclosing_class(stripped: &str, at: usize) -> Option<String> {
    let mut chain = Vec::new();
    for caps in TYPE_DECL.captures_iter(&stripped[..at]) {
        let Some(name) = caps.get(1) else { continue };
        let Some(open) = stripped[name.end()..at].find('{').map(|i| name.end() + i) else {
            continue;
        };
        // An unclosed body still encloses everything after it
        if matching_brace(stripped, open).is_none_or(|close| close > at) {
            chain.push(name.as_str());
        }
    }
    (!chain.is_empty()).then(|| chain.join("$"))
}

fn matching_brace(stripped: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, b) in stripped.bytes().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn brace_depth(stripped: &str) -> usize {
    stripped.bytes().fold(0usize, |depth, b| match b {
        b'{' => depth + 1,
        b'}' => depth.saturating_sub(1),
        _ => depth,
    })
}

/// Blanks out comments and string/char literals, keeping byte offsets intact
fn strip_comments_and_literals(source: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Str,
        Char,
        TextBlock,
    }

    let bytes = source.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut state = State::Code;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        let triple_quote = bytes[i..].starts_with(b"\"\"\"");
        match state {
            State::Code if triple_quote => {
                state = State::TextBlock;
                out.extend_from_slice(b"   ");
                i += 3;
                continue;
            }
            State::Code => match (b, next) {
                (b'/', Some(b'/')) => {
                    state = State::LineComment;
                    out.extend_from_slice(b"  ");
                    i += 2;
                    continue;
                }
                (b'/', Some(b'*')) => {
                    state = State::BlockComment;
                    out.extend_from_slice(b"  ");
                    i += 2;
                    continue;
                }
                (b'"', _) => {
                    state = State::Str;
                    out.push(b' ');
                }
                (b'\'', _) => {
                    state = State::Char;
                    out.push(b' ');
                }
                _ => out.push(b),
            },
            State::LineComment => {
                if b == b'\n' {
                    state = State::Code;
                    out.push(b'\n');
                } else {
                    out.push(b' ');
                }
            }
            State::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    state = State::Code;
                    out.extend_from_slice(b"  ");
                    i += 2;
                    continue;
                }
                out.push(if b == b'\n' { b'\n' } else { b' ' });
            }
            State::TextBlock => {
                if b == b'\\' && next.is_some() {
                    out.extend_from_slice(b"  ");
                    i += 2;
                    continue;
                }
                if triple_quote {
                    state = State::Code;
                    out.extend_from_slice(b"   ");
                    i += 3;
                    continue;
                }
                out.push(if b == b'\n' { b'\n' } else { b' ' });
            }
            State::Str | State::Char => {
                let quote = if state == State::Str { b'"' } else { b'\'' };
                if b == b'\\' && next.is_some() {
                    out.extend_from_slice(b"  ");
                    i += 2;
                    continue;
                }
                if b == quote || b == b'\n' {
                    state = State::Code;
                }
                out.push(if b == b'\n' { b'\n' } else { b' ' });
            }
        }
        i += 1;
    }

    // Multi-byte sequences are either copied whole or blanked whole.
    String::from_utf8(out).unwrap_or_default()
}
