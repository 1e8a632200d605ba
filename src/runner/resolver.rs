use super::context::SessionState;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Characters escaped in a substituted value so it stays one path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A path pattern together with the concrete path it resolved to
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath {
    /// The unresolved pattern, used as the report label
    pub pattern: String,
    pub path: String,
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("placeholder regex is valid")
    })
}

/// Names of all `:Field` placeholders in a pattern, in order of appearance
pub fn placeholders(pattern: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in placeholder_regex().captures_iter(pattern) {
        let name = caps[1].to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Whether `pattern` contains the placeholder `:field` as a whole token
pub fn has_placeholder(pattern: &str, field: &str) -> bool {
    placeholder_regex()
        .captures_iter(pattern)
        .any(|caps| &caps[1] == field)
}

/// Substitute the placeholders named in `fields` with their session values.
///
/// Every occurrence of a substituted token is replaced with the
/// percent-encoded value. Tokens that are not listed, or have no value in the
/// session, stay in the path verbatim.
pub fn resolve(pattern: &str, state: &SessionState, fields: &[&str]) -> ResolvedPath {
    let path = placeholder_regex()
        .replace_all(pattern, |caps: &Captures| {
            let name = &caps[1];
            match state.get(name) {
                Some(value) if fields.contains(&name) => {
                    utf8_percent_encode(&value.to_string(), PATH_SEGMENT).to_string()
                }
                _ => caps[0].to_string(),
            }
        })
        .into_owned();

    ResolvedPath {
        pattern: pattern.to_string(),
        path,
    }
}
