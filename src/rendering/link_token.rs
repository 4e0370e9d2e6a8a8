use serde::{Deserialize, Serialize};

/// Prefix identifying an id-based link inside `[[...]]`.
pub const DOC_PREFIX: &str = "doc:";

/// A persisted cross-document reference: `[[doc:<id>#<section>|<label>]]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkToken {
    /// Id of the referenced document (always positive).
    pub doc_id: i64,
    /// Section number inside the referenced document, e.g. `1.2`.
    pub section: Option<String>,
    /// Display text override.
    pub label: Option<String>,
}

impl LinkToken {
    pub fn new(doc_id: i64) -> Self {
        Self {
            doc_id,
            section: None,
            label: None,
        }
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Parse the text between `[[` and `]]` as an id-based link.
///
/// Returns `None` when the `doc:` prefix is missing or the id is not a
/// positive integer. A malformed token is never an error.
pub fn parse_link_token(inner: &str) -> Option<LinkToken> {
    let (target, label) = match inner.split_once('|') {
        Some((target, label)) => (target, non_empty(label)),
        None => (inner, None),
    };
    let (doc_part, section) = match target.split_once('#') {
        Some((doc_part, section)) => (doc_part, non_empty(section)),
        None => (target, None),
    };

    let id_part = doc_part.trim_start().strip_prefix(DOC_PREFIX)?.trim();
    if id_part.is_empty() || !id_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let doc_id: i64 = id_part.parse().ok()?;
    if doc_id <= 0 {
        return None;
    }

    Some(LinkToken {
        doc_id,
        section,
        label,
    })
}

/// Serialize a link token in the raw `[[doc:...]]` form.
pub fn build_link_token(token: &LinkToken) -> String {
    let mut out = format!("[[{DOC_PREFIX}{}", token.doc_id);
    if let Some(section) = token.section.as_deref().and_then(non_empty) {
        out.push('#');
        out.push_str(&section);
    }
    if let Some(label) = token.label.as_deref().and_then(non_empty) {
        out.push('|');
        out.push_str(&label);
    }
    out.push_str("]]");
    out
}

/// An on-disk serialization of link tokens.
///
/// Content may hold the same logical token in more than one encoding, so any
/// search over stored content has to go through every entry of [`ENCODINGS`].
pub trait TokenEncoding: Send + Sync {
    fn name(&self) -> &'static str;

    /// Encode a fragment of raw token text.
    fn encode(&self, raw: &str) -> String;

    /// Decode a fragment back to raw token text.
    fn decode(&self, encoded: &str) -> String;
}

/// Tokens as written by the editor.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawEncoding;

impl TokenEncoding for RawEncoding {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn encode(&self, raw: &str) -> String {
        raw.to_string()
    }

    fn decode(&self, encoded: &str) -> String {
        encoded.to_string()
    }
}

/// Legacy form left behind by a markdown sanitizer: each of
/// `[`, `]`, `#`, `|` and `.` is preceded by a backslash.
#[derive(Debug, Clone, Copy, Default)]
pub struct EscapedEncoding;

const ESCAPED_CHARS: [char; 5] = ['[', ']', '#', '|', '.'];

impl TokenEncoding for EscapedEncoding {
    fn name(&self) -> &'static str {
        "escaped"
    }

    fn encode(&self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len() * 2);
        for c in raw.chars() {
            if ESCAPED_CHARS.contains(&c) {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }

    fn decode(&self, encoded: &str) -> String {
        let mut out = String::with_capacity(encoded.len());
        let mut chars = encoded.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(next) = chars.peek().copied() {
                    if ESCAPED_CHARS.contains(&next) {
                        out.push(next);
                        chars.next();
                        continue;
                    }
                }
            }
            out.push(c);
        }
        out
    }
}

/// Every encoding a stored link token may appear in.
pub static ENCODINGS: [&dyn TokenEncoding; 2] = [&RawEncoding, &EscapedEncoding];

/// A token occurrence inside a piece of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMatch {
    /// Byte range of the whole token, brackets included.
    pub start: usize,
    pub end: usize,
    pub token: LinkToken,
}

/// Locate every well-formed id-based token written in `encoding`.
pub fn find_link_tokens(content: &str, encoding: &dyn TokenEncoding) -> Vec<TokenMatch> {
    let opener = encoding.encode("[[");
    let closer = encoding.encode("]]");
    let mut found = Vec::new();
    let mut offset = 0;

    while let Some(pos) = content[offset..].find(&opener) {
        let start = offset + pos;
        let inner_start = start + opener.len();
        let Some(len) = content[inner_start..].find(&closer) else {
            break;
        };
        let inner = &content[inner_start..inner_start + len];
        let end = inner_start + len + closer.len();

        if !inner.contains('\n') {
            if let Some(token) = parse_link_token(&encoding.decode(inner)) {
                found.push(TokenMatch { start, end, token });
                offset = end;
                continue;
            }
        }
        // an opener without a valid token may overlap or precede a real one
        offset = start + 1;
    }

    found
}

/// Extract the id-based links of a document, in either encoding.
///
/// Returns the distinct tokens in the order they first appear.
pub fn extract_link_tokens(markdown: &str) -> Vec<LinkToken> {
    let mut matches: Vec<TokenMatch> = ENCODINGS
        .iter()
        .flat_map(|encoding| find_link_tokens(markdown, *encoding))
        .collect();
    matches.sort_by_key(|m| m.start);

    let mut tokens = Vec::new();
    for m in matches {
        if !tokens.contains(&m.token) {
            tokens.push(m.token);
        }
    }
    tokens
}

/// The two addressing schemes a `[[...]]` reference can use.
///
/// Id-based references are persisted and kept in sync when sections are
/// renumbered. Title-based references exist only for display and are
/// resolved against document titles at render time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkReference {
    ByDocId(LinkToken),
    ByTitle {
        title: String,
        section: Option<String>,
    },
}

impl LinkReference {
    /// Classify the inner text of a `[[...]]` occurrence.
    ///
    /// Returns `None` when the text names neither a document id nor a title.
    pub fn parse(inner: &str) -> Option<Self> {
        if let Some(token) = parse_link_token(inner) {
            return Some(LinkReference::ByDocId(token));
        }
        let (title, section) = match inner.split_once('#') {
            Some((title, section)) => (title, non_empty(section)),
            None => (inner, None),
        };
        let title = non_empty(title)?;
        Some(LinkReference::ByTitle { title, section })
    }

    pub fn section(&self) -> Option<&str> {
        match self {
            LinkReference::ByDocId(token) => token.section.as_deref(),
            LinkReference::ByTitle { section, .. } => section.as_deref(),
        }
    }
}
