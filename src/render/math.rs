//! Math protection: hide `$$…$$` and `$…$` spans from the Markdown parser
//! and put them back afterwards.
//!
//! Without this, `$a_1 * b_2$` comes out of the parser as emphasis and the
//! typesetter never sees the original TeX.
//!
//! Placeholders are plain alphanumeric tokens (`MATHPH<salt>B<n>Z`), which no
//! Markdown rule rewrites. The salt is chosen per pass so that no token can
//! already occur in the input.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Display math, may span lines. Shortest match.
static RE_BLOCK_MATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\$\$.*?\$\$").unwrap());

/// Inline math: single line, at least one character that is not `$`.
static RE_INLINE_MATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$[^$\n]+?\$").unwrap());

const TOKEN_STEM: &str = "MATHPH";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Block,
    Inline,
}

impl Kind {
    fn tag(self) -> char {
        match self {
            Kind::Block => 'B',
            Kind::Inline => 'I',
        }
    }
}

/// Text with its math spans replaced by placeholders.
#[derive(Debug, Clone)]
pub struct ProtectedText {
    pub text: String,
    salt: u32,
    blocks: Vec<String>,
    inlines: Vec<String>,
}

/// Replace block math, then inline math, with placeholders.
pub fn protect_math(input: &str) -> ProtectedText {
    let salt = (0u32..)
        .find(|s| !input.contains(&format!("{TOKEN_STEM}{s}")))
        .unwrap_or_default();

    let mut blocks = Vec::new();
    let text = RE_BLOCK_MATH.replace_all(input, |caps: &Captures| {
        blocks.push(caps[0].to_string());
        token(salt, Kind::Block, blocks.len() - 1)
    });

    let mut inlines = Vec::new();
    let text = RE_INLINE_MATH
        .replace_all(&text, |caps: &Captures| {
            inlines.push(caps[0].to_string());
            token(salt, Kind::Inline, inlines.len() - 1)
        })
        .into_owned();

    ProtectedText {
        text,
        salt,
        blocks,
        inlines,
    }
}

impl ProtectedText {
    /// Number of protected spans.
    pub fn len(&self) -> usize {
        self.blocks.len() + self.inlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Put the math back into `html`, block spans first, then inline ones.
    ///
    /// The math text is HTML-escaped: it lands in element content, and the
    /// typesetter reads it back as text.
    pub fn restore(&self, html: &str) -> String {
        let mut out = html.to_string();
        for (kind, spans) in [(Kind::Block, &self.blocks), (Kind::Inline, &self.inlines)] {
            for (idx, original) in spans.iter().enumerate() {
                out = out.replace(&token(self.salt, kind, idx), &escape_html(original));
            }
        }
        out
    }
}

fn token(salt: u32, kind: Kind, idx: usize) -> String {
    format!("{TOKEN_STEM}{salt}{}{idx}Z", kind.tag())
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
