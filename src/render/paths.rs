//! Image-link rewriting: point relative `![alt](path)` targets at the
//! server's files-prefix so the preview can load them.
//!
//! ## Resolution rules
//!
//! | Link target | Result |
//! |---|---|
//! | `http://…`, `https://…`, already under the files-prefix | unchanged |
//! | `./img.png` | `<prefix><base_dir>/img.png` |
//! | `../../img.png` | `<prefix>` + `base_dir` minus two trailing segments + `/img.png` |
//! | `/img.png` | `<prefix>img.png` |
//! | `img.png` | `<prefix><base_dir>/img.png` (or `<prefix>img.png` without a base) |
//!
//! Rewritten targets always start with the files-prefix, so running the
//! rewrite again leaves them alone.

use crate::task::normalize_separators;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static RE_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").unwrap());

/// Rewrite every image link in `content` relative to `base_dir`, the
/// directory of the Markdown file on the server.
pub fn rewrite_image_paths(content: &str, base_dir: &str, files_prefix: &str) -> String {
    let prefix = format!("{}/", files_prefix.trim_end_matches('/'));
    let rooted = rooted_path(&prefix);
    let base = normalize_separators(base_dir);
    let base = base.trim_matches('/');

    RE_IMAGE
        .replace_all(content, |caps: &Captures| {
            let alt = &caps[1];
            match resolve(&caps[2], base, &prefix, rooted.as_deref()) {
                Some(target) => format!("![{alt}]({target})"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// The path component of a URL prefix (`/api/files/` for
/// `http://host/api/files/`), which also counts as already rooted.
fn rooted_path(prefix: &str) -> Option<String> {
    match reqwest::Url::parse(prefix) {
        Ok(url) => Some(url.path().to_string()).filter(|p| p != "/"),
        Err(_) => None,
    }
}

fn is_absolute(path: &str, prefix: &str, rooted: Option<&str>) -> bool {
    path.starts_with("http://")
        || path.starts_with("https://")
        || path.starts_with(prefix)
        || rooted.is_some_and(|r| path.starts_with(r))
}

/// New target for `path`, or `None` to keep the link as written.
fn resolve(path: &str, base: &str, prefix: &str, rooted: Option<&str>) -> Option<String> {
    if is_absolute(path, prefix, rooted) {
        return None;
    }
    let relative = if let Some(rest) = path.strip_prefix("./") {
        join(base, rest)
    } else if path.starts_with("../") {
        climb(base, path)
    } else if path.starts_with('/') {
        path.trim_start_matches('/').to_string()
    } else {
        join(base, path)
    };
    Some(format!("{prefix}{relative}"))
}

/// Resolve leading `..` segments against `base`. Climbing past the root
/// leaves an empty base rather than a dangling `/`.
fn climb(base: &str, path: &str) -> String {
    let base_parts: Vec<&str> = base.split('/').filter(|p| !p.is_empty()).collect();
    let rel_parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    let up = rel_parts.iter().take_while(|p| **p == "..").count();

    let kept = base_parts[..base_parts.len().saturating_sub(up)].join("/");
    let remaining = rel_parts[up..].join("/");
    join(&kept, &remaining)
}

fn join(base: &str, rest: &str) -> String {
    if base.is_empty() {
        rest.to_string()
    } else {
        format!("{base}/{rest}")
    }
}
