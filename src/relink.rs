//! Relative image links.
//!
//! Conversion libraries write absolute file paths into image references.
//! Markdown that travels with its image folder needs links relative to the
//! `.md` file, with every path segment URL-escaped.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::path::{Component, Path};
use tracing::debug;

static IMAGE_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").unwrap());

static WINDOWS_ABS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]:[\\/]").unwrap());

/// Rewrites absolute image targets that live under `md_dir` into relative,
/// escaped links. Returns the new text and the number of links rewritten.
pub fn relativize_image_links(markdown: &str, md_dir: &Path, require_existing: bool) -> (String, usize) {
    let mut rewritten = 0usize;
    let out = IMAGE_LINK.replace_all(markdown, |caps: &Captures<'_>| {
        let alt = &caps[1];
        let target = &caps[2];
        if !is_absolute_target(target) {
            return caps[0].to_string();
        }
        let path = Path::new(target);
        if require_existing && !path.exists() {
            debug!("image target missing, left as-is: {target}");
            return caps[0].to_string();
        }
        match relative_link(md_dir, path) {
            Some(rel) => {
                rewritten += 1;
                format!("![{alt}]({rel})")
            }
            None => caps[0].to_string(),
        }
    });
    (out.into_owned(), rewritten)
}

/// Link to `path` relative to `base_dir`, `/`-separated with each segment
/// escaped. `None` when `path` is not inside `base_dir`.
pub fn relative_link(base_dir: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base_dir).ok()?;
    let mut parts = Vec::new();
    for comp in rel.components() {
        match comp {
            Component::Normal(seg) => parts.push(quote(&seg.to_string_lossy())),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

fn is_absolute_target(target: &str) -> bool {
    target.starts_with('/') || WINDOWS_ABS.is_match(target)
}

/// Percent-escapes everything outside the unreserved set `A-Za-z0-9_.-~`.
pub fn quote(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for b in segment.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}
