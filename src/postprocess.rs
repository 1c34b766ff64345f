use crate::config::Config;
use unicode_normalization::UnicodeNormalization;

/// Cleans converter output before image links are rewritten and tables are
/// placed. A trailing newline survives.
pub fn normalize_markdown(cfg: &Config, md: &str) -> String {
    let mut out = md.to_string();

    if cfg.postprocess.normalize_newlines {
        out = out.replace("\r\n", "\n").replace('\r', "\n");
    }

    if cfg.postprocess.normalize_unicode {
        out = out.nfkc().collect::<String>();
    }

    if cfg.postprocess.trim_trailing_whitespace {
        let trailing_newline = out.ends_with('\n');
        out = out
            .lines()
            .map(|l| l.trim_end())
            .collect::<Vec<_>>()
            .join("\n");
        if trailing_newline {
            out.push('\n');
        }
    }

    out
}

/// Number of Markdown image references in `md`.
pub fn count_image_refs(md: &str) -> usize {
    md.match_indices("![").count()
}
