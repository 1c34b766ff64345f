use crate::config::Config;
use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;

pub fn ensure_dir(p: &Path) -> Result<()> {
    std::fs::create_dir_all(p).with_context(|| format!("create_dir_all {}", p.display()))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    format!("{:x}", h.finalize())
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Identifies one conversion of one input under one configuration.
pub fn job_id(cfg: &Config, input: &Path) -> Result<String> {
    let cfg_hash = sha256_hex(cfg.normalized_for_hash().as_bytes());
    let input_hash =
        hash_file(cfg, input).with_context(|| format!("hashing input: {}", input.display()))?;
    Ok(sha256_hex(format!("{cfg_hash}:{input_hash}").as_bytes()))
}

pub fn hash_file(cfg: &Config, path: &Path) -> Result<String> {
    let mut f = File::open(path).with_context(|| "open file")?;
    let size = f.metadata().with_context(|| "metadata")?.len();
    let mut h = Sha256::new();

    match cfg.hashing.mode.as_str() {
        "full_sha256" => {
            let mut buf = vec![0u8; 1024 * 1024];
            loop {
                let n = f.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                h.update(&buf[..n]);
            }
        }
        // Head and tail windows plus the length; enough to tell inputs apart
        // without reading multi-gigabyte scans.
        "fast_2x16mb" => {
            let w = cfg.hashing.fast_window_bytes.min(size);
            if w > 0 {
                let mut buf = vec![0u8; w as usize];
                f.read_exact(&mut buf)?;
                h.update(&buf);
                if size > w {
                    f.seek(SeekFrom::Start(size - w))?;
                    f.read_exact(&mut buf)?;
                    h.update(&buf);
                }
            }
            h.update(size.to_le_bytes());
        }
        other => bail!("unknown hashing.mode: {other}"),
    }
    Ok(format!("{:x}", h.finalize()))
}

/// Copies `input` into `dir`, keeping its file name.
pub fn stage_input(input: &Path, dir: &Path) -> Result<PathBuf> {
    ensure_dir(dir)?;
    let name = input
        .file_name()
        .with_context(|| format!("input has no file name: {}", input.display()))?;
    let staged = dir.join(name);
    std::fs::copy(input, &staged)
        .with_context(|| format!("copy {} -> {}", input.display(), staged.display()))?;
    Ok(staged)
}

/// Absolute directory containing `path`; a bare file name resolves against
/// the current directory.
pub fn absolute_parent(path: &Path) -> Result<PathBuf> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::path::absolute(parent).with_context(|| format!("resolving directory of {}", path.display()))
}

pub fn looks_like_url(s: &str) -> bool {
    let s = s.to_ascii_lowercase();
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with("file://")
}
