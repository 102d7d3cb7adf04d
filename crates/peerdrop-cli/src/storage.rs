//! Where received files land on disk.

use std::io;
use std::path::{Path, PathBuf};

use peerdrop_core::ReceivedFile;
use tokio::io::AsyncWriteExt;

const FALLBACK_NAME: &str = "download";

/// Directory to save into: the flag, then config, then the user's download
/// directory, then the working directory.
pub fn receive_dir(flag: Option<PathBuf>, configured: &str) -> PathBuf {
    if let Some(dir) = flag {
        return dir;
    }
    if !configured.trim().is_empty() {
        return PathBuf::from(configured.trim());
    }
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Reduce a peer-supplied name to a single safe path component.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.').trim();
    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// `name`, then `name (1).ext`, `name (2).ext`, ...
fn candidate_name(name: &str, n: usize) -> String {
    if n == 0 {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({n}).{ext}"),
        _ => format!("{name} ({n})"),
    }
}

/// Write `file` into `dir` without overwriting anything. Returns the final path.
pub async fn save(dir: &Path, file: &ReceivedFile) -> io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let name = sanitize_file_name(&file.metadata.name);

    for n in 0.. {
        let path = dir.join(candidate_name(&name, n));
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(mut out) => {
                out.write_all(&file.data).await?;
                out.flush().await?;
                return Ok(path);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        "no free file name",
    ))
}
