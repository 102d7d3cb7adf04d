//! Describing a local file before it is offered.

use std::io;
use std::path::Path;

use peerdrop_common::FileMetadata;

use crate::transfer::digest::sha256_file;

/// Build the metadata announced for `path`.
pub async fn describe_file(path: &Path, with_digest: bool) -> io::Result<FileMetadata> {
    let stat = tokio::fs::metadata(path).await?;
    if !stat.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a regular file", path.display()),
        ));
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;

    let mut metadata = FileMetadata::new(name, stat.len(), guess_mime_type(path));
    if with_digest {
        metadata.sha256 = Some(sha256_file(path).await?);
    }
    Ok(metadata)
}

/// MIME type from the extension; empty when unknown.
pub fn guess_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" | "tgz" => "application/gzip",
        "tar" => "application/x-tar",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => "",
    }
}
