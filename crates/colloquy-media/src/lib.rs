// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Media ingestion: normalise a file on disk into the neutral [`Attachment`]
//! record the turn loop injects into the first human turn.

use std::path::Path;

use base64::Engine;
use tracing::debug;

use colloquy_model::Attachment;

/// Video files are split into base64 chunks of this many raw bytes.
pub const VIDEO_CHUNK_BYTES: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("reading media file: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("decoding image: {0}")]
    Image(String),
}

/// File kinds recognised by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Image,
    Text,
    Code,
    Video,
}

fn kind_for_extension(ext: &str) -> Option<FileKind> {
    match ext {
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" => Some(FileKind::Image),
        "mp4" | "mov" | "avi" | "webm" | "mkv" => Some(FileKind::Video),
        "rs" | "py" | "js" | "ts" | "go" | "java" | "c" | "cpp" | "h" | "rb" | "sh" => {
            Some(FileKind::Code)
        }
        "txt" | "md" | "csv" | "json" | "yaml" | "yml" | "toml" | "log" | "html" => {
            Some(FileKind::Text)
        }
        _ => None,
    }
}

fn mime_for_extension(ext: &str) -> String {
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "yaml" | "yml" => "application/yaml",
        "html" => "text/html",
        _ => "text/plain",
    }
    .to_string()
}

fn language_for_extension(ext: &str) -> String {
    match ext {
        "rs" => "rust",
        "py" => "python",
        "js" => "javascript",
        "ts" => "typescript",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" => "cpp",
        "rb" => "ruby",
        "sh" => "shell",
        other => other,
    }
    .to_string()
}

/// Normalise `path` into an [`Attachment`].
///
/// - images are base64-encoded whole, with dimensions probed from the header
/// - text and code files carry their content verbatim
/// - videos are split into [`VIDEO_CHUNK_BYTES`] base64 chunks, so
///   `chunk_count == ceil(byte_len / 1 MiB)` by construction
pub fn process_file(path: &Path) -> Result<Attachment, MediaError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let kind = kind_for_extension(&ext)
        .ok_or_else(|| MediaError::UnsupportedType(path.display().to_string()))?;
    let mime = mime_for_extension(&ext);
    let path_str = path.display().to_string();

    match kind {
        FileKind::Image => {
            let bytes = std::fs::read(path)?;
            let (width, height) = image::image_dimensions(path)
                .map_err(|e| MediaError::Image(e.to_string()))?;
            debug!(path = %path_str, width, height, "ingested image attachment");
            Ok(Attachment::Image {
                mime,
                path: path_str,
                base64: base64::engine::general_purpose::STANDARD.encode(&bytes),
                width,
                height,
            })
        }
        FileKind::Text => {
            let content = std::fs::read_to_string(path)?;
            Ok(Attachment::Text {
                mime,
                path: path_str,
                content,
            })
        }
        FileKind::Code => {
            let content = std::fs::read_to_string(path)?;
            Ok(Attachment::Code {
                mime,
                path: path_str,
                content,
                language: language_for_extension(&ext),
            })
        }
        FileKind::Video => {
            let bytes = std::fs::read(path)?;
            let chunks: Vec<String> = bytes
                .chunks(VIDEO_CHUNK_BYTES)
                .map(|c| base64::engine::general_purpose::STANDARD.encode(c))
                .collect();
            let chunk_count = chunks.len();
            debug!(path = %path_str, chunk_count, "ingested video attachment");
            Ok(Attachment::Video {
                mime,
                path: path_str,
                chunks,
                chunk_count,
                fps: None,
                resolution: None,
                duration_secs: None,
            })
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file_with(ext: &str, bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new()
            .suffix(&format!(".{ext}"))
            .tempfile()
            .unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn text_file_carries_content() {
        let f = temp_file_with("txt", b"some notes");
        let att = process_file(f.path()).unwrap();
        match att {
            Attachment::Text { content, mime, .. } => {
                assert_eq!(content, "some notes");
                assert_eq!(mime, "text/plain");
            }
            other => panic!("wrong kind: {other:?}"),
        }
    }

    #[test]
    fn code_file_detects_language() {
        let f = temp_file_with("rs", b"fn main() {}");
        let att = process_file(f.path()).unwrap();
        match att {
            Attachment::Code { language, content, .. } => {
                assert_eq!(language, "rust");
                assert_eq!(content, "fn main() {}");
            }
            other => panic!("wrong kind: {other:?}"),
        }
    }

    #[test]
    fn image_file_probes_dimensions_and_encodes_base64() {
        let f = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        image::RgbaImage::new(2, 3).save(f.path()).unwrap();
        let att = process_file(f.path()).unwrap();
        match att {
            Attachment::Image { width, height, base64, mime, .. } => {
                assert_eq!((width, height), (2, 3));
                assert!(!base64.is_empty());
                assert_eq!(mime, "image/png");
            }
            other => panic!("wrong kind: {other:?}"),
        }
    }

    #[test]
    fn video_chunk_count_is_ceil_of_len_over_one_mib() {
        // 2.5 MiB → 3 chunks.
        let bytes = vec![0u8; VIDEO_CHUNK_BYTES * 2 + VIDEO_CHUNK_BYTES / 2];
        let f = temp_file_with("mp4", &bytes);
        let att = process_file(f.path()).unwrap();
        match att {
            Attachment::Video { chunks, chunk_count, .. } => {
                assert_eq!(chunk_count, 3);
                assert_eq!(chunks.len(), 3);
            }
            other => panic!("wrong kind: {other:?}"),
        }
    }

    #[test]
    fn small_video_is_a_single_chunk() {
        let f = temp_file_with("webm", b"tiny video bytes");
        let att = process_file(f.path()).unwrap();
        match att {
            Attachment::Video { chunk_count, .. } => assert_eq!(chunk_count, 1),
            other => panic!("wrong kind: {other:?}"),
        }
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let f = temp_file_with("xyz", b"???");
        assert!(matches!(
            process_file(f.path()),
            Err(MediaError::UnsupportedType(_))
        ));
    }

    #[test]
    fn missing_file_surfaces_io_error() {
        let err = process_file(Path::new("/tmp/colloquy_missing_file.txt")).unwrap_err();
        assert!(matches!(err, MediaError::Io(_)));
    }
}
