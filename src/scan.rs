//! Export-directory scanning.
//!
//! Discovers candidate source files: walks the configured root, filters by
//! extension and include globs, hashes file bytes, and shape-probes the
//! first array element to pick the owning adapter. Files that fail to parse
//! or that no adapter claims are excluded with a stderr note; the scan is
//! pre-filtering, so a
//! malformed export never enters the processed set and can be fixed and
//! re-scanned later.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::config::SourceDirConfig;
use crate::models::SourceFile;
use crate::normalize::SourceAdapter;

/// Scan for JSON exports, dispatching each file to the first adapter whose
/// shape probe claims it. Sources with one export kind pass a single
/// adapter; the GitHub directory passes two and each file lands with the
/// right one. Files no adapter claims are warned about and excluded.
pub fn scan_exports(
    source: &SourceDirConfig,
    adapters: &[&dyn SourceAdapter],
) -> Result<Vec<(usize, SourceFile)>> {
    let mut files = Vec::new();

    for (path, filename, bytes) in walk_files(source, "json")? {
        let content = String::from_utf8_lossy(&bytes);
        let claimed = match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(serde_json::Value::Array(items)) => match items.first() {
                Some(first) => adapters.iter().position(|a| a.probe(first)),
                // An empty export array is valid, just empty.
                None => Some(0),
            },
            _ => None,
        };
        let Some(idx) = claimed else {
            eprintln!(
                "Warning: skipping {} (unrecognized export shape)",
                path.display()
            );
            continue;
        };

        let channel = adapters[idx].channel_for_filename(&filename);
        files.push((
            idx,
            SourceFile {
                path,
                filename,
                content_hash: hash_bytes(&bytes),
                channel,
            },
        ));
    }

    Ok(files)
}

/// Scan for VTT subtitle files. No shape probe here; a file with zero
/// parseable captions is reported as a no-op at processing time.
pub fn scan_vtt(source: &SourceDirConfig) -> Result<Vec<SourceFile>> {
    let mut files = Vec::new();
    for (path, filename, bytes) in walk_files(source, "vtt")? {
        files.push(SourceFile {
            path,
            filename,
            content_hash: hash_bytes(&bytes),
            channel: "transcript".to_string(),
        });
    }
    Ok(files)
}

fn walk_files(
    source: &SourceDirConfig,
    extension: &str,
) -> Result<Vec<(std::path::PathBuf, String, Vec<u8>)>> {
    let root = &source.root;
    if !root.exists() {
        bail!("Source directory does not exist: {}", root.display());
    }

    let include_set = if source.include_globs.is_empty() {
        None
    } else {
        Some(build_globset(&source.include_globs)?)
    };

    let mut out = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        if let Some(set) = &include_set {
            if !set.is_match(relative) {
                continue;
            }
        }

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let bytes = std::fs::read(path)?;
        out.push((path.to_path_buf(), filename, bytes));
    }

    // Deterministic discovery order; manifest persistence follows it.
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::twitter::TwitterAdapter;
    use std::path::PathBuf;

    fn source_for(root: PathBuf) -> SourceDirConfig {
        SourceDirConfig {
            root,
            include_globs: Vec::new(),
        }
    }

    #[test]
    fn test_scan_filters_malformed() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("bookmarks.json"),
            r#"[{"url": "https://x.com/a/status/1", "text": "hi"}]"#,
        )
        .unwrap();
        std::fs::write(tmp.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(
            tmp.path().join("wrong-shape.json"),
            r#"[{"videoId": "abc"}]"#,
        )
        .unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let files =
            scan_exports(&source_for(tmp.path().to_path_buf()), &[&TwitterAdapter]).unwrap();
        assert_eq!(files.len(), 1);
        let (idx, file) = &files[0];
        assert_eq!(*idx, 0);
        assert_eq!(file.filename, "bookmarks.json");
        assert_eq!(file.channel, "bookmark");
        assert_eq!(file.content_hash.len(), 64);
    }

    #[test]
    fn test_scan_dispatches_between_sibling_adapters() {
        use crate::normalize::github::{GithubEventsAdapter, GithubStarsAdapter};

        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("events.json"),
            r#"[{"id": "1", "type": "PushEvent"}]"#,
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("stars.json"),
            r#"[{"node_id": "R_1", "full_name": "a/b"}]"#,
        )
        .unwrap();

        // Both files land with their own adapter; neither is rejected just
        // because the sibling's probe fails it.
        let files = scan_exports(
            &source_for(tmp.path().to_path_buf()),
            &[&GithubEventsAdapter, &GithubStarsAdapter],
        )
        .unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].0, 0);
        assert_eq!(files[0].1.filename, "events.json");
        assert_eq!(files[1].0, 1);
        assert_eq!(files[1].1.filename, "stars.json");
    }

    #[test]
    fn test_scan_hash_tracks_content() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("likes.json");
        let body = r#"[{"url": "https://x.com/a/status/1", "text": "hi"}]"#;
        std::fs::write(&path, body).unwrap();
        let source = source_for(tmp.path().to_path_buf());

        let first = scan_exports(&source, &[&TwitterAdapter]).unwrap();
        std::fs::write(&path, body.replace("hi", "hello")).unwrap();
        let second = scan_exports(&source, &[&TwitterAdapter]).unwrap();
        assert_ne!(first[0].1.content_hash, second[0].1.content_hash);
    }

    #[test]
    fn test_scan_missing_dir_errors() {
        let source = source_for(PathBuf::from("/definitely/not/here"));
        assert!(scan_exports(&source, &[&TwitterAdapter]).is_err());
    }
}
