//! File enumeration
//!
//! Walks a source tree and pairs every regular file with its destination
//! key. Siblings are visited in file-name order so the same tree always
//! yields the same sequence.

use crate::error::{Result, S3Error};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A file to transfer and where it goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPair {
    pub source_path: PathBuf,
    pub destination_key: String,
}

/// Join a prefix and a `/`-separated relative path into a key
pub fn destination_key(prefix: &str, relative: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        format!("{}{}", prefix, relative)
    } else {
        format!("{}/{}", prefix, relative)
    }
}

/// Listing prefix covering every key written under `prefix`
///
/// `p` lists as `p/` so that a sibling such as `p2/` is never matched.
pub fn key_prefix(prefix: &str) -> String {
    destination_key(prefix, "")
}

/// Enumerate `source` into transfer pairs under `prefix`
///
/// A single regular file maps to `prefix` itself when the prefix names an
/// object (non-empty, no trailing `/`), otherwise to `prefix + file_name`.
///
/// # Errors
///
/// [`S3Error::SourceNotFound`] if `source` does not exist.
pub fn enumerate(source: &Path, prefix: &str) -> Result<Vec<TransferPair>> {
    if !source.exists() {
        return Err(S3Error::SourceNotFound(source.to_path_buf()));
    }

    if source.is_file() {
        let key = if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.to_string()
        } else {
            let file_name = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            format!("{}{}", prefix, file_name)
        };
        tracing::debug!("Uploading '{}' to {}", source.display(), key);
        return Ok(vec![TransferPair {
            source_path: source.to_path_buf(),
            destination_key: key,
        }]);
    }

    let mut pairs = Vec::new();
    for entry in WalkDir::new(source)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            S3Error::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop in source tree")),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| S3Error::Io(std::io::Error::other(e)))?;
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        pairs.push(TransferPair {
            source_path: entry.path().to_path_buf(),
            destination_key: destination_key(prefix, &relative),
        });
    }

    tracing::debug!(
        "Enumerated {} files under {}",
        pairs.len(),
        source.display()
    );
    for pair in &pairs {
        tracing::debug!(
            "Uploading '{}' to {}",
            pair.source_path.display(),
            pair.destination_key
        );
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::{Arc, Mutex};

    fn keys(pairs: &[TransferPair]) -> Vec<&str> {
        pairs.iter().map(|p| p.destination_key.as_str()).collect()
    }

    #[test]
    fn test_destination_key() {
        assert_eq!(destination_key("", "a.txt"), "a.txt");
        assert_eq!(destination_key("p/", "sub/b.txt"), "p/sub/b.txt");
        assert_eq!(destination_key("p", "a.txt"), "p/a.txt");
    }

    #[test]
    fn test_key_prefix() {
        assert_eq!(key_prefix(""), "");
        assert_eq!(key_prefix("p/"), "p/");
        assert_eq!(key_prefix("p"), "p/");
        assert_eq!(key_prefix("site/home"), "site/home/");
    }

    #[test]
    fn test_structure_preserved_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("sub/c.txt"), "c").unwrap();

        let pairs = enumerate(dir.path(), "p/").unwrap();
        assert_eq!(keys(&pairs), vec!["p/a.txt", "p/b.txt", "p/sub/c.txt"]);
        assert_eq!(pairs[2].source_path, dir.path().join("sub/c.txt"));
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        assert!(enumerate(dir.path(), "p/").unwrap().is_empty());
    }

    #[test]
    fn test_single_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("index.html");
        fs::write(&file, "<html/>").unwrap();

        assert_eq!(keys(&enumerate(&file, "site/").unwrap()), vec!["site/index.html"]);
        assert_eq!(keys(&enumerate(&file, "").unwrap()), vec!["index.html"]);
        assert_eq!(keys(&enumerate(&file, "site/home").unwrap()), vec!["site/home"]);
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_every_pair_is_logged() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();

        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            enumerate(dir.path(), "p/").unwrap();
        });

        let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        for name in ["a.txt", "b.txt"] {
            let line = format!(
                "Uploading '{}' to p/{}",
                dir.path().join(name).display(),
                name
            );
            assert!(output.contains(&line), "missing {:?} in {}", line, output);
        }
    }

    #[test]
    fn test_missing_source() {
        let err = enumerate(Path::new("/no/such/tree"), "p/").unwrap_err();
        assert!(matches!(err, S3Error::SourceNotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_followed() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("shared.css"), "body{}").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("assets")).unwrap();

        let pairs = enumerate(dir.path(), "").unwrap();
        assert_eq!(keys(&pairs), vec!["assets/shared.css"]);
    }
}
