//! Path/URI Reconciler (C4): pure functions translating between
//! project-relative paths, host absolute paths, workspace `file://` URIs,
//! and container-mounted `/workspace/...` URIs.
//!
//! Every function here is pure and synchronous; nothing in this module
//! touches the filesystem or the network.

use std::path::{Path, PathBuf};

use crate::error::UriError;
use crate::model::FileRecord;

/// Which transport the LSP client was started under; governs how paths are
/// mapped to URIs and back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMode {
    /// The language server runs directly on the host; paths are host
    /// absolute paths.
    Host,
    /// The language server runs inside `docker run ... -v root:/workspace`;
    /// paths as seen by the server are rooted at `/workspace`.
    Container,
}

/// Computes the path to hand the server for `file`, in whichever shape
/// `mode` requires (a plain path, not yet a `file://` URI).
#[must_use]
pub fn to_lsp_path(file: &FileRecord, mode: ClientMode) -> String {
    match mode {
        ClientMode::Container => format!("/workspace/{}", posix(&file.rel_path)),
        ClientMode::Host => file.abs_path().to_string_lossy().replace('\\', "/"),
    }
}

/// Wraps an [`to_lsp_path`] result (or any absolute path string) as a
/// `file://` URI.
#[must_use]
pub fn to_lsp_uri(path: &str) -> String {
    if path.starts_with('/') {
        format!("file://{path}")
    } else {
        // Windows-style absolute path, e.g. "C:/Users/...".
        format!("file:///{path}")
    }
}

/// Reverses [`to_lsp_uri`]/[`to_lsp_path`]: given a `file://` URI reported
/// by the server, recovers the absolute host path.
///
/// # Errors
/// Returns [`UriError::NotFileUri`] if `uri` doesn't start with `file://`,
/// or [`UriError::OutsideWorkspace`] if, after rebasing, the resulting path
/// does not lie under `project_root`.
pub fn from_lsp_uri(uri: &str, project_root: &Path, mode: ClientMode) -> Result<PathBuf, UriError> {
    let Some(raw) = uri.strip_prefix("file://") else {
        return Err(UriError::NotFileUri(uri.to_string()));
    };
    let decoded = percent_decode(raw);
    let decoded = strip_windows_drive_slash(&decoded);

    let rebased = match mode {
        ClientMode::Container => {
            if let Some(rest) = decoded.strip_prefix("/workspace/") {
                project_root.join(rest)
            } else if let Some(rest) = decoded.strip_prefix("/workspace") {
                project_root.join(rest.trim_start_matches('/'))
            } else if let Some(pos) = decoded.to_ascii_lowercase().find(":/workspace/") {
                // e.g. "C:/workspace/pkg/x.py" on a Windows host driving a
                // container whose mount source used a drive-letter path.
                let rest = &decoded[pos + ":/workspace/".len()..];
                project_root.join(rest)
            } else {
                return Err(UriError::OutsideWorkspace {
                    uri: uri.to_string(),
                    root: project_root.to_string_lossy().to_string(),
                });
            }
        }
        ClientMode::Host => PathBuf::from(decoded.replace('\\', "/")),
    };

    let normalized = normalize(&rebased);
    let root_normalized = normalize(project_root);
    if !normalized.starts_with(&root_normalized) {
        return Err(UriError::OutsideWorkspace {
            uri: uri.to_string(),
            root: project_root.to_string_lossy().to_string(),
        });
    }
    Ok(normalized)
}

fn posix(rel_path: &str) -> String {
    rel_path.replace('\\', "/")
}

/// Lexical normalization (no filesystem access, so this works for paths
/// that don't exist yet): collapses `.` segments and resolves `..` against
/// what's already been pushed.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        use std::path::Component;
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn strip_windows_drive_slash(path: &str) -> String {
    // "/C:/Users/..." -> "C:/Users/...".
    let bytes = path.as_bytes();
    if bytes.len() >= 3 && bytes[0] == b'/' && bytes[2] == b':' && bytes[1].is_ascii_alphabetic() {
        path[1..].to_string()
    } else {
        path.to_string()
    }
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(hex) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                if let Ok(byte) = u8::from_str_radix(hex, 16) {
                    out.push(byte);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileRecord;

    fn file(rel_path: &str, root: &str) -> FileRecord {
        FileRecord {
            id: 1,
            rel_path: rel_path.to_string(),
            language: "python".to_string(),
            project_root: PathBuf::from(root),
            symbols: Vec::new(),
        }
    }

    #[test]
    fn container_round_trip_rewrites_workspace_root() {
        let root = "/home/alice/proj";
        let f = file("pkg/x.py", root);
        let path = to_lsp_path(&f, ClientMode::Container);
        assert_eq!(path, "/workspace/pkg/x.py");
        let uri = to_lsp_uri(&path);
        assert_eq!(uri, "file:///workspace/pkg/x.py");

        let resolved = from_lsp_uri(&uri, Path::new(root), ClientMode::Container).unwrap();
        assert_eq!(resolved, PathBuf::from("/home/alice/proj/pkg/x.py"));
    }

    #[test]
    fn host_round_trip() {
        let root = "/home/alice/proj";
        let f = file("pkg/x.py", root);
        let path = to_lsp_path(&f, ClientMode::Host);
        let uri = to_lsp_uri(&path);
        let resolved = from_lsp_uri(&uri, Path::new(root), ClientMode::Host).unwrap();
        assert_eq!(resolved, normalize(Path::new(root).join("pkg/x.py").as_path()));
    }

    #[test]
    fn uri_outside_workspace_is_an_error() {
        let err = from_lsp_uri("file:///etc/passwd", Path::new("/home/alice/proj"), ClientMode::Host).unwrap_err();
        assert!(matches!(err, UriError::OutsideWorkspace { .. }));
    }

    #[test]
    fn non_file_scheme_is_rejected() {
        let err = from_lsp_uri("https://example.com/x", Path::new("/root"), ClientMode::Host).unwrap_err();
        assert!(matches!(err, UriError::NotFileUri(_)));
    }

    #[test]
    fn percent_decoding_is_applied() {
        let root = "/home/alice/proj";
        let resolved = from_lsp_uri(
            "file:///home/alice/proj/pkg/my%20file.py",
            Path::new(root),
            ClientMode::Host,
        )
        .unwrap();
        assert_eq!(resolved, PathBuf::from("/home/alice/proj/pkg/my file.py"));
    }

    #[test]
    fn dot_dot_segments_cannot_escape_the_project_root() {
        let root = "/home/alice/proj";
        let err = from_lsp_uri("file:///home/alice/proj/../../etc/passwd", Path::new(root), ClientMode::Host)
            .unwrap_err();
        assert!(matches!(err, UriError::OutsideWorkspace { .. }));
    }
}
