//! File ids used in stream URLs.
//!
//! A file id is the URL-safe, unpadded base64 encoding of a path relative to
//! the media root. Decoded paths must stay inside the root: absolute paths
//! and `..` components are rejected.

use std::path::{Component, Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sf_core::{Error, Result};

/// The id of `relative`, a path below the media root.
pub fn encode_file_id(relative: &Path) -> String {
    URL_SAFE_NO_PAD.encode(relative.to_string_lossy().as_bytes())
}

/// Decode a file id into a path under `media_root`.
pub fn decode_file_id(media_root: &Path, id: &str) -> Result<PathBuf> {
    let bytes = URL_SAFE_NO_PAD
        .decode(id)
        .map_err(|_| Error::Validation("file id is not valid base64".into()))?;
    let relative =
        String::from_utf8(bytes).map_err(|_| Error::Validation("file id is not valid UTF-8".into()))?;
    resolve_media_path(media_root, &relative)
}

/// Join a client-supplied relative path onto `media_root`, refusing anything
/// that could escape it.
pub fn resolve_media_path(media_root: &Path, relative: &str) -> Result<PathBuf> {
    let path = Path::new(relative);
    if relative.is_empty() {
        return Err(Error::Validation("empty media path".into()));
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::Validation(format!("path '{relative}' escapes the media root")))
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::Validation(format!("path '{relative}' must be relative")))
            }
        }
    }
    Ok(media_root.join(path))
}
