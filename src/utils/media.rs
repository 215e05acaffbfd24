//! Helpers for media references returned by the gateways.
//!
//! Speech synthesis yields raw MP3 bytes, which are carried around as
//! `data:` URLs so a response stays a plain set of strings.

use base64::Engine as _;
use base64::prelude::BASE64_STANDARD;
use std::error::Error;
use std::path::{Path, PathBuf};

pub fn audio_data_url(bytes: &[u8], mime_type: &str) -> String {
    format!("data:{mime_type};base64,{}", BASE64_STANDARD.encode(bytes))
}

/// Splits a base64 `data:` URL into its MIME type and decoded bytes.
/// Returns `None` for remote URLs and malformed payloads.
pub fn decode_data_url(reference: &str) -> Option<(String, Vec<u8>)> {
    let rest = reference.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime_type = meta.strip_suffix(";base64")?;
    let bytes = BASE64_STANDARD.decode(payload.trim()).ok()?;
    Some((mime_type.to_string(), bytes))
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "audio/mpeg" => "mp3",
        "audio/wav" => "wav",
        "audio/ogg" => "ogg",
        _ => "bin",
    }
}

/// Writes a data-URL audio reference into `dir` as `<stem>.<ext>`. Remote
/// references are left alone and yield `Ok(None)`.
pub fn save_audio_reference(
    reference: &str,
    dir: &Path,
    stem: &str,
) -> Result<Option<PathBuf>, Box<dyn Error>> {
    let Some((mime_type, bytes)) = decode_data_url(reference) else {
        return Ok(None);
    };
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{stem}.{}", extension_for(&mime_type)));
    std::fs::write(&path, bytes)?;
    Ok(Some(path))
}

/// Short human-readable description used when printing a response.
pub fn describe_reference(reference: &str) -> String {
    match decode_data_url(reference) {
        Some((mime_type, bytes)) => format!("{mime_type}, {} bytes", bytes.len()),
        None => reference.to_string(),
    }
}
