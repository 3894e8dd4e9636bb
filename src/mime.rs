//! MIME type guessing by file extension.
//!
//! Adapted from the teacher's enum-indexed lookup table: an `O(1)` match on
//! the lowercased extension instead of a `HashMap`, with no allocation on
//! the hot path. Unlike the teacher, an unrecognized extension returns
//! `None` so the static file handler can fall back to the configured
//! `default_type` instead of a hardcoded literal (spec step 4.4.6).

use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MimeType {
    Html,
    Css,
    Javascript,
    Json,
    Xml,
    PlainText,
    Icon,
    Png,
    Jpeg,
    Gif,
    Svg,
    Webp,
    Pdf,
    Woff,
    Woff2,
    Ttf,
    Eot,
    Wasm,
    Zip,
    Gzip,
    Mp4,
    Mp3,
}

impl MimeType {
    pub fn as_str(self) -> &'static str {
        match self {
            MimeType::Html => "text/html; charset=utf-8",
            MimeType::Css => "text/css; charset=utf-8",
            MimeType::Javascript => "text/javascript; charset=utf-8",
            MimeType::Json => "application/json; charset=utf-8",
            MimeType::Xml => "application/xml; charset=utf-8",
            MimeType::PlainText => "text/plain; charset=utf-8",
            MimeType::Icon => "image/x-icon",
            MimeType::Png => "image/png",
            MimeType::Jpeg => "image/jpeg",
            MimeType::Gif => "image/gif",
            MimeType::Svg => "image/svg+xml",
            MimeType::Webp => "image/webp",
            MimeType::Pdf => "application/pdf",
            MimeType::Woff => "font/woff",
            MimeType::Woff2 => "font/woff2",
            MimeType::Ttf => "font/ttf",
            MimeType::Eot => "application/vnd.ms-fontobject",
            MimeType::Wasm => "application/wasm",
            MimeType::Zip => "application/zip",
            MimeType::Gzip => "application/gzip",
            MimeType::Mp4 => "video/mp4",
            MimeType::Mp3 => "audio/mpeg",
        }
    }
}

/// Fast MIME type detection by extension. `None` means the extension is
/// absent or unrecognized; callers should fall back to the configured
/// default type rather than guessing further.
pub fn guess(path: &Path) -> Option<MimeType> {
    let extension = path.extension()?.to_str()?;
    Some(match extension.to_ascii_lowercase().as_str() {
        "html" | "htm" => MimeType::Html,
        "css" => MimeType::Css,
        "js" | "mjs" => MimeType::Javascript,
        "json" => MimeType::Json,
        "xml" => MimeType::Xml,
        "txt" => MimeType::PlainText,
        "ico" => MimeType::Icon,
        "png" => MimeType::Png,
        "jpg" | "jpeg" => MimeType::Jpeg,
        "gif" => MimeType::Gif,
        "svg" => MimeType::Svg,
        "webp" => MimeType::Webp,
        "pdf" => MimeType::Pdf,
        "woff" => MimeType::Woff,
        "woff2" => MimeType::Woff2,
        "ttf" => MimeType::Ttf,
        "eot" => MimeType::Eot,
        "wasm" => MimeType::Wasm,
        "zip" => MimeType::Zip,
        "gz" => MimeType::Gzip,
        "mp4" => MimeType::Mp4,
        "mp3" => MimeType::Mp3,
        _ => return None,
    })
}

/// `guess`, falling back to `default_type` for unrecognized extensions.
pub fn guess_or<'a>(path: &Path, default_type: &'a str) -> std::borrow::Cow<'a, str> {
    match guess(path) {
        Some(mime) => std::borrow::Cow::Borrowed(mime.as_str()),
        None => std::borrow::Cow::Borrowed(default_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn html_and_case_insensitivity() {
        assert_eq!(guess(Path::new("index.html")).unwrap().as_str(), "text/html; charset=utf-8");
        assert_eq!(guess(Path::new("INDEX.HTML")).unwrap().as_str(), "text/html; charset=utf-8");
    }

    #[test]
    fn images_and_fonts() {
        assert_eq!(guess(Path::new("a.png")).unwrap().as_str(), "image/png");
        assert_eq!(guess(Path::new("a.woff2")).unwrap().as_str(), "font/woff2");
    }

    #[test]
    fn unknown_extension_falls_back_to_configured_default() {
        assert!(guess(Path::new("a.unknownext")).is_none());
        assert_eq!(guess_or(Path::new("a.unknownext"), "application/octet-stream"), "application/octet-stream");
    }

    #[test]
    fn no_extension_falls_back() {
        assert!(guess(Path::new("Dockerfile")).is_none());
    }

    #[test]
    fn nested_paths() {
        assert_eq!(guess(Path::new("/css/main.css")).unwrap().as_str(), "text/css; charset=utf-8");
    }
}
