//! Static file handler (spec.md §4.4): path resolution, index files,
//! modification-time conditional GET, and negotiated content encoding.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

use crate::config::Configuration;
use crate::error::{HttpError, ProtocolError};
use crate::request::Request;
use crate::response::Response;

/// A `locations` entry bound to its owning server configuration.
#[derive(Clone)]
pub struct StaticMount {
    pub root: PathBuf,
    pub config: Arc<Configuration>,
}

/// Result of running the static handler against a matched request.
pub enum StaticOutcome {
    /// The handler wrote a response; the router pipeline should stop.
    Handled,
    /// No file at this path; fall through to the next route (the
    /// `not_found` terminal middleware, ordinarily).
    NoMatch,
    Error(HttpError),
    Protocol(ProtocolError),
}

pub async fn serve(mount: &StaticMount, req: &mut Request, res: &mut Response) -> StaticOutcome {
    if req.method != "GET" && req.method != "HEAD" {
        res.set("Allow", "GET, HEAD");
        return StaticOutcome::Error(HttpError::new(405));
    }

    let rel: PathBuf = req.path.split('/').filter(|segment| !segment.is_empty()).collect();
    let mut disk = mount.root.join(&rel);

    let is_dir = tokio::fs::metadata(&disk).await.map(|m| m.is_dir()).unwrap_or(false);
    if is_dir {
        if !req.full_path.ends_with('/') {
            res.prepare_redirect(&format!("{}/", req.full_path));
            return StaticOutcome::Error(HttpError::new(301));
        }

        let mut found = None;
        for name in &mount.config.index {
            let candidate = disk.join(name);
            if tokio::fs::metadata(&candidate).await.map(|m| m.is_file()).unwrap_or(false) {
                found = Some(candidate);
                break;
            }
        }
        match found {
            Some(candidate) => disk = candidate,
            None => return StaticOutcome::NoMatch,
        }
    }

    let metadata = match tokio::fs::metadata(&disk).await {
        Ok(m) if m.is_file() => m,
        _ => return StaticOutcome::NoMatch,
    };

    let mtime = floor_to_seconds(metadata.modified().unwrap_or(UNIX_EPOCH));
    res.set("Last-Modified", httpdate::fmt_http_date(mtime));

    if let Some(if_modified_since) = req.header("If-Modified-Since") {
        if let Ok(client_time) = httpdate::parse_http_date(if_modified_since) {
            if client_time >= mtime {
                return StaticOutcome::Error(HttpError::new(304));
            }
        }
    }

    let content_type = crate::mime::guess_or(&disk, &mount.config.default_type).into_owned();
    res.set("Content-Type", content_type);

    let encoding = choose_encoding(req, mount.config.gzip);
    if encoding != "identity" {
        res.set("Content-Encoding", encoding);
    }

    if req.method == "GET" {
        let content = match tokio::fs::read(&disk).await {
            Ok(bytes) => bytes,
            Err(_) => return StaticOutcome::NoMatch,
        };

        let send_result = if encoding == "gzip" {
            let compressed = gzip_compress(&content);
            res.send(Some(&compressed))
        } else {
            res.send(Some(&content))
        };

        if let Err(err) = send_result {
            return StaticOutcome::Protocol(err);
        }
    } else {
        // HEAD: identity encoding still reports Content-Length (spec.md
        // §4.4 step 8); gzip-negotiated HEAD omits it rather than
        // compressing just to measure, per spec.md §9's open question.
        if encoding != "gzip" {
            res.set("Content-Length", metadata.len().to_string());
        }
        if let Err(err) = res.send(None) {
            return StaticOutcome::Protocol(err);
        }
    }

    StaticOutcome::Handled
}

fn floor_to_seconds(t: std::time::SystemTime) -> std::time::SystemTime {
    let secs = t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    UNIX_EPOCH + Duration::from_secs(secs)
}

/// spec.md §4.4 step 7: candidates start as `[identity]`, `gzip` appended
/// when enabled; if the client sent `Accept-Encoding` (even empty),
/// negotiate over the reversed candidate list; otherwise HTTP/1.1 clients
/// get the last (most preferred/most compressed) candidate for free.
fn choose_encoding(req: &Request, gzip_enabled: bool) -> &'static str {
    let mut candidates = vec!["identity"];
    if gzip_enabled {
        candidates.push("gzip");
    }

    if req.headers.contains_key("Accept-Encoding") {
        let reversed: Vec<&str> = candidates.iter().rev().copied().collect();
        req.accept_encoding.negotiate(&reversed).unwrap_or("identity")
    } else if req.version == "1.1" {
        candidates.last().copied().unwrap_or("identity")
    } else {
        "identity"
    }
}

fn gzip_compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("writing to an in-memory encoder cannot fail");
    encoder.finish().expect("finishing an in-memory encoder cannot fail")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiate::Negotiation;

    fn request_with(version: &str, accept_encoding: Option<&str>) -> Request {
        let mut headers = rustc_hash::FxHashMap::default();
        if let Some(v) = accept_encoding {
            headers.insert("Accept-Encoding".to_string(), v.to_string());
        }
        Request {
            method: "GET".to_string(),
            version: version.to_string(),
            full_path: "/".to_string(),
            path: "/".to_string(),
            base: String::new(),
            query: String::new(),
            fragment: String::new(),
            host: "x".to_string(),
            port: 80,
            url: "http://x/".to_string(),
            accept: Negotiation::absent(),
            accept_encoding: Negotiation::from_header(accept_encoding),
            accept_charset: Negotiation::absent(),
            accept_language: Negotiation::absent(),
            te: Negotiation::absent(),
            headers,
            raw: vec![],
            payload: vec![],
        }
    }

    #[test]
    fn http_1_1_without_accept_encoding_picks_last_candidate() {
        let req = request_with("1.1", None);
        assert_eq!(choose_encoding(&req, true), "gzip");
        assert_eq!(choose_encoding(&req, false), "identity");
    }

    #[test]
    fn http_1_0_without_accept_encoding_stays_identity() {
        let req = request_with("1.0", None);
        assert_eq!(choose_encoding(&req, true), "identity");
    }

    #[test]
    fn explicit_accept_encoding_is_negotiated() {
        let req = request_with("1.1", Some("identity;q=1.0"));
        assert_eq!(choose_encoding(&req, true), "identity");

        let req = request_with("1.1", Some("gzip"));
        assert_eq!(choose_encoding(&req, true), "gzip");
    }

    #[test]
    fn gzip_round_trips() {
        let data = b"hello world, this is static content";
        let compressed = gzip_compress(data);
        let mut decoder = flate2::read::GzDecoder::new(&compressed[..]);
        let mut out = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut out).unwrap();
        assert_eq!(out, data);
    }
}
