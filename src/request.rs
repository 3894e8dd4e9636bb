//! Request framing and parsing (spec.md §4.1).
//!
//! Reads a request off the wire in three phases: consume bytes until the
//! blank-line sentinel, parse the start line and headers out of the head,
//! then read a bounded body if `Content-Length` was present. Each phase is
//! a thin wrapper over [`consume`], which mirrors the source's
//! `Request.consume(until, max_length)`: read in 4096-byte chunks, stop on
//! pattern match, length cap, or a short/zero read.

use rustc_hash::FxHashMap;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use crate::error::HttpError;
use crate::negotiate::Negotiation;

const CHUNK_SIZE: usize = 4096;
/// Hard cap on head size (start line + headers) before we give up and
/// answer 413 rather than buffering an unbounded amount of attacker input.
const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Why [`Request::read`] did not return a fully parsed [`Request`].
pub enum ParseOutcome {
    Parsed(Request),
    /// The peer closed the connection (or sent nothing) before a full
    /// request arrived. Not an error: the connection simply ends.
    ConnectionClosed,
    /// The bytes received don't form a valid request. The caller writes
    /// the error response itself and then terminates the connection,
    /// matching spec.md §7's "the response is written before the router
    /// is ever invoked."
    Malformed(HttpError),
}

/// An immutable-after-parse HTTP request (spec.md §3).
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub version: String,
    pub full_path: String,
    pub path: String,
    pub base: String,
    pub query: String,
    pub fragment: String,
    pub host: String,
    pub port: u16,
    pub url: String,
    pub headers: FxHashMap<String, String>,
    pub raw: Vec<u8>,
    pub payload: Vec<u8>,
    pub accept: Negotiation,
    pub accept_encoding: Negotiation,
    pub accept_charset: Negotiation,
    pub accept_language: Negotiation,
    pub te: Negotiation,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&title_case(name)).map(String::as_str)
    }

    /// Read and parse one request off `stream`. `local_addr` is used as the
    /// `Host` fallback for HTTP/1.0 requests that omit it, mirroring the
    /// source's fallback to `conn.getsockname()`.
    pub async fn read(stream: &mut TcpStream, local_addr: (String, u16)) -> ParseOutcome {
        let head_buf = consume(stream, Vec::new(), |buf| find_blank_line(buf).is_some(), Some(MAX_HEAD_SIZE)).await;

        if head_buf.is_empty() {
            return ParseOutcome::ConnectionClosed;
        }

        let Some((blank_start, blank_end)) = find_blank_line(&head_buf) else {
            if head_buf.len() >= MAX_HEAD_SIZE {
                return ParseOutcome::Malformed(HttpError::with_message(413, "Request too large"));
            }
            return ParseOutcome::ConnectionClosed;
        };

        let head = &head_buf[..blank_start];
        let mut payload = head_buf[blank_end..].to_vec();
        let mut raw = head_buf.clone();

        let lines = split_lines(head);
        let Some((&start_line, header_lines)) = lines.split_first() else {
            return ParseOutcome::Malformed(HttpError::with_message(400, "Malformed headers"));
        };

        let Some((method, full_path, version)) = parse_start_line(start_line) else {
            return ParseOutcome::Malformed(HttpError::with_message(400, "Malformed headers"));
        };

        let mut headers = FxHashMap::default();
        for &line in header_lines {
            if line.is_empty() {
                continue;
            }
            match parse_header_line(line) {
                Some((key, value)) => {
                    headers.insert(key, value);
                }
                None => return ParseOutcome::Malformed(HttpError::with_message(400, "Malformed headers")),
            }
        }

        if version.as_str() >= "1.1" && !headers.contains_key("Host") {
            return ParseOutcome::Malformed(HttpError::with_message(400, "Host header required"));
        }

        let host_header = headers.get("Host").cloned().unwrap_or_else(|| format!("{}:{}", local_addr.0, local_addr.1));
        let (host, port) = match host_header.rsplit_once(':') {
            Some((h, p)) => match p.parse::<u16>() {
                Ok(p) => (h.to_string(), p),
                Err(_) => (host_header.clone(), 80),
            },
            None => (host_header.clone(), 80),
        };

        let port_suffix = if port != 80 { format!(":{port}") } else { String::new() };
        let url = format!("http://{host}{port_suffix}{full_path}");

        let (path, query, fragment) = split_target(&full_path);
        if path.split('/').any(|segment| segment == "..") {
            return ParseOutcome::Malformed(HttpError::with_message(400, "Path traversal rejected"));
        }

        if let Some(content_length_str) = headers.get("Content-Length") {
            let content_length: usize = match content_length_str.parse() {
                Ok(n) => n,
                Err(_) => return ParseOutcome::Malformed(HttpError::with_message(400, "Invalid Content-Length")),
            };

            if payload.len() < content_length {
                let remaining = content_length - payload.len();
                let more = consume(stream, Vec::new(), |buf| buf.len() >= remaining, Some(remaining)).await;
                raw.extend_from_slice(&more);
                payload.extend_from_slice(&more);
            }

            if payload.len() < content_length {
                return ParseOutcome::ConnectionClosed;
            }
            payload.truncate(content_length);
        }

        let accept = Negotiation::from_header(headers.get("Accept").map(String::as_str));
        let accept_encoding = Negotiation::from_header(headers.get("Accept-Encoding").map(String::as_str));
        let accept_charset = Negotiation::from_header(headers.get("Accept-Charset").map(String::as_str));
        let accept_language = Negotiation::from_header(headers.get("Accept-Language").map(String::as_str));
        let te = Negotiation::from_header(headers.get("TE").map(String::as_str));

        ParseOutcome::Parsed(Request {
            method,
            version,
            full_path,
            path,
            base: String::new(),
            query,
            fragment,
            host,
            port,
            url,
            headers,
            raw,
            payload,
            accept,
            accept_encoding,
            accept_charset,
            accept_language,
            te,
        })
    }
}

/// Read from `stream` in 4096-byte chunks, appending to `buf`, stopping
/// when `until(buf)` is true, `max_length` is reached, or the last read
/// returned less than a full chunk (including 0).
async fn consume(stream: &mut TcpStream, mut buf: Vec<u8>, until: impl Fn(&[u8]) -> bool, max_length: Option<usize>) -> Vec<u8> {
    let mut chunk = [0u8; CHUNK_SIZE];
    loop {
        if until(&buf) {
            break;
        }
        if let Some(max) = max_length {
            if buf.len() >= max {
                break;
            }
        }

        let n = match stream.read(&mut chunk).await {
            Ok(n) => n,
            Err(_) => break,
        };
        buf.extend_from_slice(&chunk[..n]);
        if n == 0 || n < chunk.len() {
            break;
        }
    }
    buf
}

/// Finds the first `\r?\n\r?\n` match, returning `(start, end)` byte offsets.
fn find_blank_line(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i < buf.len() {
        let mut j = i;
        if buf.get(j) == Some(&b'\r') {
            j += 1;
        }
        if buf.get(j) != Some(&b'\n') {
            i += 1;
            continue;
        }
        j += 1;
        if buf.get(j) == Some(&b'\r') {
            j += 1;
        }
        if buf.get(j) == Some(&b'\n') {
            return Some((i, j + 1));
        }
        i += 1;
    }
    None
}

/// Splits on `\r?\n`, matching `NEWLINE_RE` in the source.
fn split_lines(buf: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    for i in 0..buf.len() {
        if buf[i] == b'\n' {
            let end = if i > start && buf[i - 1] == b'\r' { i - 1 } else { i };
            lines.push(&buf[start..end]);
            start = i + 1;
        }
    }
    if start <= buf.len() {
        lines.push(&buf[start..]);
    }
    lines
}

/// `^([A-Z]+) ([^\x00-\x20<>#%"]+)(?: HTTP/([0-9A-Za-z.]+))?$`, hand-rolled
/// to avoid pulling in a regex engine for one pattern.
fn parse_start_line(line: &[u8]) -> Option<(String, String, String)> {
    let s = std::str::from_utf8(line).ok()?;
    let space = s.find(' ')?;
    let method = &s[..space];
    if method.is_empty() || !method.bytes().all(|b| b.is_ascii_uppercase()) {
        return None;
    }
    let rest = &s[space + 1..];

    if let Some(pos) = rest.rfind(" HTTP/") {
        let target = &rest[..pos];
        let version = &rest[pos + " HTTP/".len()..];
        if !is_valid_target(target) || !is_valid_version(version) {
            return None;
        }
        Some((method.to_string(), target.to_string(), version.to_string()))
    } else {
        if !is_valid_target(rest) {
            return None;
        }
        Some((method.to_string(), rest.to_string(), "1.0".to_string()))
    }
}

fn is_valid_target(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b > 0x20 && !matches!(b, b'<' | b'>' | b'#' | b'%' | b'"'))
}

fn is_valid_version(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'.')
}

fn parse_header_line(line: &[u8]) -> Option<(String, String)> {
    let s = std::str::from_utf8(line).ok()?;
    let colon = s.find(':')?;
    let key = title_case(&s[..colon]);
    let value = s[colon + 1..].trim_start_matches(' ').to_string();
    Some((key, value))
}

/// Title-cases an ASCII header name, e.g. `content-length` -> `Content-Length`.
pub fn title_case(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn split_target(target: &str) -> (String, String, String) {
    let (before_fragment, fragment) = match target.find('#') {
        Some(i) => (&target[..i], &target[i + 1..]),
        None => (target, ""),
    };
    let (path_part, query) = match before_fragment.find('?') {
        Some(i) => (&before_fragment[..i], &before_fragment[i + 1..]),
        None => (before_fragment, ""),
    };
    (percent_decode(path_part), percent_decode(query), percent_decode(fragment))
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(h), Some(l)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                out.push((h << 4) | l);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_line_variants() {
        assert_eq!(find_blank_line(b"a\r\n\r\nb"), Some((1, 5)));
        assert_eq!(find_blank_line(b"a\n\nb"), Some((1, 3)));
        assert_eq!(find_blank_line(b"a\r\n\nb"), Some((1, 4)));
        assert_eq!(find_blank_line(b"no blank line here"), None);
    }

    #[test]
    fn split_lines_basic() {
        let lines = split_lines(b"GET / HTTP/1.1\r\nHost: x");
        assert_eq!(lines, vec![&b"GET / HTTP/1.1"[..], &b"Host: x"[..]]);
    }

    #[test]
    fn start_line_with_version() {
        let (m, p, v) = parse_start_line(b"GET /foo HTTP/1.1").unwrap();
        assert_eq!((m.as_str(), p.as_str(), v.as_str()), ("GET", "/foo", "1.1"));
    }

    #[test]
    fn start_line_missing_version_defaults_to_1_0() {
        let (m, p, v) = parse_start_line(b"GET /foo").unwrap();
        assert_eq!((m.as_str(), p.as_str(), v.as_str()), ("GET", "/foo", "1.0"));
    }

    #[test]
    fn start_line_rejects_lowercase_method() {
        assert!(parse_start_line(b"get / HTTP/1.1").is_none());
    }

    #[test]
    fn start_line_rejects_forbidden_target_chars() {
        assert!(parse_start_line(b"GET /<script> HTTP/1.1").is_none());
    }

    #[test]
    fn header_title_casing_and_duplicate_overwrite() {
        assert_eq!(title_case("content-length"), "Content-Length");
        assert_eq!(title_case("ETAG"), "Etag");
        let (k, v) = parse_header_line(b"x-custom-header:  value ").unwrap();
        assert_eq!(k, "X-Custom-Header");
        assert_eq!(v, "value ");
    }

    #[test]
    fn url_splits_path_query_fragment_and_decodes() {
        let (path, query, fragment) = split_target("/a%20b?x=1&y=2#frag");
        assert_eq!(path, "/a b");
        assert_eq!(query, "x=1&y=2");
        assert_eq!(fragment, "frag");
    }
}
