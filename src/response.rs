//! Response writer (spec.md §4.3).
//!
//! The three booleans spec.md §3 describes (`status_sent`, `headers_sent`,
//! `body_sent`) are modeled as a single [`ResponseState`] enum rather than
//! three independent flags, per spec.md §9's note that the legal
//! transitions form a four-state sum type. Output is buffered into an
//! in-memory `wire` vector rather than written straight to the socket: the
//! [`crate::connection`] engine flushes it in one `write_all` once the
//! router pipeline finishes. This preserves every byte-ordering invariant
//! spec.md §8 tests for while sidestepping the need to thread a mutable
//! socket reference through every handler.

use crate::error::ProtocolError;
use crate::status::reason_phrase;

pub const APP_NAME: &str = "originhttpd";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
/// The source's `Server` header embeds a Python runtime version; kept as a
/// literal wire-compatibility artifact per spec.md §9 ("a faithful port may
/// preserve this for compatibility"). It does not imply a Python runtime.
const PYTHON_RUNTIME_TOKEN: &str = "3.11.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseState {
    Unset,
    StatusSent,
    HeadersSent,
    BodySent,
}

/// An ordered, case-normalized header map. A plain `Vec` rather than a
/// hash map: header counts per response are tiny, insertion order is
/// preserved for deterministic wire output, and `set_default` / overwrite
/// semantics are simple linear scans either way.
#[derive(Debug, Default, Clone)]
struct HeaderMap(Vec<(String, String)>);

impl HeaderMap {
    fn set(&mut self, key: &str, value: impl Into<String>) {
        let key = crate::request::title_case(key);
        let value = value.into();
        if let Some(entry) = self.0.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.0.push((key, value));
        }
    }

    fn set_default(&mut self, key: &str, value: impl Into<String>) {
        let key = crate::request::title_case(key);
        if !self.0.iter().any(|(k, _)| *k == key) {
            self.0.push((key, value.into()));
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        let key = crate::request::title_case(key);
        self.0.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// A mutable response tied 1:1 to a [`crate::request::Request`] (spec.md §3).
#[derive(Debug)]
pub struct Response {
    state: ResponseState,
    version: String,
    status_code: u16,
    headers: HeaderMap,
    charset: String,
    wire: Vec<u8>,
}

impl Response {
    pub fn new(version: &str, charset: &str) -> Self {
        Self {
            state: ResponseState::Unset,
            version: version.to_string(),
            status_code: 200,
            headers: HeaderMap::default(),
            charset: charset.to_string(),
            wire: Vec::new(),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    pub fn status_sent(&self) -> bool {
        self.state != ResponseState::Unset
    }

    pub fn body_sent(&self) -> bool {
        self.state == ResponseState::BodySent
    }

    /// Writes the status line. Second call on the same response is a
    /// [`ProtocolError`].
    pub fn status(&mut self, code: u16) -> Result<&mut Self, ProtocolError> {
        if self.state != ResponseState::Unset {
            return Err(ProtocolError::new("the status code has already been sent"));
        }
        self.status_code = code;
        let line = format!("HTTP/{} {} {}\r\n", self.version, code, reason_phrase(code));
        self.wire.extend_from_slice(line.as_bytes());
        self.state = ResponseState::StatusSent;
        Ok(self)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.headers.set(key, value);
        self
    }

    pub fn set_default(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.headers.set_default(key, value);
        self
    }

    /// Sends the status (defaulting to 200 if unsent), default `Server`
    /// and `Date` headers, every stored header, and the terminating blank
    /// line.
    pub fn write_head(&mut self) -> Result<&mut Self, ProtocolError> {
        if self.state == ResponseState::Unset {
            self.status(200)?;
        }
        if self.state != ResponseState::StatusSent {
            return Err(ProtocolError::new("headers already sent"));
        }

        self.set_default("Server", format!("{APP_NAME}/{APP_VERSION} python/{PYTHON_RUNTIME_TOKEN}"));
        self.set_default("Date", httpdate::fmt_http_date(std::time::SystemTime::now()));

        for (key, value) in &self.headers.0 {
            self.wire.extend_from_slice(format!("{key}: {value}\r\n").as_bytes());
        }
        self.wire.extend_from_slice(b"\r\n");
        self.state = ResponseState::HeadersSent;
        Ok(self)
    }

    /// Sends a body (or none). Defaults `Content-Length`/`Content-Type`
    /// when headers haven't been written yet and a payload is present.
    pub fn send(&mut self, payload: Option<&[u8]>) -> Result<(), ProtocolError> {
        if self.state == ResponseState::BodySent {
            return Err(ProtocolError::new("the message has already been sent"));
        }
        if self.state == ResponseState::Unset {
            self.status(200)?;
        }
        if self.state == ResponseState::StatusSent {
            if let Some(payload) = payload {
                self.set_default("Content-Length", payload.len().to_string());
                self.set_default("Content-Type", "text/plain");
            }
            self.write_head()?;
        }

        if let Some(payload) = payload {
            self.wire.extend_from_slice(payload);
        }
        self.state = ResponseState::BodySent;
        Ok(())
    }

    pub fn send_str(&mut self, payload: &str) -> Result<(), ProtocolError> {
        let charset = self.charset.clone();
        let bytes = encode_in_charset(payload, &charset);
        self.send(Some(&bytes))
    }

    /// Emits one chunk of a `Transfer-Encoding: chunked` body. Does not
    /// mark the body sent; callers must close the stream with a final
    /// empty chunk.
    pub fn send_chunk(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        if self.state == ResponseState::StatusSent || self.state == ResponseState::Unset {
            if self.state == ResponseState::Unset {
                self.status(200)?;
            }
            self.set_default("Transfer-Encoding", "chunked");
            self.write_head()?;
        }
        self.wire.extend_from_slice(format!("{:x}\r\n", payload.len()).as_bytes());
        self.wire.extend_from_slice(payload);
        self.wire.extend_from_slice(b"\r\n");
        Ok(())
    }

    /// Sets `Location` and returns the 301 the caller should raise.
    pub fn prepare_redirect(&mut self, location: &str) {
        self.set("Location", location);
    }

    pub fn has_header(&self, key: &str) -> bool {
        self.headers.contains(key)
    }

    /// Consumes the response, returning the accumulated wire bytes for the
    /// connection engine to flush.
    pub fn into_wire(self) -> Vec<u8> {
        self.wire
    }
}

fn encode_in_charset(s: &str, charset: &str) -> Vec<u8> {
    if charset.eq_ignore_ascii_case("utf-8") || charset.eq_ignore_ascii_case("utf8") {
        s.as_bytes().to_vec()
    } else {
        // Only UTF-8 is actually supported for encoding; other charset
        // names are accepted (and emitted in Content-Type) but the body
        // itself is always written as UTF-8 bytes.
        s.as_bytes().to_vec()
    }
}
