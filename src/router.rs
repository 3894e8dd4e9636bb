//! Route matching and top-level dispatch (spec.md §4.5).
//!
//! Routes are compiled from `locations` prefixes rather than expressed as a
//! user-extensible middleware stack: this crate only ever needs two route
//! kinds (serve a static mount, or the terminal 404), so a small closed enum
//! replaces the source's general "handler is any callable" design. Matching
//! and invocation happen in the same pass here rather than the source's two
//! separate steps (pre-compute the matching set, then re-match on invoke) —
//! routes never re-enter a nested sub-router in this crate, so the two
//! passes would always agree.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Configuration;
use crate::error::{HttpError, ProtocolError};
use crate::request::Request;
use crate::response::Response;
use crate::static_file::{self, StaticMount, StaticOutcome};

const METHODS: [&str; 6] = ["GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS"];

enum Segment {
    Literal(String),
    Param,
}

/// A compiled mount path. `Empty` matches the whole remaining path and
/// consumes none of it — spec.md §9's "null pattern matches everything
/// (equivalent to an empty regex)", also used for a `/` mount.
enum Pattern {
    Empty,
    Segments(Vec<Segment>),
}

fn compile(path: &str) -> Pattern {
    let trimmed = path.trim_start_matches('/').trim_end_matches('/');
    if trimmed.is_empty() {
        return Pattern::Empty;
    }
    let segments = trimmed
        .split('/')
        .map(|segment| if let Some(_name) = segment.strip_prefix(':') { Segment::Param } else { Segment::Literal(segment.to_string()) })
        .collect();
    Pattern::Segments(segments)
}

/// Attempts to match `pattern` as a prefix of `path`, returning the matched
/// prefix and the unconsumed remainder.
fn try_match<'a>(pattern: &Pattern, path: &'a str) -> Option<(&'a str, &'a str)> {
    match pattern {
        Pattern::Empty => Some((&path[..0], path)),
        Pattern::Segments(segments) => {
            let bytes = path.as_bytes();
            let mut idx = 0;
            for segment in segments {
                if idx >= bytes.len() || bytes[idx] != b'/' {
                    return None;
                }
                idx += 1;
                let start = idx;
                while idx < bytes.len() && bytes[idx] != b'/' {
                    idx += 1;
                }
                let part = &path[start..idx];
                if part.is_empty() {
                    return None;
                }
                if let Segment::Literal(literal) = segment {
                    if part != literal {
                        return None;
                    }
                }
            }
            Some((&path[..idx], &path[idx..]))
        }
    }
}

enum RouteKind {
    Static(StaticMount),
    NotFound,
}

struct Route {
    pattern: Pattern,
    kind: RouteKind,
}

impl Route {
    fn matches(&self, req: &Request) -> bool {
        try_match(&self.pattern, &req.path).is_some()
    }

    async fn invoke(&self, req: &mut Request, res: &mut Response) -> RouteResult {
        let (matched, remainder) = match try_match(&self.pattern, &req.path) {
            Some(m) => m,
            None => return RouteResult::Continue,
        };
        req.base.push_str(matched);
        req.path = remainder.to_string();

        match &self.kind {
            RouteKind::Static(mount) => match static_file::serve(mount, req, res).await {
                StaticOutcome::Handled => RouteResult::Stop,
                StaticOutcome::NoMatch => RouteResult::Continue,
                StaticOutcome::Error(e) => RouteResult::Error(e),
                StaticOutcome::Protocol(e) => RouteResult::Protocol(e),
            },
            RouteKind::NotFound => RouteResult::Error(HttpError::new(404)),
        }
    }
}

enum RouteResult {
    Continue,
    Stop,
    Error(HttpError),
    Protocol(ProtocolError),
}

/// Outcome of running the full pipeline against one request: whether the
/// connection engine should close the socket afterwards.
pub struct DispatchResult {
    pub terminate: bool,
}

pub struct Router {
    routes: Vec<Route>,
    error_pages: Vec<(u16, PathBuf)>,
}

impl Router {
    /// Builds the route stack for one listener: one static mount per
    /// `locations` entry (longest prefix first, so overlapping mounts
    /// resolve to the most specific one), followed by the terminal 404.
    pub fn from_config(config: Arc<Configuration>) -> Self {
        let mut entries: Vec<(&String, &crate::config::LocationConfig)> = config.locations.iter().collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

        let mut routes: Vec<Route> = entries
            .into_iter()
            .map(|(prefix, location)| Route {
                pattern: compile(prefix),
                kind: RouteKind::Static(StaticMount { root: location.root.clone(), config: config.clone() }),
            })
            .collect();
        routes.push(Route { pattern: Pattern::Empty, kind: RouteKind::NotFound });

        let error_pages = config.error_pages.iter().map(|(code, path)| (*code, path.clone())).collect();

        Self { routes, error_pages }
    }

    pub async fn dispatch(&self, req: &mut Request, res: &mut Response) -> DispatchResult {
        let connection_header = req.header("Connection").map(|v| v.to_ascii_lowercase());
        match connection_header.as_deref() {
            Some("close") => {
                res.set("Connection", "close");
            }
            Some("keep-alive") => {
                res.set("Connection", "keep-alive");
            }
            // No explicit preference: HTTP/1.1 defaults to persistent
            // connections, HTTP/1.0 defaults to closing after one response.
            None if req.version == "1.1" => {
                res.set("Connection", "keep-alive");
            }
            None => {
                res.set("Connection", "close");
            }
            Some(_) if req.version == "1.1" => {
                res.set("Connection", "keep-alive");
            }
            Some(_) => {
                res.set("Connection", "close");
            }
        }

        if !METHODS.contains(&req.method.as_str()) {
            res.set("Allow", METHODS.join(", "));
            self.handle_error(&HttpError::new(501), req, res).await;
            return DispatchResult { terminate: true };
        }

        for route in &self.routes {
            if !route.matches(req) {
                continue;
            }
            match route.invoke(req, res).await {
                RouteResult::Continue => continue,
                RouteResult::Stop => break,
                RouteResult::Error(err) => {
                    self.handle_error(&err, req, res).await;
                    return DispatchResult { terminate: true };
                }
                RouteResult::Protocol(err) => {
                    eprintln!("protocol error: {err}");
                    return DispatchResult { terminate: true };
                }
            }
        }

        let terminate = res.header("Connection").map(|v| v.eq_ignore_ascii_case("close")).unwrap_or(false);
        DispatchResult { terminate }
    }

    /// User-registered error pages run before the built-in handler: the
    /// source runs its built-in handler first (which unconditionally marks
    /// the body sent), so a registered error page's own `send` always fails
    /// with a caught-and-ignored protocol error and never actually reaches
    /// the client. Inverting the order fixes that and makes `error_pages`
    /// do what its name promises.
    async fn handle_error(&self, err: &HttpError, req: &Request, res: &mut Response) {
        for (code, path) in &self.error_pages {
            if *code != err.code {
                continue;
            }
            match tokio::fs::read(path).await {
                Ok(content) => {
                    if res.status(err.code).is_ok() {
                        let content_type = crate::mime::guess_or(path, "text/html").into_owned();
                        res.set("Content-Type", content_type);
                        let _ = res.send(Some(&content));
                    }
                    return;
                }
                Err(e) => {
                    eprintln!("error page {path:?} for status {code} unreadable: {e}");
                    break;
                }
            }
        }

        if res.status_sent() {
            return;
        }
        let _ = res.status(err.code);
        match &err.message {
            Some(message) => {
                let _ = res.send_str(message);
            }
            None => {
                let _ = res.send(None);
            }
        }
        let _ = req;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pattern_matches_whole_path_without_consuming() {
        let (matched, remainder) = try_match(&Pattern::Empty, "/a/b").unwrap();
        assert_eq!(matched, "");
        assert_eq!(remainder, "/a/b");
    }

    #[test]
    fn literal_prefix_consumes_its_segment() {
        let pattern = compile("/assets");
        let (matched, remainder) = try_match(&pattern, "/assets/app.js").unwrap();
        assert_eq!(matched, "/assets");
        assert_eq!(remainder, "/app.js");
    }

    #[test]
    fn root_mount_behaves_like_empty_pattern() {
        let pattern = compile("/");
        let (matched, remainder) = try_match(&pattern, "/index.html").unwrap();
        assert_eq!(matched, "");
        assert_eq!(remainder, "/index.html");
    }

    #[test]
    fn literal_mismatch_does_not_match() {
        let pattern = compile("/assets");
        assert!(try_match(&pattern, "/images/a.png").is_none());
    }

    #[test]
    fn param_segment_matches_any_nonempty_value() {
        let pattern = compile("/users/:id");
        let (matched, remainder) = try_match(&pattern, "/users/42/profile").unwrap();
        assert_eq!(matched, "/users/42");
        assert_eq!(remainder, "/profile");
    }
}
