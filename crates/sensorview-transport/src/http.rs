//! Minimal HTTP responder for the viewer's static assets.
//!
//! Only `GET` (and `HEAD`) of plain files is supported. Every response closes
//! the connection. When no web root is configured, or the index page is
//! missing from it, a small built-in viewer is served instead.

use std::borrow::Cow;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Component, Path, PathBuf};

use tracing::debug;

/// Built-in viewer page.
pub const BUILTIN_VIEWER: &str = include_str!("viewer.html");

const MAX_HEAD_LINES: usize = 100;
/// Bytes of request head read before the request is rejected.
pub const MAX_HEAD_BYTES: u64 = 8 * 1024;

/// Whether a request head asks for a WebSocket upgrade.
pub fn is_upgrade_request(head: &[u8]) -> bool {
    let text = String::from_utf8_lossy(head);
    text.lines().skip(1).any(|line| {
        line.split_once(':').is_some_and(|(name, value)| {
            name.trim().eq_ignore_ascii_case("upgrade")
                && value.trim().eq_ignore_ascii_case("websocket")
        })
    })
}

/// MIME type for a file name.
pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("wasm") => "application/wasm",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

struct Response {
    status: u16,
    reason: &'static str,
    content_type: &'static str,
    body: Cow<'static, [u8]>,
}

impl Response {
    fn text(status: u16, reason: &'static str) -> Self {
        Self {
            status,
            reason,
            content_type: "text/plain; charset=utf-8",
            body: Cow::Borrowed(reason.as_bytes()),
        }
    }
}

/// Serves files below an optional root directory.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: Option<PathBuf>,
    index_page: String,
}

impl StaticFiles {
    pub fn new(root: Option<PathBuf>, index_page: impl Into<String>) -> Self {
        Self {
            root,
            index_page: index_page.into(),
        }
    }

    /// Map a request path to a file below the root.
    ///
    /// Returns `None` for paths that try to leave the root. `/` maps to the
    /// index page. Query strings and fragments are ignored.
    pub fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let root = self.root.as_ref()?;
        let path = request_path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_start_matches('/');
        let path = if path.is_empty() {
            self.index_page.as_str()
        } else {
            path
        };

        let mut resolved = root.clone();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(resolved)
    }

    /// Read one request from `stream` and write the response.
    ///
    /// At most [`MAX_HEAD_BYTES`] of the request head are read; a longer head
    /// is answered with `431`.
    pub fn handle<S: Read + Write>(&self, stream: S) -> io::Result<()> {
        let mut reader = BufReader::new(stream.take(MAX_HEAD_BYTES));
        let mut request_line = String::new();
        reader.read_line(&mut request_line)?;

        // Drain the rest of the head so the client sees a clean close.
        let mut line = String::new();
        let mut complete = false;
        for _ in 0..MAX_HEAD_LINES {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            if line.trim_end().is_empty() {
                complete = true;
                break;
            }
        }
        let oversized = !complete && reader.get_ref().limit() == 0;

        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or_default();
        let target = parts.next().unwrap_or_default();

        let response = match method {
            _ if oversized => Response::text(431, "Request Header Fields Too Large"),
            "GET" | "HEAD" if target.starts_with('/') => self.lookup(target),
            "GET" | "HEAD" => Response::text(400, "Bad Request"),
            _ => Response::text(405, "Method Not Allowed"),
        };
        debug!(method, target, status = response.status, "http request");

        let mut stream = reader.into_inner().into_inner();
        write!(
            stream,
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            response.status,
            response.reason,
            response.content_type,
            response.body.len()
        )?;
        if method != "HEAD" {
            stream.write_all(&response.body)?;
        }
        stream.flush()
    }

    fn lookup(&self, target: &str) -> Response {
        let path = target.split(['?', '#']).next().unwrap_or_default();
        let is_index = matches!(path.trim_start_matches('/'), "" | "index.html")
            || path.trim_start_matches('/') == self.index_page;

        if let Some(file) = self.resolve(target) {
            if let Ok(body) = std::fs::read(&file) {
                return Response {
                    status: 200,
                    reason: "OK",
                    content_type: content_type(&file),
                    body: Cow::Owned(body),
                };
            }
        } else if self.root.is_some() {
            return Response::text(403, "Forbidden");
        }

        if is_index {
            return Response {
                status: 200,
                reason: "OK",
                content_type: "text/html; charset=utf-8",
                body: Cow::Borrowed(BUILTIN_VIEWER.as_bytes()),
            };
        }
        Response::text(404, "Not Found")
    }
}
