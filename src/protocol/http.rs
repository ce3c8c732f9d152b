//! Minimal HTTP/1.1 request head parsing and responses.
//!
//! Only what the dashboard needs: one request per connection, no bodies,
//! no chunked encoding, no keep-alive. Every response carries
//! `Connection: close` and the connection is closed after it is written.
//!
//! # Routes
//!
//! | Path | Response |
//! |------|----------|
//! | `/`, `/index.html`, configured alias | `200` + dashboard asset |
//! | `/favicon.ico` | `204` |
//! | anything else | `404` |

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

use crate::asset::DashboardAsset;
use crate::error::{Error, Result};

// ============================================================================
// RequestHead
// ============================================================================

/// Request line plus headers of an incoming request.
///
/// Header names are stored lowercased; lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHead {
    method: String,
    path: String,
    headers: FxHashMap<String, String>,
}

impl RequestHead {
    /// Builds a head from a request line and raw header lines.
    ///
    /// Returns `None` for an empty request line. Header lines without a
    /// colon are skipped; a repeated header keeps its last value.
    pub fn parse<'a, I>(request_line: &str, header_lines: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut parts = request_line.split_whitespace();
        let method = parts.next()?.to_string();
        let path = parts.next().unwrap_or("/").to_string();

        let mut headers = FxHashMap::default();
        for line in header_lines {
            let Some(colon) = line.find(':') else {
                continue;
            };
            if colon == 0 {
                continue;
            }
            let name = line[..colon].trim().to_ascii_lowercase();
            let value = line[colon + 1..].trim().to_string();
            headers.insert(name, value);
        }

        Some(Self {
            method,
            path,
            headers,
        })
    }

    /// Reads a request head terminated by a blank line.
    ///
    /// At most `max_bytes` are consumed; anything after the blank line
    /// stays buffered in `reader`.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if the peer closed before sending anything or sent an
    /// empty request line.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the head is incomplete or exceeds `max_bytes`
    /// - [`Error::Io`] on read failure or non UTF-8 input
    pub async fn read<R>(reader: &mut R, max_bytes: u64) -> Result<Option<Self>>
    where
        R: AsyncBufRead + Unpin + ?Sized,
    {
        let mut limited = (&mut *reader).take(max_bytes);
        let mut line = String::new();

        if limited.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        let request_line = line.trim_end_matches(['\r', '\n']).to_string();
        if request_line.trim().is_empty() {
            return Ok(None);
        }

        let mut header_lines = Vec::new();
        loop {
            line.clear();
            if limited.read_line(&mut line).await? == 0 {
                return Err(Error::protocol("incomplete request head"));
            }
            let header = line.trim_end_matches(['\r', '\n']);
            if header.is_empty() {
                break;
            }
            header_lines.push(header.to_string());
        }

        Ok(Self::parse(
            &request_line,
            header_lines.iter().map(String::as_str),
        ))
    }

    /// Returns the request method as sent.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the request target as sent.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the request target without its query string.
    #[must_use]
    pub fn route_path(&self) -> &str {
        self.path.split('?').next().unwrap_or("/")
    }

    /// Looks up a header by name, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns `true` if `Upgrade` equals `websocket` (any case).
    #[must_use]
    pub fn is_websocket_upgrade(&self) -> bool {
        self.header("upgrade")
            .is_some_and(|value| value.eq_ignore_ascii_case("websocket"))
    }
}

// ============================================================================
// Route
// ============================================================================

/// Outcome of routing a plain HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Serve the dashboard asset.
    Dashboard,
    /// `204 No Content` (favicon).
    NoContent,
    /// `404 Not Found`.
    NotFound,
}

// ============================================================================
// HttpResponder
// ============================================================================

/// Serves the dashboard asset and the few fixed responses around it.
#[derive(Debug, Clone)]
pub struct HttpResponder {
    asset: DashboardAsset,
    alias: Option<String>,
}

impl HttpResponder {
    /// Creates a responder for `asset`, optionally also served at `alias`.
    #[must_use]
    pub fn new(asset: DashboardAsset, alias: Option<String>) -> Self {
        Self { asset, alias }
    }

    /// Maps a request path to a route.
    #[must_use]
    pub fn route(&self, path: &str) -> Route {
        match path {
            "/" | "/index.html" => Route::Dashboard,
            "/favicon.ico" => Route::NoContent,
            other if self.alias.as_deref() == Some(other) => Route::Dashboard,
            _ => Route::NotFound,
        }
    }

    /// Writes the response for `path` and returns its status code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if writing fails. An unreadable asset is
    /// answered with `500` rather than returned as an error.
    pub async fn respond<W>(&self, writer: &mut W, path: &str) -> Result<u16>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        match self.route(path) {
            Route::Dashboard => match self.asset.load().await {
                Ok(body) => {
                    write_response(writer, 200, "OK", self.asset.content_type(), &body).await?;
                    Ok(200)
                }
                Err(e) => {
                    warn!(error = %e, "Dashboard asset unavailable");
                    write_response(
                        writer,
                        500,
                        "Internal Server Error",
                        PLAIN_TEXT,
                        b"500 Internal Server Error",
                    )
                    .await?;
                    Ok(500)
                }
            },
            Route::NoContent => {
                write_response(writer, 204, "No Content", PLAIN_TEXT, &[]).await?;
                Ok(204)
            }
            Route::NotFound => {
                write_response(writer, 404, "Not Found", PLAIN_TEXT, b"404 Not Found").await?;
                Ok(404)
            }
        }
    }
}

const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

/// Writes a complete `Connection: close` response and flushes.
pub async fn write_response<W>(
    writer: &mut W,
    status: u16,
    reason: &str,
    content_type: &str,
    body: &[u8],
) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let head = format!(
        "HTTP/1.1 {status} {reason}\r\n\
         Content-Type: {content_type}\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         Access-Control-Allow-Origin: *\r\n\
         \r\n",
        body.len()
    );
    writer.write_all(head.as_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn responder() -> HttpResponder {
        HttpResponder::new(
            DashboardAsset::inline("<h1>dash</h1>"),
            Some("/Dashboard.html".to_string()),
        )
    }

    async fn respond(responder: &HttpResponder, path: &str) -> (u16, String) {
        let mut out = Vec::new();
        let status = responder.respond(&mut out, path).await.unwrap();
        (status, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_parse_headers_case_insensitive() {
        let head = RequestHead::parse(
            "GET /index.html HTTP/1.1",
            ["Host: localhost", "UPGRADE: WebSocket", "garbage line", ": no-name"],
        )
        .unwrap();

        assert_eq!(head.method(), "GET");
        assert_eq!(head.path(), "/index.html");
        assert_eq!(head.header("host"), Some("localhost"));
        assert_eq!(head.header("Upgrade"), Some("WebSocket"));
        assert!(head.is_websocket_upgrade());
        assert_eq!(head.headers.len(), 2);
    }

    #[test]
    fn test_parse_empty_request_line() {
        assert!(RequestHead::parse("", ["Host: x"]).is_none());
    }

    #[test]
    fn test_route_path_strips_query() {
        let head = RequestHead::parse("GET /?v=2 HTTP/1.1", []).unwrap();
        assert_eq!(head.path(), "/?v=2");
        assert_eq!(head.route_path(), "/");
    }

    #[test]
    fn test_non_websocket_upgrade_is_http() {
        let head = RequestHead::parse("GET / HTTP/1.1", ["Upgrade: h2c"]).unwrap();
        assert!(!head.is_websocket_upgrade());
    }

    #[tokio::test]
    async fn test_read_leaves_trailing_bytes() {
        let input = b"GET / HTTP/1.1\r\nUpgrade: websocket\r\n\r\nTAIL".as_slice();
        let mut reader = input;

        let head = RequestHead::read(&mut reader, 1024).await.unwrap().unwrap();
        assert!(head.is_websocket_upgrade());
        assert_eq!(reader, b"TAIL");
    }

    #[tokio::test]
    async fn test_read_empty_stream() {
        let mut reader: &[u8] = b"";
        assert!(RequestHead::read(&mut reader, 1024).await.unwrap().is_none());

        let mut reader: &[u8] = b"\r\n";
        assert!(RequestHead::read(&mut reader, 1024).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_rejects_oversized_head() {
        let input = format!("GET / HTTP/1.1\r\nX-Fill: {}\r\n\r\n", "a".repeat(512));
        let mut reader = input.as_bytes();
        let result = RequestHead::read(&mut reader, 128).await;
        assert!(result.unwrap_err().is_protocol_error());
    }

    #[tokio::test]
    async fn test_read_rejects_truncated_head() {
        let mut reader: &[u8] = b"GET / HTTP/1.1\r\nHost: x\r\n";
        let result = RequestHead::read(&mut reader, 1024).await;
        assert!(result.unwrap_err().is_protocol_error());
    }

    #[test]
    fn test_routes() {
        let responder = responder();
        assert_eq!(responder.route("/"), Route::Dashboard);
        assert_eq!(responder.route("/index.html"), Route::Dashboard);
        assert_eq!(responder.route("/Dashboard.html"), Route::Dashboard);
        assert_eq!(responder.route("/favicon.ico"), Route::NoContent);
        assert_eq!(responder.route("/secret"), Route::NotFound);
    }

    #[tokio::test]
    async fn test_dashboard_response() {
        let (status, text) = respond(&responder(), "/").await;
        assert_eq!(status, 200);
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(text.contains("Content-Length: 13\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.contains("Access-Control-Allow-Origin: *\r\n"));
        assert!(text.ends_with("\r\n\r\n<h1>dash</h1>"));
    }

    #[tokio::test]
    async fn test_favicon_and_not_found() {
        let (status, text) = respond(&responder(), "/favicon.ico").await;
        assert_eq!(status, 204);
        assert!(text.contains("Content-Length: 0\r\n"));

        let (status, text) = respond(&responder(), "/nope").await;
        assert_eq!(status, 404);
        assert!(text.ends_with("404 Not Found"));
    }

    #[tokio::test]
    async fn test_missing_file_asset_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let responder = HttpResponder::new(DashboardAsset::file(dir.path().join("gone.html")), None);

        let (status, text) = respond(&responder, "/").await;
        assert_eq!(status, 500);
        assert!(text.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    }
}
