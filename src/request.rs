//! Incoming HTTP request type and the capability the dispatcher reads from.

use bytes::Bytes;
use http::{HeaderMap, Uri};

/// What the dispatcher needs to know about an inbound request.
///
/// Implement this to drive [`HttpRequestHandler`](crate::HttpRequestHandler)
/// from a transport other than the bundled hyper [`Server`](crate::Server).
pub trait IncomingRequest {
    /// The method exactly as received, e.g. `"GET"`.
    fn method(&self) -> &str;

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    fn header(&self, name: &str) -> Option<&str>;

    /// Path plus query string as received, e.g. `/items?page=2`.
    fn raw_path(&self) -> &str;

    /// Scheme declared by the request itself (HTTP/2 `:scheme`, absolute-form URIs).
    fn scheme(&self) -> Option<&str>;

    /// Authority declared by the request itself (HTTP/2 `:authority`, absolute-form URIs).
    fn authority(&self) -> Option<&str>;

    /// Whether the connection was TLS-terminated by the transport.
    fn is_encrypted(&self) -> bool;
}

/// An incoming HTTP request with its body fully read.
#[derive(Debug)]
pub struct Request {
    method: http::Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    encrypted: bool,
}

impl Request {
    pub fn from_parts(parts: http::request::Parts, body: Bytes) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            encrypted: false,
        }
    }

    /// Marks the request as received over TLS.
    pub fn with_encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    pub fn method(&self) -> &http::Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }

    /// Raw body bytes. Never parsed by waypost.
    pub fn body(&self) -> &Bytes { &self.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::from_parts(parts, body)
    }
}

impl IncomingRequest for Request {
    fn method(&self) -> &str {
        self.method.as_str()
    }

    fn header(&self, name: &str) -> Option<&str> {
        Request::header(self, name)
    }

    fn raw_path(&self) -> &str {
        self.uri.path_and_query().map_or("/", |pq| pq.as_str())
    }

    fn scheme(&self) -> Option<&str> {
        self.uri.scheme_str()
    }

    fn authority(&self) -> Option<&str> {
        self.uri.authority().map(|a| a.as_str())
    }

    fn is_encrypted(&self) -> bool {
        self.encrypted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_origin_form_request() {
        let req: Request = http::Request::builder()
            .method("GET")
            .uri("/items?page=2")
            .header("Host", "shop.example")
            .header("Origin", "https://x.example")
            .body(Bytes::new())
            .unwrap()
            .into();

        assert_eq!(IncomingRequest::method(&req), "GET");
        assert_eq!(req.raw_path(), "/items?page=2");
        assert_eq!(req.header("origin"), Some("https://x.example"));
        assert_eq!(req.header("HOST"), Some("shop.example"));
        assert_eq!(req.scheme(), None);
        assert_eq!(req.authority(), None);
        assert!(!req.is_encrypted());
    }

    #[test]
    fn reads_absolute_form_request() {
        let req: Request = http::Request::builder()
            .uri("https://shop.example:8443/items")
            .body(Bytes::new())
            .unwrap()
            .into();

        assert_eq!(req.scheme(), Some("https"));
        assert_eq!(req.authority(), Some("shop.example:8443"));
        assert_eq!(req.raw_path(), "/items");
    }
}
