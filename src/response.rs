//! Outgoing HTTP response handle and the capability the dispatcher writes to.
//!
//! A [`Response`] is a cheap, cloneable handle. The dispatcher keeps one clone
//! and passes another to the handler, so after a failing handler it can still
//! tell whether an answer was already written and, if not, write a 500.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use http_body_util::Full;
use tracing::debug;

/// What the dispatcher needs to be able to do to an outgoing response.
pub trait OutgoingResponse {
    fn set_status(&self, status: StatusCode);

    /// Sets `name`, replacing any previous value.
    fn set_header(&self, name: HeaderName, value: HeaderValue);

    /// Finalizes the response with `body`. Later writes are ignored.
    fn end(&self, body: Bytes);

    /// Whether [`end`](Self::end) has been called.
    fn is_finished(&self) -> bool;
}

#[derive(Clone, Debug)]
struct Parts {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    finished: bool,
}

impl Default for Parts {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            finished: false,
        }
    }
}

/// An outgoing HTTP response under construction.
///
/// Defaults to `200 OK`, no headers, empty body.
///
/// ```rust
/// use waypost::Response;
/// use http::StatusCode;
///
/// let res = Response::new();
/// res.set_status(StatusCode::CREATED);
/// res.json(br#"{"id":42}"#.to_vec());
///
/// assert!(res.is_finished());
/// assert_eq!(res.header("content-type").as_deref(), Some("application/json"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct Response {
    inner: Arc<Mutex<Parts>>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    fn parts(&self) -> MutexGuard<'_, Parts> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> StatusCode {
        self.parts().status
    }

    pub fn set_status(&self, status: StatusCode) {
        let mut parts = self.parts();
        if parts.finished {
            debug!(%status, "status change after end ignored");
            return;
        }
        parts.status = status;
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.parts()
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    }

    pub fn headers(&self) -> HeaderMap {
        self.parts().headers.clone()
    }

    pub fn set_header(&self, name: HeaderName, value: HeaderValue) {
        let mut parts = self.parts();
        if parts.finished {
            debug!(header = %name, "header change after end ignored");
            return;
        }
        parts.headers.insert(name, value);
    }

    pub fn body(&self) -> Bytes {
        self.parts().body.clone()
    }

    pub fn end(&self, body: impl Into<Bytes>) {
        let mut parts = self.parts();
        if parts.finished {
            debug!("response already ended");
            return;
        }
        parts.body = body.into();
        parts.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.parts().finished
    }

    /// Ends with an `application/json` body.
    pub fn json(&self, body: impl Into<Bytes>) {
        self.send(HeaderValue::from_static("application/json"), body);
    }

    /// Ends with a `text/plain; charset=utf-8` body.
    pub fn text(&self, body: impl Into<String>) {
        self.send(
            HeaderValue::from_static("text/plain; charset=utf-8"),
            body.into(),
        );
    }

    fn send(&self, content_type: HeaderValue, body: impl Into<Bytes>) {
        self.set_header(CONTENT_TYPE, content_type);
        self.end(body);
    }

    /// Converts into an `http` response, taking the parts without copying
    /// when this is the last handle.
    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let parts = match Arc::try_unwrap(self.inner) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(PoisonError::into_inner),
            Err(shared) => shared.lock().unwrap_or_else(PoisonError::into_inner).clone(),
        };

        let mut res = http::Response::new(Full::new(parts.body));
        *res.status_mut() = parts.status;
        *res.headers_mut() = parts.headers;
        res
    }
}

impl OutgoingResponse for Response {
    fn set_status(&self, status: StatusCode) {
        Response::set_status(self, status);
    }

    fn set_header(&self, name: HeaderName, value: HeaderValue) {
        Response::set_header(self, name, value);
    }

    fn end(&self, body: Bytes) {
        Response::end(self, body);
    }

    fn is_finished(&self) -> bool {
        Response::is_finished(self)
    }
}
