//! Per-request dispatch.
//!
//! [`HttpRequestHandler::handle_request`] turns one request into one response:
//!
//! ```text
//! method outside the modelled set ─────────────────────────────▶ 501
//! OPTIONS ─┬─ path unknown ─────────────────────────────────────▶ 404
//!          ├─ CORS preflight accepted ──────────────────────────▶ 204 + Access-Control-*
//!          └─ otherwise ────────────────────────────────────────▶ 204 + Allow
//! other ───┬─ no route for method (HEAD routes as GET) ─┬─ path unknown ▶ 404
//!          │                                            └─ path known ──▶ 405 + Allow
//!          └─ route found ─▶ simple CORS headers ─▶ handler ─┬─ ok ─────▶ handler's answer
//!                                                           └─ Err/panic ▶ 500 if unanswered
//! ```
//!
//! Nothing escapes `handle_request`: every outcome is a status code.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use futures_util::FutureExt;
use http::header::ALLOW;
use http::{HeaderValue, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::cors::{self, CorsPolicy};
use crate::error::{BoxError, Error};
use crate::handler::{BoxedHandler, Context, Handler};
use crate::method::{Method, RouteMethod};
use crate::request::{IncomingRequest, Request};
use crate::response::{OutgoingResponse, Response};
use crate::route::{PathMatcher, Route};
use crate::router::{Router, allow_header};

/// One registered operation: method, path template, handler, optional CORS policy.
pub struct Operation<Req = Request, Res = Response> {
    method: RouteMethod,
    path: String,
    handler: BoxedHandler<Req, Res>,
    cors: Option<CorsPolicy>,
}

impl<Req, Res> Operation<Req, Res> {
    /// Path parameters use `{name}` syntax; `ctx.arg("name")` retrieves them.
    ///
    /// ```rust
    /// use waypost::{Context, CorsPolicy, Operation, Request, Response, RouteMethod};
    ///
    /// async fn show_item(ctx: Context, _req: Request, res: Response) {
    ///     res.text(format!("item {}", ctx.arg("slug").unwrap_or_default()));
    /// }
    ///
    /// let op = Operation::new(RouteMethod::Get, "/items/{slug}", show_item)
    ///     .cors(CorsPolicy::new(["*"]));
    /// ```
    pub fn new(method: RouteMethod, path: impl Into<String>, handler: impl Handler<Req, Res>) -> Self {
        Self {
            method,
            path: path.into(),
            handler: handler.into_boxed_handler(),
            cors: None,
        }
    }

    pub fn cors(mut self, policy: CorsPolicy) -> Self {
        self.cors = Some(policy);
        self
    }

    pub fn method(&self) -> RouteMethod { self.method }
    pub fn path(&self) -> &str { &self.path }
}

/// The request dispatcher.
///
/// Built once from an ordered list of [`Operation`]s; registration order
/// decides precedence between overlapping templates (later wins). Share it
/// behind an `Arc` and call [`handle_request`](Self::handle_request)
/// concurrently; the router is built on first use and then only read.
pub struct HttpRequestHandler<Req = Request, Res = Response> {
    operations: Vec<Operation<Req, Res>>,
    router: OnceLock<Router<BoxedHandler<Req, Res>>>,
}

impl<Req, Res> HttpRequestHandler<Req, Res> {
    pub fn new(operations: Vec<Operation<Req, Res>>) -> Self {
        Self {
            operations,
            router: OnceLock::new(),
        }
    }

    pub fn operations(&self) -> &[Operation<Req, Res>] {
        &self.operations
    }

    /// The routing table, built from the operations on first call.
    pub fn router(&self) -> &Router<BoxedHandler<Req, Res>> {
        self.router.get_or_init(|| {
            Router::new(
                self.operations
                    .iter()
                    .map(|op| {
                        Route::new(op.method, op.path.clone(), Arc::clone(&op.handler), op.cors.clone())
                    })
                    .collect(),
            )
        })
    }

    /// Compiles every path template and reports the first malformed one.
    ///
    /// Dispatch never calls this: a route with a malformed template simply
    /// never matches. Call it from a test or at startup to catch typos.
    pub fn validate(&self) -> Result<(), Error> {
        for op in &self.operations {
            PathMatcher::compile(&op.path)?;
        }
        Ok(())
    }
}

impl<Req, Res> HttpRequestHandler<Req, Res>
where
    Req: IncomingRequest + Send + 'static,
    Res: OutgoingResponse + Clone + Send + 'static,
{
    /// Routes one request and writes its response through `res`.
    ///
    /// Returns once the response is complete: immediately for 404/405/501
    /// and `OPTIONS`, or after the matched handler's future resolves.
    pub async fn handle_request(&self, req: Req, res: Res) {
        let method = match req.method().parse::<Method>() {
            Ok(method) => method,
            Err(e) => {
                debug!("{e}");
                finish(&res, StatusCode::NOT_IMPLEMENTED);
                return;
            }
        };

        let url = match resolve_url(&req) {
            Ok(url) => url,
            Err(e) => {
                debug!(raw_path = req.raw_path(), "unresolvable request URL: {e}");
                finish(&res, StatusCode::NOT_FOUND);
                return;
            }
        };

        let router = self.router();

        if method == Method::Options {
            let Some(allowed) = router.list_methods_for_path(url.path()) else {
                debug!(path = url.path(), "OPTIONS for unknown path");
                finish(&res, StatusCode::NOT_FOUND);
                return;
            };
            if self.preflight(&req, url.path(), &res) {
                return;
            }
            set_allow(&res, &allowed);
            finish(&res, StatusCode::NO_CONTENT);
            return;
        }

        let Some(found) = routing_method(method).and_then(|m| router.find(m, url.path())) else {
            match router.list_methods_for_path(url.path()) {
                None => {
                    debug!(%method, path = url.path(), "no route");
                    finish(&res, StatusCode::NOT_FOUND);
                }
                Some(allowed) => {
                    debug!(%method, path = url.path(), "method not allowed");
                    set_allow(&res, &allowed);
                    finish(&res, StatusCode::METHOD_NOT_ALLOWED);
                }
            }
            return;
        };

        if let (Some(origin), Some(policy)) = (req.header("origin"), found.route.enabled_cors()) {
            cors::apply_simple(policy, origin, &res);
        }

        let handler = Arc::clone(found.route.handler());
        let ctx = Context::new(found.args, url);
        invoke(&handler, ctx, req, res).await;
    }

    /// Answers a CORS preflight if the request is one and the target route
    /// accepts it. `false` means nothing was written.
    fn preflight(&self, req: &Req, path: &str, res: &Res) -> bool {
        let (Some(origin), Some(requested)) =
            (req.header("origin"), req.header("access-control-request-method"))
        else {
            return false;
        };

        let Ok(requested) = requested.trim().parse::<Method>() else {
            debug!(requested, "preflight for unsupported method");
            return false;
        };

        let Some(found) = routing_method(requested).and_then(|m| self.router().find(m, path)) else {
            debug!(%requested, path, "preflight for method without route");
            return false;
        };

        let Some(policy) = found.route.enabled_cors() else {
            debug!(%requested, path, "preflight for route without CORS");
            return false;
        };

        cors::apply_preflight(
            policy,
            requested,
            origin,
            req.header("access-control-request-headers"),
            res,
        )
    }
}

/// Runs the handler, turning an `Err` or a panic into `500` unless the
/// handler already ended the response.
async fn invoke<Req, Res>(handler: &BoxedHandler<Req, Res>, ctx: Context, req: Req, res: Res)
where
    Res: OutgoingResponse + Clone,
{
    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| handler.call(ctx, req, res.clone()))) {
        Ok(fut) => AssertUnwindSafe(fut)
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(panic_error(payload))),
        Err(payload) => Err(panic_error(payload)),
    };

    if let Err(e) = outcome {
        if res.is_finished() {
            warn!("handler failed after responding: {e}");
        } else {
            warn!("handler failed: {e}");
            finish(&res, StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}

fn panic_error(payload: Box<dyn Any + Send>) -> BoxError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_owned());
    format!("handler panicked: {message}").into()
}

/// The routable method a request method is served by. `HEAD` is served by
/// `GET` routes; `OPTIONS` is never routed.
fn routing_method(method: Method) -> Option<RouteMethod> {
    match method {
        Method::Head => Some(RouteMethod::Get),
        other => RouteMethod::try_from(other).ok(),
    }
}

/// Scheme and authority come from the request when it declares them,
/// otherwise from the connection (TLS or not) and the `Host` header.
fn resolve_url<Req: IncomingRequest>(req: &Req) -> Result<Url, url::ParseError> {
    let scheme = req
        .scheme()
        .unwrap_or(if req.is_encrypted() { "https" } else { "http" });
    let authority = req
        .authority()
        .or_else(|| req.header("host"))
        .unwrap_or("localhost");

    let mut url = Url::parse(&format!("{scheme}://{authority}"))
        .or_else(|_| Url::parse(&format!("{scheme}://localhost")))?;

    let raw = req.raw_path();
    let (path, query) = match raw.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (raw, None),
    };
    if !path.starts_with('/') {
        return Err(url::ParseError::RelativeUrlWithoutBase);
    }
    url.set_path(path);
    url.set_query(query);
    Ok(url)
}

fn set_allow<Res: OutgoingResponse>(res: &Res, methods: &[Method]) {
    match HeaderValue::from_str(&allow_header(methods)) {
        Ok(value) => res.set_header(ALLOW, value),
        Err(e) => warn!("skipping invalid Allow header: {e}"),
    }
}

fn finish<Res: OutgoingResponse>(res: &Res, status: StatusCode) {
    res.set_status(status);
    res.end(Bytes::new());
}
