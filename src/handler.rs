//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! Every [`Operation`](crate::Operation) carries a handler of its own concrete
//! type, yet the router keeps all routes in one `Vec`. Rust collections can
//! only hold one concrete type, so handlers are hidden behind a trait object
//! (`dyn ErasedHandler`) and stored uniformly.
//!
//! ```text
//! async fn show(ctx: Context, req: Request, res: Response) { … }   ← user writes this
//!        ↓ Operation::new(RouteMethod::Get, "/items/{slug}", show)
//! show.into_boxed_handler()                                       ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(show))                                       ← stored as BoxedHandler
//!        ↓
//! handler.call(ctx, req, res)  at request time                    ← one vtable dispatch
//!        ↓
//! Box::pin(async { show(ctx, req, res).await.into_handler_result() })
//! ```
//!
//! Handlers write their answer through the response handle they receive.
//! Their return value only says whether they succeeded: `()` or
//! `Result<(), E>` for any `E: Into<BoxError>`. An `Err` (or a panic) is
//! turned into `500 Internal Server Error` by the dispatcher.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use url::Url;

use crate::error::BoxError;
use crate::router::PathArgs;

/// Per-request data handed to a handler alongside the request and response.
#[derive(Clone, Debug)]
pub struct Context {
    args: PathArgs,
    url: Url,
}

impl Context {
    pub(crate) fn new(args: PathArgs, url: Url) -> Self {
        Self { args, url }
    }

    /// Values captured from the path template, in template order.
    pub fn args(&self) -> &PathArgs { &self.args }

    /// Shortcut for `ctx.args().get(name)`.
    ///
    /// For a route `/items/{slug}`, `ctx.arg("slug")` on `/items/apples` returns `Some("apples")`.
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args.get(name)
    }

    /// The resolved request URL. Only its path took part in routing.
    pub fn url(&self) -> &Url { &self.url }
}

// ── Handler outcome ──────────────────────────────────────────────────────────

/// Conversion of a handler's return value into success or failure.
pub trait IntoHandlerResult {
    fn into_handler_result(self) -> Result<(), BoxError>;
}

impl IntoHandlerResult for () {
    fn into_handler_result(self) -> Result<(), BoxError> { Ok(()) }
}

impl<E: Into<BoxError>> IntoHandlerResult for Result<(), E> {
    fn into_handler_result(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased handler future.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler<Req, Res> {
    fn call(&self, ctx: Context, req: Req, res: Res) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler<Req, Res> = Arc<dyn ErasedHandler<Req, Res> + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is satisfied by any `Fn` (usually an
/// `async fn`) with the shape:
///
/// ```text
/// async fn name(ctx: Context, req: Req, res: Res) -> () | Result<(), E>
/// ```
///
/// where `Req`/`Res` are the dispatcher's request and response types
/// ([`Request`](crate::Request) and [`Response`](crate::Response) by default).
///
/// The trait is sealed so only the blanket impl below can satisfy it.
pub trait Handler<Req, Res>: private::Sealed<Req, Res> + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler<Req, Res>;
}

mod private {
    pub trait Sealed<Req, Res> {}
}

impl<F, Fut, O, Req, Res> private::Sealed<Req, Res> for F
where
    F: Fn(Context, Req, Res) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
    O: IntoHandlerResult,
{
}

impl<F, Fut, O, Req, Res> Handler<Req, Res> for F
where
    F: Fn(Context, Req, Res) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
    O: IntoHandlerResult,
    Req: 'static,
    Res: 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler<Req, Res> {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Bridges a concrete handler `F` to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, O, Req, Res> ErasedHandler<Req, Res> for FnHandler<F>
where
    F: Fn(Context, Req, Res) -> Fut + Send + Sync,
    Fut: Future<Output = O> + Send + 'static,
    O: IntoHandlerResult,
{
    fn call(&self, ctx: Context, req: Req, res: Res) -> BoxFuture {
        let fut = (self.0)(ctx, req, res);
        Box::pin(async move { fut.await.into_handler_result() })
    }
}
