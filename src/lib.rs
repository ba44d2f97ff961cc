//! # waypost
//!
//! Method- and path-based request dispatch for HTTP servers, with CORS
//! negotiated per route.
//!
//! ## The contract
//!
//! You hand waypost an ordered list of operations, each a method, a path
//! template, a handler and optionally a CORS policy. Per request, waypost:
//!
//! - answers `501` for methods it does not model (`TRACE`, `CONNECT`, …)
//! - answers `404` when no route knows the path, `405` + `Allow` when the
//!   path is known but not for this method
//! - answers `OPTIONS` itself: a CORS preflight when the route accepts one,
//!   otherwise `204` + `Allow`
//! - serves `HEAD` with the `GET` handler
//! - attaches CORS headers for cross-origin requests the route allows
//! - turns a failing or panicking handler into `500`
//!
//! What it does not do: parse bodies, authenticate, time out, or cache.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use waypost::{Context, CorsPolicy, HttpRequestHandler, Operation, Request, Response, RouteMethod, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = HttpRequestHandler::new(vec![
//!         Operation::new(RouteMethod::Get, "/items/{slug}", get_item)
//!             .cors(CorsPolicy::new(["https://shop.example"])),
//!         Operation::new(RouteMethod::Post, "/items", create_item),
//!     ]);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn get_item(ctx: Context, _req: Request, res: Response) {
//!     let slug = ctx.arg("slug").unwrap_or("unknown");
//!     res.json(format!(r#"{{"slug":"{slug}"}}"#));
//! }
//!
//! async fn create_item(_ctx: Context, req: Request, res: Response) -> Result<(), std::io::Error> {
//!     if req.body().is_empty() {
//!         return Err(std::io::Error::other("empty body"));
//!     }
//!     res.set_status(http::StatusCode::CREATED);
//!     res.end(bytes::Bytes::new());
//!     Ok(())
//! }
//! ```
//!
//! The dispatcher is transport-agnostic: implement [`IncomingRequest`] and
//! [`OutgoingResponse`] to drive [`HttpRequestHandler`] from anything other
//! than the bundled hyper [`Server`].

mod cors;
mod dispatcher;
mod error;
mod handler;
mod method;
mod request;
mod response;
mod route;
mod router;
mod server;

pub use cors::{AllowedOrigin, CorsPolicy, apply_preflight, apply_simple, canonicalize_header_name};
pub use dispatcher::{HttpRequestHandler, Operation};
pub use error::{BoxError, Error};
pub use handler::{Context, Handler, IntoHandlerResult};
pub use method::{Method, RouteMethod, UnsupportedMethod};
pub use request::{IncomingRequest, Request};
pub use response::{OutgoingResponse, Response};
pub use route::{PathMatcher, Route};
pub use router::{PathArgs, RouteMatch, Router};
pub use server::Server;
