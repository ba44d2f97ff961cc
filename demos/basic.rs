//! Minimal waypost example: a small item catalogue with per-route CORS.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/items
//!   curl -I http://localhost:3000/items/apples
//!   curl -i -X POST http://localhost:3000/items -d '{"slug":"pears"}'
//!   curl -i -X DELETE http://localhost:3000/items
//!   curl -i -X OPTIONS http://localhost:3000/items/apples \
//!        -H 'origin: https://shop.example' \
//!        -H 'access-control-request-method: PUT'

use bytes::Bytes;
use http::header::LOCATION;
use http::{HeaderValue, StatusCode};
use waypost::{Context, CorsPolicy, HttpRequestHandler, Operation, Request, Response, RouteMethod, Server};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let storefront = CorsPolicy::new(["https://shop.example"])
        .credentials_supported(true)
        .allowed_headers(["Content-Type"])
        .exposed_headers(["Location"])
        .max_age(600);

    let app = HttpRequestHandler::new(vec![
        Operation::new(RouteMethod::Get, "/items", list_items).cors(CorsPolicy::new(["*"])),
        Operation::new(RouteMethod::Post, "/items", create_item).cors(storefront.clone()),
        Operation::new(RouteMethod::Get, "/items/{slug}", show_item).cors(CorsPolicy::new(["*"])),
        Operation::new(RouteMethod::Put, "/items/{slug}", replace_item).cors(storefront),
    ]);

    if let Err(e) = app.validate() {
        eprintln!("invalid route table: {e}");
        return;
    }

    if let Err(e) = Server::bind("0.0.0.0:3000").serve(app).await {
        eprintln!("server error: {e}");
    }
}

// GET /items
async fn list_items(_ctx: Context, _req: Request, res: Response) {
    res.json(r#"{"items":["apples","strawberries"]}"#);
}

// GET /items/{slug}, also answers HEAD
async fn show_item(ctx: Context, _req: Request, res: Response) {
    let slug = ctx.arg("slug").unwrap_or_default();
    res.json(format!(r#"{{"slug":"{slug}"}}"#));
}

// POST /items
//
// An Err return becomes 500; a bad body is the client's fault, so answer 400 ourselves.
async fn create_item(_ctx: Context, req: Request, res: Response) -> Result<(), serde_json::Error> {
    let Ok(item) = serde_json::from_slice::<serde_json::Value>(req.body()) else {
        res.set_status(StatusCode::BAD_REQUEST);
        res.end(Bytes::new());
        return Ok(());
    };

    let slug = item["slug"].as_str().unwrap_or("unnamed");
    res.set_status(StatusCode::CREATED);
    if let Ok(location) = HeaderValue::from_str(&format!("/items/{slug}")) {
        res.set_header(LOCATION, location);
    }
    res.json(serde_json::to_vec(&item)?);
    Ok(())
}

// PUT /items/{slug} → 204 No Content
async fn replace_item(ctx: Context, _req: Request, res: Response) {
    tracing::info!(slug = ctx.arg("slug"), "replaced item");
    res.set_status(StatusCode::NO_CONTENT);
    res.end(Bytes::new());
}
