use std::time::Duration;

use bytes::Bytes;
use http::Version;
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use waypost::{Context, Error, HttpRequestHandler, Operation, Request, Response, RouteMethod, Server};

async fn list_items(_ctx: Context, _req: Request, res: Response) {
    res.json(r#"{"items":[]}"#);
}

async fn echo(_ctx: Context, req: Request, res: Response) {
    res.text(String::from_utf8_lossy(req.body()).into_owned());
}

async fn whoami(ctx: Context, _req: Request, res: Response) {
    res.text(ctx.url().as_str().to_owned());
}

struct Running {
    addr: std::net::SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<(), Error>>,
}

async fn start() -> Running {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();

    let app = HttpRequestHandler::new(vec![
        Operation::new(RouteMethod::Get, "/items", list_items),
        Operation::new(RouteMethod::Post, "/echo", echo),
        Operation::new(RouteMethod::Get, "/whoami", whoami),
    ]);
    let task = tokio::spawn(Server::serve_listener(listener, app, async {
        let _ = stopped.await;
    }));

    Running { addr, stop, task }
}

/// Writes one raw HTTP/1.1 request and reads until the server closes.
async fn exchange(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();

    let mut buf = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf))
        .await
        .expect("server did not close the connection")
        .unwrap();
    String::from_utf8(buf).unwrap()
}

async fn shut_down(server: Running) {
    server.stop.send(()).unwrap();
    server.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn serves_get_over_http1() {
    let server = start().await;

    let raw = exchange(
        server.addr,
        "GET /items HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"), "{raw}");
    assert!(raw.contains("content-type: application/json\r\n"), "{raw}");
    assert!(raw.ends_with("\r\n\r\n{\"items\":[]}"), "{raw}");

    shut_down(server).await;
}

#[tokio::test]
async fn head_keeps_headers_and_drops_body() {
    let server = start().await;

    let raw = exchange(
        server.addr,
        "HEAD /items HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"), "{raw}");
    assert!(raw.contains("content-length: 12\r\n"), "{raw}");
    assert!(raw.ends_with("\r\n\r\n"), "{raw}");

    shut_down(server).await;
}

#[tokio::test]
async fn passes_request_body_to_handler() {
    let server = start().await;

    let raw = exchange(
        server.addr,
        "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
    )
    .await;

    assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"), "{raw}");
    assert!(raw.ends_with("\r\n\r\nhello"), "{raw}");

    shut_down(server).await;
}

#[tokio::test]
async fn answers_routing_failures_with_status_codes() {
    let server = start().await;

    let raw = exchange(
        server.addr,
        "DELETE /items HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(raw.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"), "{raw}");
    assert!(raw.contains("allow: GET, HEAD, OPTIONS\r\n"), "{raw}");

    let raw = exchange(
        server.addr,
        "GET /favorites HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(raw.starts_with("HTTP/1.1 404 Not Found\r\n"), "{raw}");

    shut_down(server).await;
}

#[tokio::test]
async fn stops_accepting_after_shutdown() {
    let server = start().await;
    let addr = server.addr;

    shut_down(server).await;

    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn resolves_url_from_http2_pseudo_headers() {
    let server = start().await;

    let stream = TcpStream::connect(server.addr).await.unwrap();
    let (mut sender, conn) = hyper::client::conn::http2::handshake(TokioExecutor::new(), TokioIo::new(stream))
        .await
        .unwrap();
    let conn = tokio::spawn(conn);

    // h2c with prior knowledge: :scheme and :authority come from the URI.
    let req = http::Request::builder()
        .uri("http://catalog.example:8080/whoami?page=2")
        .body(Empty::<Bytes>::new())
        .unwrap();
    let res = sender.send_request(req).await.unwrap();

    assert_eq!(res.version(), Version::HTTP_2);
    assert_eq!(res.status(), http::StatusCode::OK);
    let body = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, "http://catalog.example:8080/whoami?page=2");

    drop(sender);
    conn.abort();
    shut_down(server).await;
}
