//! Per-connection request loop (spec.md §4.6).
//!
//! One task per accepted socket: read a request, run it through the
//! router, flush the buffered response, repeat until the peer disconnects,
//! the configured timeout elapses, or the negotiated `Connection` header
//! says to close. Mirrors the source's `handle_connection`/
//! `handle_connection_inner` split — an outer timeout wrapper around an
//! inner loop — but drives [`Request::read`]/[`Router::dispatch`] instead
//! of hand-parsing each line.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

use crate::config::Configuration;
use crate::error::TransportError;
use crate::request::{ParseOutcome, Request};
use crate::response::Response;
use crate::router::Router;

pub async fn handle(mut stream: TcpStream, peer: std::net::SocketAddr, local_addr: (String, u16), config: Arc<Configuration>, router: Arc<Router>) {
    let budget = Duration::from_secs(config.timeout_secs);

    loop {
        let outcome = match timeout(budget, Request::read(&mut stream, local_addr.clone())).await {
            Ok(outcome) => outcome,
            Err(_) => {
                println!("{peer}: request timed out after {}s, closing", config.timeout_secs);
                break;
            }
        };

        let mut req = match outcome {
            ParseOutcome::Parsed(req) => req,
            ParseOutcome::ConnectionClosed => {
                println!("{peer}: connection closed");
                break;
            }
            ParseOutcome::Malformed(err) => {
                eprintln!("{peer}: malformed request: {err}");
                write_parse_error(&mut stream, &config, &err).await;
                break;
            }
        };

        let mut res = Response::new(&req.version, &config.charset);
        let result = router.dispatch(&mut req, &mut res).await;
        println!("{peer}: {} {} {} -> {}", req.method, req.full_path, req.version, res.status_code());

        let wire = res.into_wire();
        if let Err(e) = stream.write_all(&wire).await {
            eprintln!("{peer}: {}", TransportError(e));
            break;
        }
        if let Err(e) = stream.flush().await {
            eprintln!("{peer}: {}", TransportError(e));
            break;
        }

        if result.terminate {
            break;
        }
    }
}

async fn write_parse_error(stream: &mut TcpStream, config: &Configuration, err: &crate::error::HttpError) {
    let mut res = Response::new("1.1", &config.charset);
    if res.status(err.code).is_ok() {
        let send_result = match &err.message {
            Some(message) => res.send_str(message),
            None => res.send(None),
        };
        if send_result.is_err() {
            return;
        }
    }
    let wire = res.into_wire();
    let _ = stream.write_all(&wire).await;
    let _ = stream.flush().await;
}
