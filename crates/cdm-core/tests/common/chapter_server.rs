//! Minimal HTTP/1.1 server for chapter fetch tests.
//!
//! Serves `GET /<manga>/<chapter>` from a fixed table and answers 404 for
//! anything else. A chapter marked as stalled sends its headers and then
//! trickles one byte per 100ms, so only cancellation ends the transfer early.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct ChapterServerOptions {
    /// Paths (e.g. "/1/10") that stall instead of answering promptly.
    pub stalled: Vec<String>,
}

/// Starts the server in a background thread. `chapters` maps
/// `(manga, chapter)` to the body. Returns the base URL without a trailing
/// slash (e.g. "http://127.0.0.1:12345").
pub fn start(chapters: Vec<((i64, i64), Vec<u8>)>) -> String {
    start_with_options(chapters, ChapterServerOptions::default())
}

pub fn start_with_options(
    chapters: Vec<((i64, i64), Vec<u8>)>,
    opts: ChapterServerOptions,
) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let table: HashMap<String, Vec<u8>> = chapters
        .into_iter()
        .map(|((m, c), body)| (format!("/{}/{}", m, c), body))
        .collect();
    let table = Arc::new(table);
    let opts = Arc::new(opts);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let table = Arc::clone(&table);
            let opts = Arc::clone(&opts);
            thread::spawn(move || handle(stream, &table, &opts));
        }
    });
    format!("http://127.0.0.1:{}", port)
}

fn handle(mut stream: TcpStream, table: &HashMap<String, Vec<u8>>, opts: &ChapterServerOptions) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, path) = parse_request_line(request);
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }

    if opts.stalled.iter().any(|p| p == path) {
        let _ = stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000000\r\n\r\n");
        // Ends when the client hangs up or the write timeout trips.
        for _ in 0..600 {
            if stream.write_all(b"x").is_err() {
                return;
            }
            thread::sleep(Duration::from_millis(100));
        }
        return;
    }

    match table.get(path) {
        Some(body) => {
            let header = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", body.len());
            let _ = stream.write_all(header.as_bytes());
            let _ = stream.write_all(body);
        }
        None => {
            let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
        }
    }
}

/// Returns (method, path) from the request line.
fn parse_request_line(request: &str) -> (&str, &str) {
    let line = request.lines().next().unwrap_or("");
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("");
    (method, path)
}
