// End-to-end tests against a live server on an ephemeral port, driving
// raw sockets so the wire format itself is under test.

use std::fs;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::time::Duration;

use meerkat::{Config, Server};

// "alice:secret"
const BASIC_ALICE: &str = "Basic YWxpY2U6c2VjcmV0";

fn base_config(root: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.server.listening_ports = "127.0.0.1:0".to_string();
    cfg.server.num_threads = 2;
    cfg.server.request_timeout_ms = 5_000;
    cfg.web.document_root = root.to_string_lossy().into_owned();
    cfg.web.enable_directory_listing = true;
    cfg
}

fn start(root: &Path) -> (Server, SocketAddr) {
    let server = Server::start(&base_config(root)).expect("server starts");
    let addr = server.local_addrs()[0];
    (server, addr)
}

/// Server with PUT/DELETE/MKCOL enabled through a passwords file.
fn start_writable(root: &Path) -> (Server, SocketAddr) {
    let auth = root.join("passwords.txt");
    fs::write(&auth, "alice:secret\n").expect("write auth file");
    let mut cfg = base_config(root);
    cfg.auth.put_delete_auth_file = auth.to_string_lossy().into_owned();
    let server = Server::start(&cfg).expect("server starts");
    let addr = server.local_addrs()[0];
    (server, addr)
}

fn connect(addr: SocketAddr) -> TcpStream {
    let s = TcpStream::connect(addr).expect("connect");
    s.set_read_timeout(Some(Duration::from_secs(5))).expect("timeout");
    s
}

fn read_until_close(s: &mut TcpStream) -> String {
    let mut out = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match s.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => out.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Send one request and collect the whole response, relying on the
/// server closing the connection.
fn roundtrip(addr: SocketAddr, request: &str) -> String {
    let mut s = connect(addr);
    s.write_all(request.as_bytes()).expect("send");
    read_until_close(&mut s)
}

/// Read exactly one response off a keep-alive connection, framed by its
/// Content-Length header.
fn read_one_response(s: &mut TcpStream) -> String {
    let mut out = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(head_end) = find_blank_line(&out) {
            let head = String::from_utf8_lossy(&out[..head_end]).into_owned();
            let body_len = content_length(&head).expect("framed response");
            while out.len() < head_end + body_len {
                let n = s.read(&mut chunk).expect("body read");
                assert!(n > 0, "EOF inside response body");
                out.extend_from_slice(&chunk[..n]);
            }
            return String::from_utf8_lossy(&out[..head_end + body_len]).into_owned();
        }
        let n = s.read(&mut chunk).expect("head read");
        assert!(n > 0, "EOF inside response head");
        out.extend_from_slice(&chunk[..n]);
    }
}

fn find_blank_line(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn content_length(head: &str) -> Option<usize> {
    head.lines()
        .find_map(|l| l.strip_prefix("Content-Length:"))
        .and_then(|v| v.trim().parse().ok())
}

fn header<'a>(response: &'a str, name: &str) -> Option<&'a str> {
    response
        .lines()
        .take_while(|l| !l.is_empty())
        .find_map(|l| l.split_once(": ").filter(|(n, _)| n.eq_ignore_ascii_case(name)))
        .map(|(_, v)| v.trim())
}

#[test]
fn test_get_static_file() {
    let root = tempfile::tempdir().expect("tempdir");
    fs::write(root.path().join("hello.txt"), "hello world").expect("write");
    let (_server, addr) = start(root.path());

    let resp = roundtrip(
        addr,
        "GET /hello.txt HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n",
    );
    assert!(resp.starts_with("HTTP/1.1 200 OK\r\n"), "{resp}");
    assert_eq!(header(&resp, "Content-Length"), Some("11"));
    assert_eq!(header(&resp, "Content-Type"), Some("text/plain; charset=utf-8"));
    assert!(resp.ends_with("hello world"));
}

#[test]
fn test_missing_file_is_404() {
    let root = tempfile::tempdir().expect("tempdir");
    let (_server, addr) = start(root.path());

    let resp = roundtrip(
        addr,
        "GET /nope.txt HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n",
    );
    assert!(resp.starts_with("HTTP/1.1 404 Not Found\r\n"), "{resp}");
    assert!(resp.contains("Error 404: Not Found\nFile not found"));
}

#[test]
fn test_head_omits_body() {
    let root = tempfile::tempdir().expect("tempdir");
    fs::write(root.path().join("a.txt"), "body bytes").expect("write");
    let (_server, addr) = start(root.path());

    let resp = roundtrip(
        addr,
        "HEAD /a.txt HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n",
    );
    assert!(resp.starts_with("HTTP/1.1 200"), "{resp}");
    assert_eq!(header(&resp, "Content-Length"), Some("10"));
    assert!(resp.ends_with("\r\n\r\n"), "HEAD response carried a body: {resp}");
}

#[test]
fn test_keep_alive_serves_two_requests() {
    let root = tempfile::tempdir().expect("tempdir");
    fs::write(root.path().join("a.txt"), "first").expect("write");
    fs::write(root.path().join("b.txt"), "second").expect("write");
    let (_server, addr) = start(root.path());

    let mut s = connect(addr);
    s.write_all(b"GET /a.txt HTTP/1.1\r\nHost: t\r\n\r\n").expect("send");
    let first = read_one_response(&mut s);
    assert!(first.starts_with("HTTP/1.1 200"), "{first}");
    assert_eq!(header(&first, "Connection"), Some("keep-alive"));
    assert!(first.ends_with("first"));

    s.write_all(b"GET /b.txt HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n")
        .expect("send");
    let second = read_until_close(&mut s);
    assert!(second.starts_with("HTTP/1.1 200"), "{second}");
    assert!(second.ends_with("second"));
}

#[test]
fn test_pipelined_requests_in_one_write() {
    let root = tempfile::tempdir().expect("tempdir");
    fs::write(root.path().join("a.txt"), "first").expect("write");
    fs::write(root.path().join("b.txt"), "second").expect("write");
    let (_server, addr) = start(root.path());

    // Both heads arrive before the first response is composed, so the
    // second must survive the post-request buffer compaction.
    let mut s = connect(addr);
    s.write_all(
        b"GET /a.txt HTTP/1.1\r\nHost: t\r\n\r\n\
          GET /b.txt HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n",
    )
    .expect("send");
    let first = read_one_response(&mut s);
    assert!(first.starts_with("HTTP/1.1 200"), "{first}");
    assert_eq!(header(&first, "Connection"), Some("keep-alive"));
    assert!(first.ends_with("first"));
    let second = read_until_close(&mut s);
    assert!(second.starts_with("HTTP/1.1 200"), "{second}");
    assert!(second.ends_with("second"));
}

#[test]
fn test_oversized_head_is_413() {
    let root = tempfile::tempdir().expect("tempdir");
    let (_server, addr) = start(root.path());

    let mut s = connect(addr);
    let _ = s.write_all(b"GET / HTTP/1.1\r\n");
    let filler = format!("X-Filler: {}\r\n", "a".repeat(1000));
    for _ in 0..20 {
        // The server may respond and close before we finish writing.
        if s.write_all(filler.as_bytes()).is_err() {
            break;
        }
    }
    let resp = read_until_close(&mut s);
    assert!(resp.starts_with("HTTP/1.1 413"), "{resp}");
}

#[test]
fn test_garbage_request_is_400() {
    let root = tempfile::tempdir().expect("tempdir");
    let (_server, addr) = start(root.path());

    let mut s = connect(addr);
    s.write_all(b"\x16\x03\x01 not http\r\n\r\n").expect("send");
    let resp = read_until_close(&mut s);
    assert!(resp.starts_with("HTTP/1.1 400"), "{resp}");
}

#[test]
fn test_unsupported_version_is_505() {
    let root = tempfile::tempdir().expect("tempdir");
    let (_server, addr) = start(root.path());

    let resp = roundtrip(addr, "GET / HTTP/3.0\r\nHost: t\r\n\r\n");
    assert!(resp.starts_with("HTTP/1.1 505"), "{resp}");
}

#[test]
fn test_range_request() {
    let root = tempfile::tempdir().expect("tempdir");
    fs::write(root.path().join("r.txt"), "hello world").expect("write");
    let (_server, addr) = start(root.path());

    let resp = roundtrip(
        addr,
        "GET /r.txt HTTP/1.1\r\nHost: t\r\nRange: bytes=0-4\r\nConnection: close\r\n\r\n",
    );
    assert!(resp.starts_with("HTTP/1.1 206"), "{resp}");
    assert_eq!(header(&resp, "Content-Range"), Some("bytes 0-4/11"));
    assert_eq!(header(&resp, "Content-Length"), Some("5"));
    assert!(resp.ends_with("hello"));

    // An end past the file is clamped, not refused.
    let resp = roundtrip(
        addr,
        "GET /r.txt HTTP/1.1\r\nHost: t\r\nRange: bytes=6-999\r\nConnection: close\r\n\r\n",
    );
    assert!(resp.starts_with("HTTP/1.1 206"), "{resp}");
    assert_eq!(header(&resp, "Content-Range"), Some("bytes 6-10/11"));
    assert!(resp.ends_with("world"));
}

#[test]
fn test_conditional_get_returns_304() {
    let root = tempfile::tempdir().expect("tempdir");
    fs::write(root.path().join("c.txt"), "cacheable").expect("write");
    let (_server, addr) = start(root.path());

    let first = roundtrip(
        addr,
        "GET /c.txt HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n",
    );
    let etag = header(&first, "ETag").expect("etag present").to_string();

    let resp = roundtrip(
        addr,
        &format!("GET /c.txt HTTP/1.1\r\nHost: t\r\nIf-None-Match: {etag}\r\nConnection: close\r\n\r\n"),
    );
    assert!(resp.starts_with("HTTP/1.1 304"), "{resp}");
    assert!(resp.ends_with("\r\n\r\n"), "304 carried a body: {resp}");
}

#[test]
fn test_directory_listing() {
    let root = tempfile::tempdir().expect("tempdir");
    fs::create_dir(root.path().join("docs")).expect("mkdir");
    fs::write(root.path().join("docs/readme.txt"), "x").expect("write");
    fs::write(root.path().join("docs/.hidden"), "x").expect("write");
    let (_server, addr) = start(root.path());

    let resp = roundtrip(addr, "GET /docs/ HTTP/1.1\r\nHost: t\r\n\r\n");
    assert!(resp.starts_with("HTTP/1.1 200"), "{resp}");
    assert!(resp.contains("readme.txt"));
    assert!(!resp.contains(".hidden"));
}

#[test]
fn test_directory_without_slash_redirects() {
    let root = tempfile::tempdir().expect("tempdir");
    fs::create_dir(root.path().join("docs")).expect("mkdir");
    let (_server, addr) = start(root.path());

    let resp = roundtrip(
        addr,
        "GET /docs HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n",
    );
    assert!(resp.starts_with("HTTP/1.1 301"), "{resp}");
    assert_eq!(header(&resp, "Location"), Some("/docs/"));
}

#[test]
fn test_index_file_is_served_for_directory() {
    let root = tempfile::tempdir().expect("tempdir");
    fs::write(root.path().join("index.html"), "<h1>home</h1>").expect("write");
    let (_server, addr) = start(root.path());

    let resp = roundtrip(addr, "GET / HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n");
    assert!(resp.starts_with("HTTP/1.1 200"), "{resp}");
    assert_eq!(header(&resp, "Content-Type"), Some("text/html"));
    assert!(resp.ends_with("<h1>home</h1>"));
}

#[test]
fn test_put_requires_authorization() {
    let root = tempfile::tempdir().expect("tempdir");
    let (_server, addr) = start_writable(root.path());

    let resp = roundtrip(
        addr,
        "PUT /f.txt HTTP/1.1\r\nHost: t\r\nContent-Length: 2\r\nConnection: close\r\n\r\nhi",
    );
    assert!(resp.starts_with("HTTP/1.1 401"), "{resp}");
    assert!(header(&resp, "WWW-Authenticate").is_some_and(|v| v.contains("Basic")));
}

#[test]
fn test_put_then_get_round_trip() {
    let root = tempfile::tempdir().expect("tempdir");
    let (_server, addr) = start_writable(root.path());

    let resp = roundtrip(
        addr,
        &format!(
            "PUT /up.txt HTTP/1.1\r\nHost: t\r\nAuthorization: {BASIC_ALICE}\r\n\
             Content-Length: 8\r\nConnection: close\r\n\r\npayload\n"
        ),
    );
    assert!(resp.starts_with("HTTP/1.1 201"), "{resp}");

    let resp = roundtrip(
        addr,
        "GET /up.txt HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n",
    );
    assert!(resp.starts_with("HTTP/1.1 200"), "{resp}");
    assert!(resp.ends_with("payload\n"));

    // Overwriting an existing resource reports 200, not 201.
    let resp = roundtrip(
        addr,
        &format!(
            "PUT /up.txt HTTP/1.1\r\nHost: t\r\nAuthorization: {BASIC_ALICE}\r\n\
             Content-Length: 3\r\nConnection: close\r\n\r\nnew"
        ),
    );
    assert!(resp.starts_with("HTTP/1.1 200"), "{resp}");
}

#[test]
fn test_put_round_trip_at_chunk_boundaries() {
    let root = tempfile::tempdir().expect("tempdir");
    let (_server, addr) = start_writable(root.path());

    // Sizes straddling the 8 KiB streaming chunk, plus empty.
    for size in [0usize, 8191, 8192, 8193, 3 * 8192 + 7] {
        let mut s = connect(addr);
        let head = format!(
            "PUT /chunk-{size}.bin HTTP/1.1\r\nHost: t\r\nAuthorization: {BASIC_ALICE}\r\n\
             Content-Length: {size}\r\nConnection: close\r\n\r\n"
        );
        s.write_all(head.as_bytes()).expect("send head");
        s.write_all(&vec![b'x'; size]).expect("send body");
        let resp = read_until_close(&mut s);
        assert!(resp.starts_with("HTTP/1.1 201"), "size {size}: {resp}");

        let resp = roundtrip(
            addr,
            &format!("GET /chunk-{size}.bin HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n"),
        );
        assert!(resp.starts_with("HTTP/1.1 200"), "size {size}: {resp}");
        assert_eq!(
            header(&resp, "Content-Length"),
            Some(size.to_string().as_str()),
            "size {size}"
        );
        let body_start = resp.find("\r\n\r\n").expect("head end") + 4;
        let body = &resp[body_start..];
        assert_eq!(body.len(), size, "size {size}");
        assert!(body.bytes().all(|b| b == b'x'), "size {size}");
    }
}

#[test]
fn test_put_creates_parent_directories() {
    let root = tempfile::tempdir().expect("tempdir");
    let (_server, addr) = start_writable(root.path());

    let resp = roundtrip(
        addr,
        &format!(
            "PUT /a/b/c.txt HTTP/1.1\r\nHost: t\r\nAuthorization: {BASIC_ALICE}\r\n\
             Content-Length: 4\r\nConnection: close\r\n\r\ndeep"
        ),
    );
    assert!(resp.starts_with("HTTP/1.1 201"), "{resp}");
    let stored = fs::read_to_string(root.path().join("a/b/c.txt")).expect("stored");
    assert_eq!(stored, "deep");
}

#[test]
fn test_delete_removes_directory_tree() {
    let root = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(root.path().join("tree/sub")).expect("mkdir");
    fs::write(root.path().join("tree/sub/f.txt"), "x").expect("write");
    let (_server, addr) = start_writable(root.path());

    let resp = roundtrip(
        addr,
        &format!(
            "DELETE /tree HTTP/1.1\r\nHost: t\r\nAuthorization: {BASIC_ALICE}\r\n\
             Connection: close\r\n\r\n"
        ),
    );
    assert!(resp.starts_with("HTTP/1.1 204"), "{resp}");
    assert!(!root.path().join("tree").exists());

    let resp = roundtrip(
        addr,
        &format!(
            "DELETE /tree HTTP/1.1\r\nHost: t\r\nAuthorization: {BASIC_ALICE}\r\n\
             Connection: close\r\n\r\n"
        ),
    );
    assert!(resp.starts_with("HTTP/1.1 404"), "{resp}");
}

#[test]
fn test_mkcol_conflicts() {
    let root = tempfile::tempdir().expect("tempdir");
    let (_server, addr) = start_writable(root.path());

    let mkcol = |uri: &str| {
        roundtrip(
            addr,
            &format!(
                "MKCOL {uri} HTTP/1.1\r\nHost: t\r\nAuthorization: {BASIC_ALICE}\r\n\
                 Connection: close\r\n\r\n"
            ),
        )
    };
    assert!(mkcol("/col").starts_with("HTTP/1.1 201"));
    assert!(mkcol("/col").starts_with("HTTP/1.1 405"), "existing target");
    assert!(mkcol("/no/parent").starts_with("HTTP/1.1 409"), "missing parent");
}

#[test]
fn test_propfind_lists_children() {
    let root = tempfile::tempdir().expect("tempdir");
    fs::write(root.path().join("child.txt"), "x").expect("write");
    let (_server, addr) = start(root.path());

    let resp = roundtrip(addr, "PROPFIND / HTTP/1.1\r\nHost: t\r\nDepth: 1\r\n\r\n");
    assert!(resp.starts_with("HTTP/1.1 207"), "{resp}");
    assert!(resp.contains("d:multistatus"));
    assert!(resp.contains("child.txt"));

    let resp = roundtrip(addr, "PROPFIND / HTTP/1.1\r\nHost: t\r\nDepth: 0\r\n\r\n");
    assert!(resp.starts_with("HTTP/1.1 207"), "{resp}");
    assert!(!resp.contains("child.txt"));
}

#[test]
fn test_global_auth_challenges_reads() {
    let root = tempfile::tempdir().expect("tempdir");
    fs::write(root.path().join("secret.txt"), "s").expect("write");
    let auth = root.path().join("global.txt");
    fs::write(&auth, "alice:secret\n").expect("write auth");
    let mut cfg = base_config(root.path());
    cfg.auth.global_auth_file = auth.to_string_lossy().into_owned();
    let server = Server::start(&cfg).expect("server starts");
    let addr = server.local_addrs()[0];

    let resp = roundtrip(
        addr,
        "GET /secret.txt HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n",
    );
    assert!(resp.starts_with("HTTP/1.1 401"), "{resp}");

    let resp = roundtrip(
        addr,
        &format!(
            "GET /secret.txt HTTP/1.1\r\nHost: t\r\nAuthorization: {BASIC_ALICE}\r\n\
             Connection: close\r\n\r\n"
        ),
    );
    assert!(resp.starts_with("HTTP/1.1 200"), "{resp}");
}

#[test]
fn test_options_advertises_dav() {
    let root = tempfile::tempdir().expect("tempdir");
    let (_server, addr) = start(root.path());

    let resp = roundtrip(
        addr,
        "OPTIONS / HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n",
    );
    assert!(resp.starts_with("HTTP/1.1 200"), "{resp}");
    assert!(header(&resp, "Allow").is_some_and(|v| v.contains("PROPFIND")));
    assert_eq!(header(&resp, "DAV"), Some("1"));
}

#[test]
fn test_hidden_pattern_is_404() {
    let root = tempfile::tempdir().expect("tempdir");
    fs::write(root.path().join("app.conf"), "secret").expect("write");
    let mut cfg = base_config(root.path());
    cfg.web.hide_files_patterns = "**.conf$".to_string();
    let server = Server::start(&cfg).expect("server starts");
    let addr = server.local_addrs()[0];

    let resp = roundtrip(
        addr,
        "GET /app.conf HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n",
    );
    assert!(resp.starts_with("HTTP/1.1 404"), "{resp}");
}

#[test]
fn test_acl_denied_connection_is_dropped() {
    let root = tempfile::tempdir().expect("tempdir");
    fs::write(root.path().join("x.txt"), "x").expect("write");
    let mut cfg = base_config(root.path());
    cfg.access.access_control_list = "-0.0.0.0/0".to_string();
    let server = Server::start(&cfg).expect("server starts");
    let addr = server.local_addrs()[0];

    // The accept succeeds but the socket is closed without a response.
    let mut s = connect(addr);
    let _ = s.write_all(b"GET /x.txt HTTP/1.1\r\nHost: t\r\n\r\n");
    assert_eq!(read_until_close(&mut s), "");
}

#[test]
fn test_many_connections_over_small_pool() {
    let root = tempfile::tempdir().expect("tempdir");
    fs::write(root.path().join("x.txt"), "pool").expect("write");
    let (_server, addr) = start(root.path());

    let mut handles = Vec::new();
    for _ in 0..8 {
        handles.push(std::thread::spawn(move || {
            for _ in 0..5 {
                let resp = roundtrip(
                    addr,
                    "GET /x.txt HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n",
                );
                assert!(resp.starts_with("HTTP/1.1 200"), "{resp}");
                assert!(resp.ends_with("pool"));
            }
        }));
    }
    for h in handles {
        h.join().expect("client thread");
    }
}

#[test]
fn test_stop_is_clean_with_active_listeners() {
    let root = tempfile::tempdir().expect("tempdir");
    let (mut server, addr) = start(root.path());

    let resp = roundtrip(addr, "GET / HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n");
    assert!(resp.starts_with("HTTP/1.1"), "{resp}");

    server.stop();
    assert!(TcpStream::connect(addr).is_err() || {
        // The OS may still accept briefly; a subsequent read sees EOF.
        let mut s = connect(addr);
        let _ = s.write_all(b"GET / HTTP/1.1\r\nHost: t\r\n\r\n");
        read_until_close(&mut s).is_empty()
    });
}
