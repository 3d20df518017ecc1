//! Read-only reference registry for the `/v2/` pull API.
//!
//! Serves manifests and blobs out of a data directory:
//! blobs live at `{data_dir}/blobs/{algorithm}/{hex}`, manifests at
//! `{data_dir}/repositories/{name}/manifests/{reference}` where `reference`
//! is a tag or a digest string. Only `GET` and `HEAD` are routed; content is
//! populated through [`Store::put_blob`] and [`Store::put_manifest`].
//!
//! The [`TestServer`] helper starts a server on a random port for integration testing.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tarpull_schema::{Digest, DigestAlgorithm};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tracing::{debug, info, warn};

/// File-backed manifest and blob store.
pub struct Store {
    data_dir: PathBuf,
}

impl Store {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn blob_path(&self, digest: &Digest) -> PathBuf {
        self.data_dir
            .join("blobs")
            .join(digest.algorithm().as_str())
            .join(digest.hex())
    }

    fn manifest_path(&self, name: &str, reference: &str) -> PathBuf {
        self.data_dir
            .join("repositories")
            .join(name)
            .join("manifests")
            .join(reference)
    }

    /// Store `data` under its sha256 digest.
    pub fn put_blob(&self, data: &[u8]) -> std::io::Result<Digest> {
        let digest = DigestAlgorithm::Sha256.hash(data);
        write_file(&self.blob_path(&digest), data)?;
        Ok(digest)
    }

    pub fn get_blob(&self, digest: &Digest) -> Option<Vec<u8>> {
        fs::read(self.blob_path(digest)).ok()
    }

    /// Store a manifest under `tag` and under its own digest, so list entries
    /// can point at it.
    pub fn put_manifest(&self, name: &str, tag: &str, body: &[u8]) -> std::io::Result<Digest> {
        let digest = DigestAlgorithm::Sha256.hash(body);
        write_file(&self.manifest_path(name, tag), body)?;
        write_file(&self.manifest_path(name, &digest.to_string()), body)?;
        Ok(digest)
    }

    pub fn get_manifest(&self, name: &str, reference: &str) -> Option<Vec<u8>> {
        fs::read(self.manifest_path(name, reference)).ok()
    }
}

fn write_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, data)
}

/// A parsed `/v2/` request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Base,
    Manifest { name: &'a str, reference: &'a str },
    Blob { name: &'a str, digest: &'a str },
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .split('/')
            .all(|seg| !seg.is_empty() && seg != "." && seg != "..")
}

fn valid_reference(reference: &str) -> bool {
    !reference.is_empty() && !reference.contains('/') && reference != "." && reference != ".."
}

/// Parse a request path into a [`Route`].
///
/// Repository names may contain slashes, so the last `/manifests/` or
/// `/blobs/` separator wins. Paths that could escape the data directory
/// are rejected.
pub fn parse_route(url: &str) -> Option<Route<'_>> {
    let path = url.split('?').next()?;
    let rest = path.strip_prefix("/v2")?;
    if rest.is_empty() || rest == "/" {
        return Some(Route::Base);
    }
    let rest = rest.strip_prefix('/')?;

    if let Some(idx) = rest.rfind("/manifests/") {
        let (name, reference) = (&rest[..idx], &rest[idx + "/manifests/".len()..]);
        if valid_name(name) && valid_reference(reference) {
            return Some(Route::Manifest { name, reference });
        }
    } else if let Some(idx) = rest.rfind("/blobs/") {
        let (name, digest) = (&rest[..idx], &rest[idx + "/blobs/".len()..]);
        if valid_name(name) && valid_reference(digest) {
            return Some(Route::Blob { name, digest });
        }
    }
    None
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    errors: [ErrorDetail<'a>; 1],
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: &'a str,
    detail: &'a str,
}

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name, value).ok()
}

fn respond(req: Request, response: Response<std::io::Cursor<Vec<u8>>>) {
    if let Err(e) = req.respond(response) {
        debug!("client went away: {e}");
    }
}

fn respond_err(req: Request, status: u16, code: &str, message: &str) {
    let detail = req.url().to_owned();
    let body = serde_json::to_vec(&ErrorBody {
        errors: [ErrorDetail {
            code,
            message,
            detail: &detail,
        }],
    })
    .unwrap_or_default();
    let mut response = Response::from_data(body).with_status_code(StatusCode(status));
    if let Some(h) = header("Content-Type", "application/json") {
        response.add_header(h);
    }
    respond(req, response);
}

/// `mediaType` of a stored manifest, for the `Content-Type` header.
fn manifest_media_type(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("mediaType")?.as_str().map(str::to_owned))
        .unwrap_or_else(|| "application/json".to_owned())
}

fn respond_content(req: Request, data: Vec<u8>, content_type: &str, digest: &Digest) {
    // Always send Content-Length; clients size archive members from it.
    let mut response = Response::from_data(data).with_chunked_threshold(usize::MAX);
    for h in [
        header("Content-Type", content_type),
        header("Docker-Content-Digest", &digest.to_string()),
    ]
    .into_iter()
    .flatten()
    {
        response.add_header(h);
    }
    // tiny_http drops the body for HEAD but keeps Content-Length.
    respond(req, response);
}

fn handle_manifest(store: &Store, req: Request, name: &str, reference: &str) {
    let Some(body) = store.get_manifest(name, reference) else {
        respond_err(req, 404, "MANIFEST_UNKNOWN", "manifest unknown");
        return;
    };
    let digest = reference
        .parse::<Digest>()
        .unwrap_or_else(|_| DigestAlgorithm::Sha256.hash(&body));
    let media_type = manifest_media_type(&body);
    info!("manifest {name}:{reference} ({media_type}, {} bytes)", body.len());
    respond_content(req, body, &media_type, &digest);
}

fn handle_blob(store: &Store, req: Request, name: &str, digest: &str) {
    let Ok(digest) = digest.parse::<Digest>() else {
        respond_err(req, 400, "DIGEST_INVALID", "invalid digest");
        return;
    };
    match store.get_blob(&digest) {
        Some(data) => {
            info!("blob {name}@{digest} ({} bytes)", data.len());
            respond_content(req, data, "application/octet-stream", &digest);
        }
        None => respond_err(req, 404, "BLOB_UNKNOWN", "blob unknown to registry"),
    }
}

/// Handle a single HTTP request, dispatching to the appropriate route handler.
pub fn handle_request(store: &Store, req: Request) {
    let method = req.method().clone();
    let url = req.url().to_owned();
    debug!("{method} {url}");

    if !matches!(method, Method::Get | Method::Head) {
        respond_err(req, 405, "UNSUPPORTED", "registry is read-only");
        return;
    }
    match parse_route(&url) {
        Some(Route::Base) => {
            let mut response = Response::from_string("{}");
            if let Some(h) = header("Docker-Distribution-API-Version", "registry/2.0") {
                response.add_header(h);
            }
            respond(req, response);
        }
        Some(Route::Manifest { name, reference }) => handle_manifest(store, req, name, reference),
        Some(Route::Blob { name, digest }) => handle_blob(store, req, name, digest),
        None => {
            warn!("unroutable path {url}");
            respond_err(req, 404, "NAME_UNKNOWN", "repository name not known to registry");
        }
    }
}

/// Start the server loop, blocking the current thread.
pub fn run_server(
    store: &Arc<Store>,
    addr: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let server = Server::http(addr)?;
    for request in server.incoming_requests() {
        handle_request(store, request);
    }
    Ok(())
}

/// A test helper that starts a tarpull-server on a random port in a background thread.
///
/// The server listens on `127.0.0.1:{port}` and serves data from the provided
/// `data_dir`. Dropping the `TestServer` stops the server.
pub struct TestServer {
    pub url: String,
    pub port: u16,
    pub store: Arc<Store>,
    server: Arc<Server>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl TestServer {
    /// Bind `127.0.0.1:0` and serve `data_dir`.
    pub fn start(data_dir: PathBuf) -> std::io::Result<Self> {
        fs::create_dir_all(&data_dir)?;
        let server = Server::http("127.0.0.1:0")
            .map(Arc::new)
            .map_err(std::io::Error::other)?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|a| a.port())
            .ok_or_else(|| std::io::Error::other("server is not bound to an IP address"))?;
        let url = format!("http://127.0.0.1:{port}");

        let store = Arc::new(Store::new(data_dir));
        let srv = Arc::clone(&server);
        let st = Arc::clone(&store);
        let handle = std::thread::spawn(move || {
            for request in srv.incoming_requests() {
                handle_request(&st, request);
            }
        });

        Ok(Self {
            url,
            port,
            store,
            server,
            handle: Some(handle),
        })
    }

    /// Registry host as passed on the command line, without the scheme.
    pub fn host(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
