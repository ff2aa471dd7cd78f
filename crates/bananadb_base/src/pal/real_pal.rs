use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use notify::event::{EventKind, ModifyKind};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use crate::{BananaError, BananaResult};

use super::FilePath;
use super::http::{
    HttpMethod, HttpRequest, HttpResponse, HttpServerConfig, HttpServerHandle, HttpService,
    HttpStatusCode,
};
use super::traits::{FileChangeCallback, FileChangeEvent, FileChangeKind, Pal};

/* 📖 # Why watch the parent directory instead of the file itself?

Many editors save by writing a temporary file and renaming it over the original. A watch
on the file's inode would silently stop firing after the first such save. Watching the
containing directory non-recursively and filtering on the file name keeps notifications
coming for in-place writes, atomic replaces, deletions and re-creations alike.
*/

/// How long the HTTP worker waits for a request before re-checking the shutdown flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Concrete PAL implementation using the real filesystem, `notify` and `tiny_http`.
///
/// All file paths are resolved relative to a configured base directory.
#[derive(Debug)]
pub struct RealPal {
    base_dir: PathBuf,
    watchers: Mutex<Vec<RecommendedWatcher>>,
}

impl RealPal {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            watchers: Mutex::new(Vec::new()),
        }
    }

    /// Resolve a FilePath to a filesystem path below the base directory.
    fn resolve_path(&self, path: &FilePath) -> PathBuf {
        path.to_path(&self.base_dir)
    }
}

fn change_kind(kind: &EventKind) -> Option<FileChangeKind> {
    match kind {
        EventKind::Access(_) => None,
        EventKind::Create(_) => Some(FileChangeKind::Created),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(FileChangeKind::Modified),
        EventKind::Remove(_) => Some(FileChangeKind::Removed),
        EventKind::Any | EventKind::Other => Some(FileChangeKind::Other),
    }
}

impl Pal for RealPal {
    #[instrument(skip(self), fields(path = %path))]
    fn file_exists(&self, path: &FilePath) -> BananaResult<bool> {
        let resolved = self.resolve_path(path);
        let exists = resolved.is_file();
        debug!(exists, resolved = %resolved.display(), "checked file existence");
        Ok(exists)
    }

    #[instrument(skip(self), fields(path = %path))]
    fn read_file(&self, path: &FilePath) -> BananaResult<Vec<u8>> {
        let resolved = self.resolve_path(path);
        let contents = fs::read(&resolved).map_err(|e| {
            debug!(error = %e, "failed to read file");
            Box::new(BananaError::file(&resolved, e))
        })?;
        debug!(bytes = contents.len(), "file read");
        Ok(contents)
    }

    #[instrument(skip(self, contents), fields(path = %path, bytes = contents.len()))]
    fn write_file(&self, path: &FilePath, contents: &[u8]) -> BananaResult<()> {
        let resolved = self.resolve_path(path);
        fs::write(&resolved, contents).map_err(|e| {
            debug!(error = %e, "failed to write file");
            Box::new(BananaError::file(&resolved, e))
        })?;
        debug!("file written");
        Ok(())
    }

    #[instrument(skip(self, callback), fields(path = %path))]
    fn watch_file(&self, path: &FilePath, callback: FileChangeCallback) -> BananaResult<()> {
        let resolved = self.resolve_path(path);
        let file_name = resolved
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| crate::err!("Cannot watch {}: path has no file name", path))?;
        let directory = parent_or_current(&resolved);

        let watched_path = path.clone();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "file watcher reported an error");
                    return;
                }
            };
            let Some(kind) = change_kind(&event.kind) else {
                return;
            };
            let touches_file = event
                .paths
                .iter()
                .any(|changed| changed.file_name() == Some(file_name.as_os_str()));
            if touches_file {
                debug!(path = %watched_path, ?kind, "watched file changed");
                callback(FileChangeEvent {
                    changed_files: vec![watched_path.clone()],
                    kind,
                });
            }
        })
        .map_err(|e| crate::err!("Failed to create file watcher: {}", e))?;

        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|e| crate::err!("Failed to watch {}: {}", directory.display(), e))?;
        debug!(directory = %directory.display(), "watching directory");

        self.watchers.lock().push(watcher);
        Ok(())
    }

    #[instrument(skip(self, service), fields(address = %config.address()))]
    fn start_http_server(
        &self,
        service: Box<dyn HttpService>,
        config: HttpServerConfig,
    ) -> BananaResult<HttpServerHandle> {
        let server = tiny_http::Server::http(config.address())
            .map_err(|e| crate::err!("Failed to bind {}: {}", config.address(), e))?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .ok_or_else(|| crate::err!("Server at {} is not an IP socket", config.address()))?;

        let handle = HttpServerHandle::new(port);
        let shutdown = Arc::clone(handle.shutdown_flag());
        let server_name = config.server_name.clone();

        thread::Builder::new()
            .name(format!("http-{}", port))
            .spawn(move || serve_requests(server, service, shutdown, server_name))
            .map_err(|e| crate::err!("Failed to spawn HTTP worker thread: {}", e))?;

        debug!(port, "HTTP server started");
        Ok(handle)
    }
}

/// Serve requests one at a time until the shutdown flag is raised.
fn serve_requests(
    server: tiny_http::Server,
    service: Box<dyn HttpService>,
    shutdown: Arc<AtomicBool>,
    server_name: String,
) {
    while !shutdown.load(Ordering::SeqCst) {
        let mut request = match server.recv_timeout(ACCEPT_POLL_INTERVAL) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "failed to receive HTTP request");
                continue;
            }
        };
        let response = match HttpMethod::parse(request.method().as_str()) {
            Some(method) => {
                let mut http_request = HttpRequest::new(method, request.url());
                for header in request.headers() {
                    http_request
                        .headers_mut()
                        .insert(header.field.to_string(), header.value.to_string());
                }
                let mut body = Vec::new();
                if let Err(e) = request.as_reader().read_to_end(&mut body) {
                    warn!(error = %e, "failed to read request body");
                }
                respond_with(&*service, http_request.with_body(body))
            }
            None => HttpResponse::new(HttpStatusCode::MethodNotAllowed),
        };
        send_response(request, response, &server_name);
    }
    debug!("HTTP server stopped");
}

fn respond_with(service: &dyn HttpService, request: HttpRequest) -> HttpResponse {
    let method = request.method();
    let url = request.url().to_string();
    match service.handle_request(request) {
        Ok(response) => {
            debug!(%method, %url, status = response.status().as_u16(), "request handled");
            response
        }
        Err(e) => {
            warn!(%method, %url, error = %e, "HTTP service failed");
            HttpResponse::text(HttpStatusCode::ServiceError, e.to_string())
        }
    }
}

fn send_response(request: tiny_http::Request, response: HttpResponse, server_name: &str) {
    let status = response.status().as_u16();
    let mut headers = Vec::new();
    for (name, value) in response.headers().iter() {
        match tiny_http::Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            Ok(header) => headers.push(header),
            Err(()) => warn!(header = %name, "skipping invalid response header"),
        }
    }
    if let Ok(header) = tiny_http::Header::from_bytes(&b"Server"[..], server_name.as_bytes()) {
        headers.push(header);
    }

    let mut tiny_response =
        tiny_http::Response::from_data(response.into_body().into_bytes()).with_status_code(status);
    for header in headers {
        tiny_response = tiny_response.with_header(header);
    }
    if let Err(e) = request.respond(tiny_response) {
        warn!(error = %e, "failed to send HTTP response");
    }
}

/// Directory part of a path as given on the command line, `.` when there is none.
pub fn parent_or_current(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
