use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use parking_lot::Mutex;

use crate::BananaError;
use crate::BananaResult;

use super::FilePath;
use super::http::{HttpRequest, HttpResponse, HttpServerConfig, HttpServerHandle, HttpService};
use super::traits::{FileChangeCallback, FileChangeEvent, FileChangeKind, Pal};

/* 📖 # Why does MockPal queue file change events instead of firing them?

A real watcher calls back on its own thread, after the write that caused the event has
returned. Calling the callback synchronously from write_file would instead re-enter the
engine while it still holds the document lock. MockPal therefore queues one event per
write and tests decide when to deliver them with deliver_file_changes(), which also lets
them observe the state between a write and its reload.
*/

type SharedCallback = Arc<dyn Fn(FileChangeEvent) + Send + Sync>;

/// In-memory PAL implementation for testing.
///
/// ```
/// use bananadb_base::{pal::MockPal, Pal, FilePath};
///
/// let mock = MockPal::new();
/// mock.add_file(FilePath::from("db.json"), br#"{"items":[]}"#.to_vec());
/// let content = mock.read_file_to_string(&FilePath::from("db.json")).unwrap();
/// assert_eq!(content, r#"{"items":[]}"#);
/// ```
#[derive(Debug, Clone)]
pub struct MockPal {
    inner: Arc<MockPalInner>,
}

#[derive(Default)]
struct MockPalInner {
    files: Mutex<HashMap<FilePath, Vec<u8>>>,
    watchers: Mutex<Vec<(FilePath, SharedCallback)>>,
    pending_changes: Mutex<Vec<FileChangeEvent>>,
    http_servers: Mutex<HashMap<u16, Arc<dyn HttpService>>>,
    occupied_ports: Mutex<HashSet<u16>>,
    fail_writes: AtomicBool,
    next_port: AtomicU16,
}

impl std::fmt::Debug for MockPalInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPalInner")
            .field("files", &self.files.lock().len())
            .field("watchers", &self.watchers.lock().len())
            .field("pending_changes", &self.pending_changes.lock().len())
            .finish()
    }
}

impl MockPal {
    pub fn new() -> Self {
        let inner = MockPalInner::default();
        inner.next_port.store(10000, Ordering::SeqCst);
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Add or replace a file, as an external editor would.
    ///
    /// Queues a change notification if the file is being watched.
    pub fn add_file(&self, path: FilePath, content: Vec<u8>) {
        let existed = self.inner.files.lock().insert(path.clone(), content).is_some();
        let kind = if existed {
            FileChangeKind::Modified
        } else {
            FileChangeKind::Created
        };
        self.queue_change(path, kind);
    }

    /// Remove a file, as an external process would.
    pub fn remove_file(&self, path: &FilePath) {
        if self.inner.files.lock().remove(path).is_some() {
            self.queue_change(path.clone(), FileChangeKind::Removed);
        }
    }

    /// Current contents of a file as a string, if present and valid UTF-8.
    pub fn file_contents(&self, path: &FilePath) -> Option<String> {
        self.inner
            .files
            .lock()
            .get(path)
            .and_then(|bytes| String::from_utf8(bytes.clone()).ok())
    }

    /// Make every subsequent write_file call fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Pretend another process is listening on the given port.
    pub fn occupy_port(&self, port: u16) {
        self.inner.occupied_ports.lock().insert(port);
    }

    /// Number of change notifications waiting to be delivered.
    pub fn pending_change_count(&self) -> usize {
        self.inner.pending_changes.lock().len()
    }

    /// Deliver all queued change notifications to their watchers.
    ///
    /// Returns the number of callback invocations.
    pub fn deliver_file_changes(&self) -> usize {
        let events: Vec<FileChangeEvent> = std::mem::take(&mut *self.inner.pending_changes.lock());
        let mut delivered = 0;
        for event in events {
            let callbacks: Vec<SharedCallback> = self
                .inner
                .watchers
                .lock()
                .iter()
                .filter(|(path, _)| event.changed_files.contains(path))
                .map(|(_, callback)| Arc::clone(callback))
                .collect();
            for callback in callbacks {
                callback(event.clone());
                delivered += 1;
            }
        }
        delivered
    }

    /// Simulate an HTTP request to a running server.
    pub fn simulate_request(&self, port: u16, request: HttpRequest) -> BananaResult<HttpResponse> {
        let service = self
            .inner
            .http_servers
            .lock()
            .get(&port)
            .cloned()
            .ok_or_else(|| crate::err!("No HTTP server registered on port {}", port))?;
        service.handle_request(request)
    }

    /// Get the number of registered HTTP servers.
    pub fn http_server_count(&self) -> usize {
        self.inner.http_servers.lock().len()
    }

    fn queue_change(&self, path: FilePath, kind: FileChangeKind) {
        let watched = self
            .inner
            .watchers
            .lock()
            .iter()
            .any(|(watched, _)| watched == &path);
        if watched {
            self.inner.pending_changes.lock().push(FileChangeEvent {
                changed_files: vec![path],
                kind,
            });
        }
    }
}

impl Default for MockPal {
    fn default() -> Self {
        Self::new()
    }
}

impl Pal for MockPal {
    fn file_exists(&self, path: &FilePath) -> BananaResult<bool> {
        Ok(self.inner.files.lock().contains_key(path))
    }

    fn read_file(&self, path: &FilePath) -> BananaResult<Vec<u8>> {
        self.inner.files.lock().get(path).cloned().ok_or_else(|| {
            Box::new(BananaError::file(
                path.as_path(),
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ),
            ))
        })
    }

    fn write_file(&self, path: &FilePath, contents: &[u8]) -> BananaResult<()> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(Box::new(BananaError::file(
                path.as_path(),
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "write rejected"),
            )));
        }
        self.add_file(path.clone(), contents.to_vec());
        Ok(())
    }

    fn watch_file(&self, path: &FilePath, callback: FileChangeCallback) -> BananaResult<()> {
        self.inner
            .watchers
            .lock()
            .push((path.clone(), Arc::from(callback)));
        Ok(())
    }

    fn start_http_server(
        &self,
        service: Box<dyn HttpService>,
        config: HttpServerConfig,
    ) -> BananaResult<HttpServerHandle> {
        let port = match config.port {
            Some(p) => p,
            None => self.inner.next_port.fetch_add(1, Ordering::SeqCst),
        };

        if self.inner.occupied_ports.lock().contains(&port) {
            crate::bail!("Failed to bind {}:{}: address in use", config.host, port);
        }

        let mut servers = self.inner.http_servers.lock();
        if servers.contains_key(&port) {
            crate::bail!("Failed to bind {}:{}: address in use", config.host, port);
        }
        servers.insert(port, Arc::from(service));

        Ok(HttpServerHandle::new(port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pal::http::{HttpMethod, HttpStatusCode};
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_read_write_roundtrip() {
        let pal = MockPal::new();
        let path = FilePath::from("db.json");

        assert!(!pal.file_exists(&path).unwrap());
        pal.write_file(&path, b"{\"items\":[]}").unwrap();

        assert!(pal.file_exists(&path).unwrap());
        assert_eq!(pal.read_file_to_string(&path).unwrap(), "{\"items\":[]}");
    }

    #[test]
    fn test_read_file_not_found() {
        let pal = MockPal::new();
        assert!(pal.read_file(&FilePath::from("missing.json")).is_err());
    }

    #[test]
    fn test_fail_writes() {
        let pal = MockPal::new();
        let path = FilePath::from("db.json");
        pal.fail_writes(true);

        let err = pal.write_file(&path, b"{}").unwrap_err();
        assert!(err.to_string().contains("write rejected"));
        assert!(!pal.file_exists(&path).unwrap());

        pal.fail_writes(false);
        pal.write_file(&path, b"{}").unwrap();
        assert!(pal.file_exists(&path).unwrap());
    }

    #[test]
    fn test_changes_are_queued_until_delivered() {
        let pal = MockPal::new();
        let path = FilePath::from("db.json");
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);

        pal.watch_file(
            &path,
            Box::new(move |event| {
                assert_eq!(event.changed_files, vec![FilePath::from("db.json")]);
                calls_clone.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        pal.write_file(&path, b"{}").unwrap();
        pal.add_file(path.clone(), b"{\"a\":[]}".to_vec());
        assert_eq!(pal.pending_change_count(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(pal.deliver_file_changes(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(pal.pending_change_count(), 0);
    }

    #[test]
    fn test_unwatched_changes_are_not_queued() {
        let pal = MockPal::new();
        pal.watch_file(&FilePath::from("db.json"), Box::new(|_| {}))
            .unwrap();

        pal.write_file(&FilePath::from("other.json"), b"{}").unwrap();
        assert_eq!(pal.pending_change_count(), 0);
    }

    #[test]
    fn test_remove_file_queues_removal() {
        let pal = MockPal::new();
        let path = FilePath::from("db.json");
        pal.add_file(path.clone(), b"{}".to_vec());
        let kinds = Arc::new(Mutex::new(Vec::new()));
        let kinds_clone = Arc::clone(&kinds);
        pal.watch_file(
            &path,
            Box::new(move |event| kinds_clone.lock().push(event.kind)),
        )
        .unwrap();

        pal.remove_file(&path);
        pal.deliver_file_changes();

        assert_eq!(*kinds.lock(), vec![FileChangeKind::Removed]);
        assert!(!pal.file_exists(&path).unwrap());
    }

    #[derive(Debug)]
    struct EchoService;

    impl HttpService for EchoService {
        fn handle_request(&self, request: HttpRequest) -> BananaResult<HttpResponse> {
            Ok(HttpResponse::text(
                HttpStatusCode::Ok,
                format!("{} {}", request.method(), request.path()),
            ))
        }
    }

    #[test]
    fn test_start_http_server_auto_port() {
        let pal = MockPal::new();
        let handle = pal
            .start_http_server(Box::new(EchoService), HttpServerConfig::default())
            .unwrap();
        assert!(handle.port() >= 10000);
        assert_eq!(pal.http_server_count(), 1);
    }

    #[test]
    fn test_simulate_request() {
        let pal = MockPal::new();
        let config = HttpServerConfig::default().with_port(3000);
        pal.start_http_server(Box::new(EchoService), config).unwrap();

        let response = pal
            .simulate_request(3000, HttpRequest::new(HttpMethod::Get, "/items?x=1"))
            .unwrap();
        assert_eq!(response.body().as_string(), Some("GET /items".to_string()));

        assert!(
            pal.simulate_request(3001, HttpRequest::new(HttpMethod::Get, "/"))
                .is_err()
        );
    }

    #[test]
    fn test_occupied_port_fails_to_bind() {
        let pal = MockPal::new();
        pal.occupy_port(3000);
        let config = HttpServerConfig::default().with_port(3000);

        let err = pal
            .start_http_server(Box::new(EchoService), config.clone())
            .unwrap_err();
        assert!(err.to_string().contains("address in use"));

        pal.start_http_server(Box::new(EchoService), config.with_port(3001))
            .unwrap();
        assert!(
            pal.start_http_server(
                Box::new(EchoService),
                HttpServerConfig::default().with_port(3001)
            )
            .is_err()
        );
    }
}
