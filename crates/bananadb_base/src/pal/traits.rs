use std::sync::Arc;

use crate::BananaResult;

use super::file_path::FilePath;
use super::http::{HttpServerConfig, HttpServerHandle, HttpService};

/// What happened to a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    Created,
    Modified,
    Removed,
    Other,
}

/// File change event delivered to a watch callback.
#[derive(Debug, Clone)]
pub struct FileChangeEvent {
    /// List of file paths that changed.
    pub changed_files: Vec<FilePath>,
    pub kind: FileChangeKind,
}

/// Callback invoked when watched files change.
pub type FileChangeCallback = Box<dyn Fn(FileChangeEvent) + Send + Sync>;

/* 📖 # Why is Pal a trait instead of a struct?

BananaDB's engine needs exactly three things from the outside world: the contents of one
JSON file, a notification when that file changes, and a way to serve HTTP. Putting them
behind a trait lets every engine test run against MockPal, where file changes are
delivered on demand and requests are plain function calls.
*/

/// Platform Abstraction Layer (PAL) trait.
///
/// Two implementations are provided:
/// - `RealPal`: real filesystem, `notify` watcher and `tiny_http` server
/// - `MockPal`: in-memory implementation for testing
pub trait Pal: std::fmt::Debug + Send + Sync + 'static {
    /// Check if a file exists at the given path.
    fn file_exists(&self, path: &FilePath) -> BananaResult<bool>;

    /// Read the entire file.
    fn read_file(&self, path: &FilePath) -> BananaResult<Vec<u8>>;

    /// Read entire file contents as a UTF-8 string.
    fn read_file_to_string(&self, path: &FilePath) -> BananaResult<String> {
        let contents = self.read_file(path)?;
        String::from_utf8(contents).map_err(|_e| crate::err!("File is not valid UTF-8: {}", path))
    }

    /// Write the file, creating it or replacing its contents.
    fn write_file(&self, path: &FilePath, contents: &[u8]) -> BananaResult<()>;

    /// Watch a single file for changes.
    ///
    /// The callback fires for every creation, modification, removal or rename onto
    /// the path, including changes made through [`Pal::write_file`]. Delivery order
    /// and debouncing are not guaranteed. The watch lives as long as the PAL.
    fn watch_file(&self, path: &FilePath, callback: FileChangeCallback) -> BananaResult<()>;

    /// Start an HTTP server with the given service.
    ///
    /// Returns a handle to the running server. When the handle is dropped the server
    /// stops accepting new requests.
    fn start_http_server(
        &self,
        service: Box<dyn HttpService>,
        config: HttpServerConfig,
    ) -> BananaResult<HttpServerHandle>;
}

/// Handle to a PAL implementation, enabling shared ownership.
///
/// ```no_run
/// use bananadb_base::{RealPal, PalHandle};
///
/// let pal = PalHandle::new(RealPal::new(".".into()));
/// let pal_clone = pal.clone(); // Cheap clone, shares the same implementation
/// ```
#[derive(Debug, Clone)]
pub struct PalHandle(Arc<dyn Pal>);

impl PalHandle {
    pub fn new(pal: impl Pal + 'static) -> Self {
        Self(Arc::new(pal))
    }
}

impl std::ops::Deref for PalHandle {
    type Target = dyn Pal;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}
