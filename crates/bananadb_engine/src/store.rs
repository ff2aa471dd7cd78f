/* 📖 # Why does the store own the document instead of re-reading the file per request?

Handlers work directly on one in-memory JSON object and write the whole object back after
every mutation. The file is only read at startup and when the watcher reports a change.
This keeps request handling cheap and means a half-written file can never be observed by
a request: either the previous document stays in memory or the new one replaces it whole.
*/

/* 📖 # Why are load() and reload() different?

At startup the server must come up no matter what the file contains, so load() falls back
to the default document and writes it out. A reload is triggered by an edit that may still
be in progress (an editor truncating before writing, a file briefly removed during an atomic
replace), so reload() reports read and parse failures instead and leaves the last good
document in place.
*/

use std::sync::Arc;

use bananadb_base::{BananaResult, FilePath, PalHandle, ResultExt};
use parking_lot::{Mutex, MutexGuard};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

/// The whole JSON document: a top-level object whose array-valued keys are collections.
pub type Document = Map<String, Value>;

/// Collection created when the backing file is missing or unusable.
pub const DEFAULT_COLLECTION: &str = "items";

/// The document used when the backing file is missing, empty or not an object.
pub fn default_document() -> Document {
    let mut document = Map::new();
    document.insert(DEFAULT_COLLECTION.to_string(), Value::Array(vec![]));
    document
}

/// Result of interpreting the raw bytes of the backing file.
enum FileContent {
    Object(Document),
    NotAnObject,
    Empty,
}

fn parse_file_content(bytes: &[u8]) -> BananaResult<FileContent> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(FileContent::Empty);
    }
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(document) => Ok(FileContent::Object(document)),
        _ => Ok(FileContent::NotAnObject),
    }
}

/// JSON document synchronized with a single file through the PAL.
#[derive(Debug)]
pub struct JsonFileStore {
    pal: PalHandle,
    path: FilePath,
    document: Document,
}

impl JsonFileStore {
    /// Open the store and [`load`](Self::load) the backing file.
    pub fn open(pal: PalHandle, path: FilePath) -> BananaResult<Self> {
        let mut store = Self {
            pal,
            path,
            document: default_document(),
        };
        store.load()?;
        Ok(store)
    }

    pub fn path(&self) -> &FilePath {
        &self.path
    }

    /// Read the backing file, falling back to the default document.
    ///
    /// A missing, unreadable, empty, malformed or non-object file is replaced by
    /// `{"items": []}`, which is written back immediately. Only a failure to write
    /// that default is returned as an error.
    #[instrument(skip(self), fields(path = %self.path))]
    pub fn load(&mut self) -> BananaResult<()> {
        let content = self
            .pal
            .read_file(&self.path)
            .and_then(|bytes| parse_file_content(&bytes));
        match content {
            Ok(FileContent::Object(document)) => {
                debug!(keys = document.len(), "document loaded");
                self.document = document;
                return Ok(());
            }
            Ok(FileContent::Empty) => info!("database file is empty, initializing"),
            Ok(FileContent::NotAnObject) => {
                warn!("database file does not contain a JSON object, initializing")
            }
            Err(e) => info!(reason = %e, "database file not usable, initializing"),
        }
        self.document = default_document();
        self.save()
            .with_context(|| format!("Failed to initialize {}", self.path))
    }

    /// Re-read the backing file after a change notification.
    ///
    /// Read and parse failures (including an empty or missing file) are returned and
    /// leave the in-memory document untouched. A file holding valid JSON that is not
    /// an object resets the in-memory document to the default without writing it.
    #[instrument(skip(self), fields(path = %self.path))]
    pub fn reload(&mut self) -> BananaResult<()> {
        let bytes = self
            .pal
            .read_file(&self.path)
            .with_context(|| format!("Failed to re-read {}", self.path))?;
        match parse_file_content(&bytes)
            .with_context(|| format!("Failed to parse {}", self.path))?
        {
            FileContent::Object(document) => {
                debug!(keys = document.len(), "document reloaded");
                self.document = document;
            }
            FileContent::NotAnObject => {
                warn!("database file no longer contains a JSON object, using default document");
                self.document = default_document();
            }
            FileContent::Empty => {
                bananadb_base::bail!("{} is empty", self.path);
            }
        }
        Ok(())
    }

    /// Write the in-memory document to the backing file, replacing its contents.
    #[instrument(skip(self), fields(path = %self.path))]
    pub fn save(&self) -> BananaResult<()> {
        let mut bytes = serde_json::to_vec_pretty(&self.document)?;
        bytes.push(b'\n');
        self.pal
            .write_file(&self.path, &bytes)
            .with_context(|| format!("Failed to save {}", self.path))
    }

    /// The live document.
    pub fn current(&self) -> &Document {
        &self.document
    }

    /// Mutable access to the live document. Callers must [`save`](Self::save) afterwards.
    pub fn current_mut(&mut self) -> &mut Document {
        &mut self.document
    }
}

/// A thread-safe handle to the document store.
///
/// Cloning is cheap (Arc). Whoever holds the lock has exclusive use of the document,
/// so a handler's mutate-then-save and a reload's read-then-replace never interleave.
#[derive(Debug, Clone)]
pub struct StoreHandle(Arc<Mutex<JsonFileStore>>);

impl StoreHandle {
    pub fn new(store: JsonFileStore) -> Self {
        Self(Arc::new(Mutex::new(store)))
    }

    /// Lock the store for exclusive access.
    pub fn lock(&self) -> MutexGuard<'_, JsonFileStore> {
        self.0.lock()
    }

    /// A copy of the current document.
    pub fn snapshot(&self) -> Document {
        self.0.lock().current().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bananadb_base::{MockPal, Pal};
    use expect_test::expect;
    use serde_json::json;

    fn db_path() -> FilePath {
        FilePath::from("db.json")
    }

    fn open_with(content: Option<&str>) -> (MockPal, BananaResult<JsonFileStore>) {
        let pal = MockPal::new();
        if let Some(content) = content {
            pal.add_file(db_path(), content.as_bytes().to_vec());
        }
        let store = JsonFileStore::open(PalHandle::new(pal.clone()), db_path());
        (pal, store)
    }

    #[test]
    fn test_load_existing_document() {
        let (pal, store) = open_with(Some(r#"{"users":[{"id":1}],"title":"x"}"#));
        let store = store.unwrap();

        assert_eq!(
            Value::Object(store.current().clone()),
            json!({"users": [{"id": 1}], "title": "x"})
        );
        // Untouched: a valid file is not rewritten on load.
        assert_eq!(
            pal.file_contents(&db_path()).unwrap(),
            r#"{"users":[{"id":1}],"title":"x"}"#
        );
    }

    #[test]
    fn test_load_missing_file_initializes_default() {
        let (pal, store) = open_with(None);
        let store = store.unwrap();

        assert_eq!(store.current(), &default_document());
        expect![[r#"
            {
              "items": []
            }
        "#]]
        .assert_eq(&pal.file_contents(&db_path()).unwrap());
    }

    #[test]
    fn test_load_falls_back_for_unusable_content() {
        for content in ["", "   \n", "{ broken", "[1,2,3]", "null", "42", "\"text\""] {
            let (pal, store) = open_with(Some(content));
            let store = store.unwrap();

            assert_eq!(store.current(), &default_document(), "content: {content:?}");
            assert!(pal.file_contents(&db_path()).unwrap().contains("\"items\""));
        }
    }

    #[test]
    fn test_load_reports_failure_to_persist_default() {
        let pal = MockPal::new();
        pal.fail_writes(true);

        let err = JsonFileStore::open(PalHandle::new(pal), db_path()).unwrap_err();
        assert!(err.to_string().contains("Failed to initialize db.json"));
    }

    #[test]
    fn test_save_preserves_key_order() {
        let (pal, store) = open_with(Some(r#"{"zeta":[{"name":"z","id":1}],"alpha":[]}"#));
        let mut store = store.unwrap();
        store
            .current_mut()
            .insert("middle".to_string(), json!("value"));

        store.save().unwrap();

        expect![[r#"
            {
              "zeta": [
                {
                  "name": "z",
                  "id": 1
                }
              ],
              "alpha": [],
              "middle": "value"
            }
        "#]]
        .assert_eq(&pal.file_contents(&db_path()).unwrap());
    }

    #[test]
    fn test_reload_replaces_document() {
        let (pal, store) = open_with(Some(r#"{"items":[]}"#));
        let mut store = store.unwrap();

        pal.add_file(db_path(), br#"{"posts":[{"id":"a"}]}"#.to_vec());
        store.reload().unwrap();

        assert_eq!(
            Value::Object(store.current().clone()),
            json!({"posts": [{"id": "a"}]})
        );
    }

    #[test]
    fn test_reload_keeps_previous_document_on_failure() {
        let (pal, store) = open_with(Some(r#"{"posts":[]}"#));
        let mut store = store.unwrap();

        pal.add_file(db_path(), b"{\"posts\": [".to_vec());
        let err = store.reload().unwrap_err();
        assert!(err.to_string().contains("Failed to parse db.json"));

        pal.add_file(db_path(), b"".to_vec());
        assert!(store.reload().unwrap_err().to_string().contains("is empty"));

        pal.remove_file(&db_path());
        assert!(store.reload().is_err());

        assert_eq!(Value::Object(store.current().clone()), json!({"posts": []}));
    }

    #[test]
    fn test_reload_non_object_resets_to_default_without_writing() {
        let (pal, store) = open_with(Some(r#"{"posts":[]}"#));
        let mut store = store.unwrap();

        pal.add_file(db_path(), b"[1,2]".to_vec());
        store.reload().unwrap();

        assert_eq!(store.current(), &default_document());
        assert_eq!(pal.file_contents(&db_path()).unwrap(), "[1,2]");
    }

    #[test]
    fn test_store_handle_shares_state() {
        let (pal, store) = open_with(Some(r#"{"items":[]}"#));
        let handle = StoreHandle::new(store.unwrap());
        let other = handle.clone();

        {
            let mut store = handle.lock();
            store
                .current_mut()
                .insert("extra".to_string(), json!([1]));
            store.save().unwrap();
        }

        assert_eq!(other.snapshot().get("extra"), Some(&json!([1])));
        assert!(pal.file_contents(&db_path()).unwrap().contains("extra"));
        assert!(pal.file_exists(&db_path()).unwrap());
    }
}
