/* 📖 # Why does every reload go through the coordinator?

The server's own writes trigger the same file notifications as edits made in a text
editor. Treating them identically means there is exactly one code path that turns the
file into routes, so there is no "skip our own write" bookkeeping that could drift from
what is actually on disk. A reload after a self-write re-reads what was just saved and
publishes an equivalent table.
*/

/* 📖 # Why publish while still holding the store lock?

Two notifications can arrive close together. If the table were published after the lock
was released, the older rebuild could finish last and overwrite the newer table. Holding
the store lock until the new table is published keeps publications in the same order as
the reloads that produced them.
*/

use std::sync::Arc;

use bananadb_base::pal::FileChangeEvent;
use bananadb_base::{BananaResult, PalHandle};
use tracing::{debug, error, info, instrument, warn};

use crate::ids::IdGenerator;
use crate::routes::{LiveRoutes, RouteTable};
use crate::store::StoreHandle;

/// Rebuilds and republishes the route table whenever the backing file changes.
#[derive(Debug, Clone)]
pub struct ReloadCoordinator {
    store: StoreHandle,
    routes: LiveRoutes,
    ids: Arc<dyn IdGenerator>,
}

impl ReloadCoordinator {
    /// Create a coordinator whose initial table reflects the store's current document.
    pub fn new(store: StoreHandle, ids: Arc<dyn IdGenerator>) -> Self {
        let table = {
            let guard = store.lock();
            RouteTable::build(guard.current(), &store, &ids)
        };
        Self {
            store,
            routes: LiveRoutes::new(table),
            ids,
        }
    }

    /// The live route table this coordinator publishes to.
    pub fn routes(&self) -> LiveRoutes {
        self.routes.clone()
    }

    /// Re-read the file and publish a fresh route table.
    ///
    /// On error nothing is published and the previous table stays in effect.
    #[instrument(skip(self))]
    pub fn rebuild(&self, reason: &str) -> BananaResult<Arc<RouteTable>> {
        let mut store = self.store.lock();
        store.reload()?;
        let table = RouteTable::build(store.current(), &self.store, &self.ids);
        self.routes.publish(table);
        drop(store);

        let table = self.routes.current();
        log_endpoints(&table);
        info!("Reloaded routes due to: {reason}");
        Ok(table)
    }

    /// Entry point for file change notifications. Errors are logged, never propagated.
    pub fn on_file_change(&self, event: &FileChangeEvent) {
        debug!(files = ?event.changed_files, kind = ?event.kind, "database file changed");
        let reason = format!("file change ({:?})", event.kind).to_lowercase();
        if let Err(e) = self.rebuild(&reason) {
            error!("Failed to reload database: {e}");
            debug!("{e:?}");
        }
    }

    /// Subscribe to changes of the store's backing file.
    pub fn watch(&self, pal: &PalHandle) -> BananaResult<()> {
        let path = self.store.lock().path().clone();
        let coordinator = self.clone();
        pal.watch_file(
            &path,
            Box::new(move |event: FileChangeEvent| coordinator.on_file_change(&event)),
        )?;
        info!(path = %path, "Watching for changes");
        Ok(())
    }
}

/// Log every collection with its routes, or a hint when there are none.
pub fn log_endpoints(table: &RouteTable) {
    if table.is_empty() {
        warn!("No collections found. Add arrays to your JSON (e.g., {{ \"items\": [] }}).");
        return;
    }
    for endpoint in table.endpoints() {
        info!("  {:<7} {}", endpoint.method.as_str(), endpoint.path);
    }
}
