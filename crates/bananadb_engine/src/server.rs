/* 📖 # Why probe following ports instead of failing on a busy port?

The server is usually started next to a frontend dev server or a second mock API, and
3000 is a popular default. Falling back to the next free port gets the user a running
mock immediately; the warning names the port actually used so the client can be pointed
at it. The probe is bounded so a misconfigured host fails quickly instead of scanning
the whole port range.
*/

use std::sync::Arc;

use bananadb_base::pal::http::{HttpServerConfig, HttpServerHandle};
use bananadb_base::{BananaResult, PalHandle, ResultExt};
use tracing::{debug, info, instrument, warn};

use crate::api::ApiService;
use crate::config::ServerConfig;
use crate::ids::{IdGenerator, NanoIdGenerator};
use crate::reload::{ReloadCoordinator, log_endpoints};
use crate::routes::LiveRoutes;
use crate::store::{JsonFileStore, StoreHandle};

/// How many ports after the configured one are tried before giving up.
pub const PORT_SEARCH_LIMIT: u16 = 20;

/// A started server. Dropping it stops the HTTP listener; the file watch stays registered
/// with the PAL.
#[derive(Debug)]
pub struct RunningServer {
    handle: HttpServerHandle,
    url: String,
    store: StoreHandle,
    coordinator: ReloadCoordinator,
}

impl RunningServer {
    /// Port actually bound, which may differ from the configured one.
    pub fn port(&self) -> u16 {
        self.handle.port()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn routes(&self) -> LiveRoutes {
        self.coordinator.routes()
    }

    pub fn coordinator(&self) -> &ReloadCoordinator {
        &self.coordinator
    }

    pub fn shutdown(&self) {
        self.handle.shutdown();
    }
}

/// Load the database, start watching it and serve it over HTTP.
pub fn start_server(pal: PalHandle, config: ServerConfig) -> BananaResult<RunningServer> {
    start_server_with_ids(pal, config, Arc::new(NanoIdGenerator::default()))
}

/// [`start_server`] with a custom source of string ids.
#[instrument(skip(pal, ids), fields(file = %config.file))]
pub fn start_server_with_ids(
    pal: PalHandle,
    config: ServerConfig,
    ids: Arc<dyn IdGenerator>,
) -> BananaResult<RunningServer> {
    let store = JsonFileStore::open(pal.clone(), config.file.clone())
        .with_context(|| format!("Failed to open database {}", config.file))?;
    let store = StoreHandle::new(store);

    let coordinator = ReloadCoordinator::new(store.clone(), ids);
    coordinator.watch(&pal)?;

    let service = ApiService::new(coordinator.routes(), config.enable_cors);
    let handle = bind_with_fallback(&pal, &service, &config)?;
    if handle.port() != config.port && config.port != 0 {
        warn!(
            "Port {} in use. Switched to {}.",
            config.port,
            handle.port()
        );
    }

    let url = format!("http://{}", handle.address(&config.host));
    info!("BananaDB running at {url}");
    info!("Database file: {}", config.file);
    log_endpoints(&coordinator.routes().current());

    Ok(RunningServer {
        handle,
        url,
        store,
        coordinator,
    })
}

fn bind_with_fallback(
    pal: &PalHandle,
    service: &ApiService,
    config: &ServerConfig,
) -> BananaResult<HttpServerHandle> {
    // Port 0 asks the OS for any free port, so there is nothing to probe.
    let attempts = if config.port == 0 { 0 } else { PORT_SEARCH_LIMIT };
    let mut last_error = None;
    for offset in 0..=attempts {
        let Some(port) = config.port.checked_add(offset) else {
            break;
        };
        let server_config = HttpServerConfig::new(config.host.as_str()).with_port(port);
        match pal.start_http_server(Box::new(service.clone()), server_config) {
            Ok(handle) => return Ok(handle),
            Err(e) => {
                debug!(port, "port unavailable: {e}");
                last_error = Some(e);
            }
        }
    }

    let message = format!(
        "Could not find a free port in {}..={}",
        config.port,
        config.port.saturating_add(attempts)
    );
    match last_error {
        Some(e) => Err(Box::new(e.context(message))),
        None => Err(bananadb_base::err!("{message}")),
    }
}
