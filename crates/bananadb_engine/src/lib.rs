/* 📖 # What does bananadb_engine do?

It turns a JSON file into a REST API. The store keeps the document in memory and in
sync with the file, discovery finds the array-valued keys, and every such key gets a
set of CRUD handlers in an immutable route table. The reload coordinator rebuilds that
table whenever the file changes, and the API service serves whichever table is current.
*/

pub mod api;
pub mod collection;
pub mod config;
pub mod discovery;
pub mod ids;
pub mod reload;
pub mod routes;
pub mod server;
pub mod store;

pub use api::ApiService;
pub use collection::CollectionHandlers;
pub use config::ServerConfig;
pub use discovery::discover_collections;
pub use ids::{IdGenerator, NanoIdGenerator, SequentialIdGenerator, assign_id};
pub use reload::ReloadCoordinator;
pub use routes::{LiveRoutes, RouteTable};
pub use server::{RunningServer, start_server, start_server_with_ids};
pub use store::{Document, JsonFileStore, StoreHandle, default_document};
