/* 📖 # Why is the route table replaced instead of updated?

Requests read the table on one thread while reloads rebuild it on another. A table that
is never modified after construction can be shared through an Arc without further
locking: a request clones the current Arc and keeps using that snapshot even if a new
table is published halfway through. The RwLock only guards the pointer swap itself.
*/

use std::collections::HashMap;
use std::sync::Arc;

use bananadb_base::BananaResult;
use bananadb_base::pal::http::{HttpMethod, HttpRequest, HttpResponse};
use parking_lot::RwLock;
use percent_encoding::percent_decode_str;
use tracing::debug;

use crate::api::json::{decode_object_body, route_not_found};
use crate::collection::CollectionHandlers;
use crate::discovery::discover_collections;
use crate::ids::IdGenerator;
use crate::store::{Document, StoreHandle};

/// A request path resolved against the collection naming scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePath {
    /// `/<collection>`
    Collection(String),
    /// `/<collection>/<id>`
    Item(String, String),
}

impl RoutePath {
    /// Parse a path (query string already removed).
    ///
    /// One trailing slash is ignored and segments are percent-decoded. Returns `None`
    /// for the root path, empty segments and paths with more than two segments.
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.strip_prefix('/').unwrap_or(path);
        let path = path.strip_suffix('/').unwrap_or(path);
        let mut segments = path.split('/');
        let collection = decode_segment(segments.next()?)?;
        let id = match segments.next() {
            None => return Some(RoutePath::Collection(collection)),
            Some(id) => decode_segment(id)?,
        };
        if segments.next().is_some() {
            return None;
        }
        Some(RoutePath::Item(collection, id))
    }
}

fn decode_segment(segment: &str) -> Option<String> {
    if segment.is_empty() {
        return None;
    }
    Some(percent_decode_str(segment).decode_utf8_lossy().into_owned())
}

/// One line of the endpoint listing, e.g. `GET /users/:id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub method: HttpMethod,
    pub path: String,
}

/// Immutable mapping from collection name to its handlers.
///
/// Names match case-insensitively. When two collections differ only in case, the one
/// that comes first in the document wins.
#[derive(Debug, Default)]
pub struct RouteTable {
    collections: Vec<CollectionHandlers>,
    // Keyed by lowercased name.
    by_name: HashMap<String, usize>,
}

impl RouteTable {
    /// Build handlers for every collection currently in `document`.
    pub fn build(document: &Document, store: &StoreHandle, ids: &Arc<dyn IdGenerator>) -> Self {
        let mut table = Self::default();
        for name in discover_collections(document) {
            table
                .by_name
                .entry(name.to_lowercase())
                .or_insert(table.collections.len());
            table
                .collections
                .push(CollectionHandlers::new(name, store.clone(), Arc::clone(ids)));
        }
        table
    }

    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.iter().map(CollectionHandlers::name)
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    pub fn handlers(&self, name: &str) -> Option<&CollectionHandlers> {
        self.by_name
            .get(&name.to_lowercase())
            .map(|&index| &self.collections[index])
    }

    /// The five routes of every collection, in collection order.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        let mut endpoints = Vec::with_capacity(self.collections.len() * 5);
        for name in self.collection_names() {
            for (method, suffix) in [
                (HttpMethod::Get, ""),
                (HttpMethod::Get, "/:id"),
                (HttpMethod::Post, ""),
                (HttpMethod::Patch, "/:id"),
                (HttpMethod::Delete, "/:id"),
            ] {
                endpoints.push(Endpoint {
                    method,
                    path: format!("/{name}{suffix}"),
                });
            }
        }
        endpoints
    }

    /// Route a request to the matching handler.
    ///
    /// HEAD is served like GET. Anything without a matching collection and method
    /// gets the route-not-found response.
    pub fn dispatch(&self, request: &HttpRequest) -> BananaResult<HttpResponse> {
        let Some(route) = RoutePath::parse(request.path()) else {
            return Ok(route_not_found());
        };
        let (name, id) = match &route {
            RoutePath::Collection(name) => (name, None),
            RoutePath::Item(name, id) => (name, Some(id.as_str())),
        };
        let Some(handlers) = self.handlers(name) else {
            debug!(collection = %name, "unknown collection");
            return Ok(route_not_found());
        };

        match (request.method(), id) {
            (HttpMethod::Get | HttpMethod::Head, None) => handlers.list(),
            (HttpMethod::Get | HttpMethod::Head, Some(id)) => handlers.get(id),
            (HttpMethod::Post, None) => match decode_object_body(request) {
                Ok(body) => handlers.create(body),
                Err(e) => Ok(e.into_response()),
            },
            (HttpMethod::Patch, Some(id)) => match decode_object_body(request) {
                Ok(body) => handlers.update(id, body),
                Err(e) => Ok(e.into_response()),
            },
            (HttpMethod::Delete, Some(id)) => handlers.delete(id),
            _ => Ok(route_not_found()),
        }
    }
}

/// The published route table, shared between the request path and the reload path.
#[derive(Debug, Clone)]
pub struct LiveRoutes(Arc<RwLock<Arc<RouteTable>>>);

impl LiveRoutes {
    pub fn new(table: RouteTable) -> Self {
        Self(Arc::new(RwLock::new(Arc::new(table))))
    }

    /// The table to use for one request.
    pub fn current(&self) -> Arc<RouteTable> {
        self.0.read().clone()
    }

    /// Replace the current table. Snapshots already handed out stay valid.
    pub fn publish(&self, table: RouteTable) {
        *self.0.write() = Arc::new(table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIdGenerator;
    use crate::store::JsonFileStore;
    use bananadb_base::pal::http::HttpStatusCode;
    use bananadb_base::{FilePath, MockPal, PalHandle};
    use expect_test::expect;

    fn setup(content: &str) -> (StoreHandle, Arc<dyn IdGenerator>, RouteTable) {
        let pal = MockPal::new();
        pal.add_file(FilePath::from("db.json"), content.as_bytes().to_vec());
        let store = StoreHandle::new(
            JsonFileStore::open(PalHandle::new(pal), FilePath::from("db.json")).unwrap(),
        );
        let ids: Arc<dyn IdGenerator> = Arc::new(SequentialIdGenerator::new("id"));
        let table = RouteTable::build(&store.snapshot(), &store, &ids);
        (store, ids, table)
    }

    fn status(table: &RouteTable, request: HttpRequest) -> u16 {
        table.dispatch(&request).unwrap().status().as_u16()
    }

    #[test]
    fn test_parse_route_path() {
        assert_eq!(
            RoutePath::parse("/users"),
            Some(RoutePath::Collection("users".to_string()))
        );
        assert_eq!(
            RoutePath::parse("/users/"),
            Some(RoutePath::Collection("users".to_string()))
        );
        assert_eq!(
            RoutePath::parse("/users/42"),
            Some(RoutePath::Item("users".to_string(), "42".to_string()))
        );
        assert_eq!(
            RoutePath::parse("/my%20list/a%2Fb"),
            Some(RoutePath::Item("my list".to_string(), "a/b".to_string()))
        );
        assert_eq!(RoutePath::parse("/"), None);
        assert_eq!(RoutePath::parse(""), None);
        assert_eq!(RoutePath::parse("/users//"), None);
        assert_eq!(RoutePath::parse("//1"), None);
        assert_eq!(RoutePath::parse("/users/1/extra"), None);
    }

    #[test]
    fn test_build_only_includes_arrays() {
        let (_store, _ids, table) = setup(r#"{"users":[],"title":"x","posts":[]}"#);

        assert_eq!(table.collection_names().collect::<Vec<_>>(), vec!["users", "posts"]);
        assert!(table.handlers("title").is_none());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_collection_names_match_ignoring_case() {
        let (_store, _ids, table) = setup(r#"{"items":[{"id":1}],"Tags":[],"tags":[]}"#);

        assert_eq!(table.handlers("ITEMS").map(CollectionHandlers::name), Some("items"));
        assert_eq!(table.handlers("tags").map(CollectionHandlers::name), Some("Tags"));
        assert_eq!(table.len(), 3);

        let response = table
            .dispatch(&HttpRequest::new(HttpMethod::Get, "/Items/1"))
            .unwrap();
        assert_eq!(response.status(), HttpStatusCode::Ok);
        assert_eq!(response.body().as_string().unwrap(), r#"{"id":1}"#);
        assert_eq!(status(&table, HttpRequest::new(HttpMethod::Get, "/ITEMS")), 200);
    }

    #[test]
    fn test_endpoints_listing() {
        let (_store, _ids, table) = setup(r#"{"users":[]}"#);

        let listing: Vec<String> = table
            .endpoints()
            .iter()
            .map(|e| format!("{} {}", e.method, e.path))
            .collect();
        expect![[r#"
            [
                "GET /users",
                "GET /users/:id",
                "POST /users",
                "PATCH /users/:id",
                "DELETE /users/:id",
            ]
        "#]]
        .assert_debug_eq(&listing);
    }

    #[test]
    fn test_dispatch_methods() {
        let (_store, _ids, table) = setup(r#"{"users":[{"id":1}]}"#);

        assert_eq!(status(&table, HttpRequest::new(HttpMethod::Get, "/users")), 200);
        assert_eq!(status(&table, HttpRequest::new(HttpMethod::Head, "/users")), 200);
        assert_eq!(status(&table, HttpRequest::new(HttpMethod::Get, "/users/1?x=y")), 200);
        assert_eq!(status(&table, HttpRequest::new(HttpMethod::Head, "/users/1")), 200);
        assert_eq!(
            status(&table, HttpRequest::new(HttpMethod::Post, "/users").with_json("{}")),
            201
        );
        assert_eq!(
            status(
                &table,
                HttpRequest::new(HttpMethod::Patch, "/users/1").with_json(r#"{"a":1}"#)
            ),
            200
        );
        assert_eq!(status(&table, HttpRequest::new(HttpMethod::Delete, "/users/1")), 204);
    }

    #[test]
    fn test_dispatch_unmatched_routes() {
        let (_store, _ids, table) = setup(r#"{"users":[{"id":1}]}"#);

        for request in [
            HttpRequest::new(HttpMethod::Get, "/"),
            HttpRequest::new(HttpMethod::Get, "/missing"),
            HttpRequest::new(HttpMethod::Put, "/users/1"),
            HttpRequest::new(HttpMethod::Delete, "/users"),
            HttpRequest::new(HttpMethod::Patch, "/users"),
            HttpRequest::new(HttpMethod::Post, "/users/1"),
            HttpRequest::new(HttpMethod::Options, "/users"),
            HttpRequest::new(HttpMethod::Get, "/users/1/2"),
        ] {
            let response = table.dispatch(&request).unwrap();
            assert_eq!(response.status(), HttpStatusCode::NotFound, "{request:?}");
            assert!(response.body().as_string().unwrap().contains("Route not found"));
        }
    }

    #[test]
    fn test_dispatch_rejects_bad_bodies() {
        let (store, _ids, table) = setup(r#"{"users":[{"id":1}]}"#);

        let malformed = HttpRequest::new(HttpMethod::Post, "/users").with_json("{\"a\":");
        assert_eq!(status(&table, malformed), 400);
        let array = HttpRequest::new(HttpMethod::Patch, "/users/1").with_json("[1]");
        assert_eq!(status(&table, array), 400);

        assert_eq!(store.snapshot()["users"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_live_routes_publish() {
        let (store, ids, table) = setup(r#"{"users":[]}"#);
        let live = LiveRoutes::new(table);

        let before = live.current();
        store
            .lock()
            .current_mut()
            .insert("posts".to_string(), serde_json::json!([]));
        live.publish(RouteTable::build(&store.snapshot(), &store, &ids));

        assert!(before.handlers("posts").is_none());
        assert!(live.current().handlers("posts").is_some());
    }
}
