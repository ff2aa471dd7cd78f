/* 📖 # Why do handlers look the collection up again on every call?

A handler set is created for a collection name when the route table is built, but the
document behind it can be replaced by a reload at any moment. Holding on to the array
itself would mean writing into a document that is no longer live. Each call therefore
locks the store and fetches the array by name; if the collection disappeared in the
meantime the request is answered as an unknown route until the next table is published.
*/

use std::fmt;
use std::sync::Arc;

use bananadb_base::pal::http::{HttpResponse, HttpStatusCode};
use bananadb_base::{BananaResult, ResultExt};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::api::json::{json_response, not_found, route_not_found};
use crate::discovery::{collection_items, collection_items_mut};
use crate::ids::{ID_FIELD, IdGenerator, assign_id, id_matches};
use crate::store::StoreHandle;

/// The list, get, create, update and delete operations of one collection.
#[derive(Clone)]
pub struct CollectionHandlers {
    name: String,
    store: StoreHandle,
    ids: Arc<dyn IdGenerator>,
}

impl fmt::Debug for CollectionHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionHandlers")
            .field("name", &self.name)
            .finish()
    }
}

impl CollectionHandlers {
    pub fn new(name: impl Into<String>, store: StoreHandle, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            name: name.into(),
            store,
            ids,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `GET /<name>`: every item, in order.
    #[instrument(skip(self), fields(collection = %self.name))]
    pub fn list(&self) -> BananaResult<HttpResponse> {
        let store = self.store.lock();
        let Some(items) = collection_items(store.current(), &self.name) else {
            return Ok(route_not_found());
        };
        debug!(count = items.len(), "listing items");
        json_response(HttpStatusCode::Ok, items)
    }

    /// `GET /<name>/<id>`: the first item whose id matches.
    #[instrument(skip(self), fields(collection = %self.name))]
    pub fn get(&self, id: &str) -> BananaResult<HttpResponse> {
        let store = self.store.lock();
        let Some(items) = collection_items(store.current(), &self.name) else {
            return Ok(route_not_found());
        };
        match items.iter().find(|item| id_matches(item, id)) {
            Some(item) => json_response(HttpStatusCode::Ok, item),
            None => Ok(not_found()),
        }
    }

    /// `POST /<name>`: append `body` under a new id and persist.
    ///
    /// The stored item has `id` first, followed by the remaining body fields in order.
    #[instrument(skip(self, body), fields(collection = %self.name))]
    pub fn create(&self, body: Map<String, Value>) -> BananaResult<HttpResponse> {
        let mut store = self.store.lock();
        let Some(items) = collection_items_mut(store.current_mut(), &self.name) else {
            return Ok(route_not_found());
        };

        let id = assign_id(items, body.get(ID_FIELD), self.ids.as_ref());
        let mut item = Map::with_capacity(body.len() + 1);
        item.insert(ID_FIELD.to_string(), id);
        item.extend(body.into_iter().filter(|(key, _)| key != ID_FIELD));
        let item = Value::Object(item);
        items.push(item.clone());
        debug!(id = %item[ID_FIELD], "created item");

        store
            .save()
            .with_context(|| format!("Failed to persist new item in '{}'", self.name))?;
        json_response(HttpStatusCode::Created, &item)
    }

    /// `PATCH /<name>/<id>`: shallow-merge `body` into the first matching item and persist.
    #[instrument(skip(self, body), fields(collection = %self.name))]
    pub fn update(&self, id: &str, body: Map<String, Value>) -> BananaResult<HttpResponse> {
        let mut store = self.store.lock();
        let Some(items) = collection_items_mut(store.current_mut(), &self.name) else {
            return Ok(route_not_found());
        };
        let Some(item) = items.iter_mut().find(|item| id_matches(item, id)) else {
            return Ok(not_found());
        };
        let Value::Object(fields) = &mut *item else {
            return Ok(not_found());
        };
        // Existing keys keep their position, new keys are appended.
        fields.extend(body);
        let merged = item.clone();
        debug!("updated item");

        store
            .save()
            .with_context(|| format!("Failed to persist update of '{}/{}'", self.name, id))?;
        json_response(HttpStatusCode::Ok, &merged)
    }

    /// `DELETE /<name>/<id>`: remove every matching item and persist.
    #[instrument(skip(self), fields(collection = %self.name))]
    pub fn delete(&self, id: &str) -> BananaResult<HttpResponse> {
        let mut store = self.store.lock();
        let Some(items) = collection_items_mut(store.current_mut(), &self.name) else {
            return Ok(route_not_found());
        };
        let before = items.len();
        items.retain(|item| !id_matches(item, id));
        let removed = before - items.len();
        if removed == 0 {
            return Ok(not_found());
        }
        debug!(removed, "deleted items");

        store
            .save()
            .with_context(|| format!("Failed to persist removal of '{}/{}'", self.name, id))?;
        Ok(HttpResponse::no_content())
    }
}
