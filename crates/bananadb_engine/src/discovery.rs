use serde_json::Value;

use crate::store::Document;

/// Names of the top-level keys whose values are arrays, in document order.
///
/// Every such key becomes a collection with its own set of routes; scalars and
/// objects at the top level are ignored.
pub fn discover_collections(document: &Document) -> Vec<String> {
    document
        .iter()
        .filter(|(_, value)| value.is_array())
        .map(|(name, _)| name.clone())
        .collect()
}

/// The array for `name`, if the document currently has it as a collection.
pub fn collection_items<'a>(document: &'a Document, name: &str) -> Option<&'a Vec<Value>> {
    document.get(name).and_then(Value::as_array)
}

/// Mutable variant of [`collection_items`].
pub fn collection_items_mut<'a>(
    document: &'a mut Document,
    name: &str,
) -> Option<&'a mut Vec<Value>> {
    document.get_mut(name).and_then(Value::as_array_mut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_discovers_array_keys_in_order() {
        let doc = document(json!({
            "users": [],
            "title": "demo",
            "posts": [{"id": 1}],
            "settings": {"theme": "dark"},
            "count": 3,
            "tags": ["a", "b"],
            "nothing": null
        }));

        assert_eq!(discover_collections(&doc), vec!["users", "posts", "tags"]);
    }

    #[test]
    fn test_empty_document_has_no_collections() {
        assert!(discover_collections(&Document::new()).is_empty());
        assert!(discover_collections(&document(json!({"title": "x"}))).is_empty());
    }

    #[test]
    fn test_collection_items() {
        let mut doc = document(json!({"posts": [{"id": 1}], "title": "x"}));

        assert_eq!(collection_items(&doc, "posts").map(Vec::len), Some(1));
        assert!(collection_items(&doc, "title").is_none());
        assert!(collection_items(&doc, "missing").is_none());

        collection_items_mut(&mut doc, "posts")
            .unwrap()
            .push(json!({"id": 2}));
        assert_eq!(doc["posts"], json!([{"id": 1}, {"id": 2}]));
    }
}
