use std::collections::BTreeMap;

use synthdoc_core::{Model, Properties, Property};

/// One addressable field: where it lives in the schema and in the document.
#[derive(Debug, Clone)]
pub struct FieldEntry {
    pub schema_path: String,
    pub doc_path: Vec<String>,
    pub property: Property,
    /// Object fields built child by child rather than by a generator.
    pub container: bool,
}

impl FieldEntry {
    pub fn dotted(&self) -> String {
        self.doc_path.join(".")
    }

    pub fn items_path(&self) -> String {
        format!("{}.items", self.schema_path)
    }
}

/// Precomputed field paths of a model, parents before children.
///
/// Arrays whose items are object schemas carry a sub-index for the item,
/// keyed by the item's schema path, so sub-documents never re-walk the tree.
#[derive(Debug, Clone, Default)]
pub struct FieldPathIndex {
    entries: Vec<FieldEntry>,
    items: BTreeMap<String, FieldPathIndex>,
}

impl FieldPathIndex {
    pub fn build(model: &Model) -> Self {
        Self::from_properties(&model.properties, "")
    }

    pub fn from_properties(properties: &Properties, schema_base: &str) -> Self {
        let mut index = Self::default();
        index.walk(properties, schema_base, &[]);
        index
    }

    pub fn entries(&self) -> &[FieldEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sub-index for object items at `schema_path`.
    pub fn items(&self, schema_path: &str) -> Option<&FieldPathIndex> {
        self.items.get(schema_path)
    }

    pub fn doc_paths(&self) -> impl Iterator<Item = String> + '_ {
        self.entries.iter().map(FieldEntry::dotted)
    }

    fn walk(&mut self, properties: &Properties, schema_base: &str, doc_base: &[String]) {
        for (name, property) in properties.iter() {
            let schema_path = join(schema_base, &format!("properties.{name}"));
            let mut doc_path = doc_base.to_vec();
            doc_path.push(name.to_string());
            let container = property.is_container();

            self.entries.push(FieldEntry {
                schema_path: schema_path.clone(),
                doc_path: doc_path.clone(),
                property: property.clone(),
                container,
            });

            if container {
                self.walk(&property.properties, &schema_path, &doc_path);
            } else if property.ty.is_array() && !property.data.has_generator() {
                self.index_items(property, &schema_path);
            }
        }
    }

    fn index_items(&mut self, array: &Property, schema_path: &str) {
        let Some(items) = array.items.as_deref() else {
            return;
        };
        let items_path = format!("{schema_path}.items");
        if items.is_container() {
            let sub = Self::from_properties(&items.properties, &items_path);
            self.items.insert(items_path, sub);
        } else if items.ty.is_array() && !items.data.has_generator() {
            self.index_items(items, &items_path);
        }
    }
}

fn join(base: &str, segment: &str) -> String {
    if base.is_empty() {
        segment.to_string()
    } else {
        format!("{base}.{segment}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model() -> Model {
        serde_json::from_value(json!({
            "name": "orders",
            "type": "object",
            "properties": {
                "id": { "type": "integer" },
                "customer": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "address": {
                            "type": "object",
                            "properties": { "city": { "type": "string" } }
                        }
                    }
                },
                "meta": { "type": "object", "data": { "value": { "v": 1 } } },
                "lines": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "sku": { "type": "string" },
                            "tags": { "type": "array", "items": { "type": "string" } }
                        }
                    }
                },
                "grid": {
                    "type": "array",
                    "items": {
                        "type": "array",
                        "items": { "type": "object", "properties": { "x": { "type": "integer" } } }
                    }
                }
            }
        }))
        .expect("parse model")
    }

    #[test]
    fn parents_precede_children_in_declaration_order() {
        let index = FieldPathIndex::build(&model());
        let paths: Vec<String> = index.doc_paths().collect();
        assert_eq!(
            paths,
            vec![
                "id",
                "customer",
                "customer.name",
                "customer.address",
                "customer.address.city",
                "meta",
                "lines",
                "grid",
            ]
        );
        assert_eq!(
            index.entries()[4].schema_path,
            "properties.customer.properties.address.properties.city"
        );
    }

    #[test]
    fn objects_with_generators_are_leaves() {
        let index = FieldPathIndex::build(&model());
        let meta = index.entries().iter().find(|e| e.dotted() == "meta").expect("meta");
        assert!(!meta.container);
        let customer = index.entries().iter().find(|e| e.dotted() == "customer").expect("customer");
        assert!(customer.container);
    }

    #[test]
    fn object_items_get_sub_indexes_at_any_depth() {
        let index = FieldPathIndex::build(&model());
        let lines = index.items("properties.lines.items").expect("lines items");
        let item_paths: Vec<String> = lines.doc_paths().collect();
        assert_eq!(item_paths, vec!["sku", "tags"]);

        let grid = index.items("properties.grid.items.items").expect("grid items");
        assert_eq!(grid.len(), 1);
        assert!(index.items("properties.grid.items").is_none());
    }
}
