use std::cmp::Ordering;

use serde_json::Value;

use crate::store::error::{invalid_argument, StoreResult};
use crate::store::model::{DocumentKey, ResourcePath};
use crate::store::snapshot::DocumentSnapshot;
use crate::store::value::{compare_values, lookup_field, DocumentData};

/// Largest number of values a single `in` filter may carry.
pub const MAX_IN_VALUES: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    In,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldFilter {
    field: String,
    operator: FilterOperator,
    value: Value,
}

impl FieldFilter {
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> FilterOperator {
        self.operator
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    fn matches(&self, data: &DocumentData) -> bool {
        let Some(actual) = lookup_field(data, &self.field) else {
            return false;
        };
        match self.operator {
            FilterOperator::Equal => compare_values(actual, &self.value) == Some(Ordering::Equal),
            FilterOperator::NotEqual => {
                compare_values(actual, &self.value) != Some(Ordering::Equal)
            }
            FilterOperator::LessThan => same_kind_cmp(actual, &self.value) == Some(Ordering::Less),
            FilterOperator::LessThanOrEqual => matches!(
                same_kind_cmp(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOperator::GreaterThan => {
                same_kind_cmp(actual, &self.value) == Some(Ordering::Greater)
            }
            FilterOperator::GreaterThanOrEqual => matches!(
                same_kind_cmp(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOperator::In => self.value.as_array().is_some_and(|candidates| {
                candidates
                    .iter()
                    .any(|candidate| compare_values(actual, candidate) == Some(Ordering::Equal))
            }),
        }
    }
}

// Range filters only match values of the same kind, as the backend does.
fn same_kind_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    if std::mem::discriminant(left) != std::mem::discriminant(right) {
        return None;
    }
    compare_values(left, right)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderDirection {
    Ascending,
    Descending,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderBy {
    field: String,
    direction: OrderDirection,
}

/// A query over one collection.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    collection_path: ResourcePath,
    filters: Vec<FieldFilter>,
    order_by: Vec<OrderBy>,
    limit: Option<usize>,
}

impl Query {
    pub fn new(collection_path: ResourcePath) -> StoreResult<Self> {
        if collection_path.len() % 2 == 0 {
            return Err(invalid_argument(
                "Queries must reference a collection (odd number of path segments)",
            ));
        }
        Ok(Self {
            collection_path,
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        })
    }

    pub fn collection(path: &str) -> StoreResult<Self> {
        Self::new(ResourcePath::from_string(path)?)
    }

    pub fn collection_path(&self) -> &ResourcePath {
        &self.collection_path
    }

    pub fn filters(&self) -> &[FieldFilter] {
        &self.filters
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    pub fn where_field(
        mut self,
        field: impl Into<String>,
        operator: FilterOperator,
        value: Value,
    ) -> StoreResult<Self> {
        let field = field.into();
        if field.is_empty() {
            return Err(invalid_argument("Filter field must not be empty"));
        }
        if operator == FilterOperator::In {
            let count = value
                .as_array()
                .map(Vec::len)
                .ok_or_else(|| invalid_argument("'in' filters require an array value"))?;
            if count == 0 || count > MAX_IN_VALUES {
                return Err(invalid_argument(format!(
                    "'in' filters support between 1 and {MAX_IN_VALUES} values, got {count}"
                )));
            }
        }
        self.filters.push(FieldFilter {
            field,
            operator,
            value,
        });
        Ok(self)
    }

    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> StoreResult<Self> {
        self.where_field(field, FilterOperator::Equal, value.into())
    }

    pub fn where_in(self, field: impl Into<String>, values: Vec<Value>) -> StoreResult<Self> {
        self.where_field(field, FilterOperator::In, Value::Array(values))
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: OrderDirection) -> Self {
        self.order_by.push(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, key: &DocumentKey, data: &DocumentData) -> bool {
        key.collection_path() == self.collection_path
            && self.filters.iter().all(|filter| filter.matches(data))
    }

    /// Sorts matched documents by the order-by clauses (then key) and applies the limit.
    pub fn apply(&self, mut documents: Vec<DocumentSnapshot>) -> Vec<DocumentSnapshot> {
        documents.sort_by(|left, right| self.compare(left, right));
        if let Some(limit) = self.limit {
            documents.truncate(limit);
        }
        documents
    }

    fn compare(&self, left: &DocumentSnapshot, right: &DocumentSnapshot) -> Ordering {
        for order in &self.order_by {
            let lhs = left.data().and_then(|data| lookup_field(data, &order.field));
            let rhs = right.data().and_then(|data| lookup_field(data, &order.field));
            let ordering = match (lhs, rhs) {
                (Some(a), Some(b)) => compare_values(a, b).unwrap_or(Ordering::Equal),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            let ordering = match order.direction {
                OrderDirection::Ascending => ordering,
                OrderDirection::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        left.key().cmp(right.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::snapshot::SnapshotMetadata;
    use serde_json::json;

    fn doc(id: &str, value: Value) -> DocumentSnapshot {
        let collection = ResourcePath::from_string("locations").unwrap();
        DocumentSnapshot::new(
            DocumentKey::in_collection(&collection, id).unwrap(),
            Some(value.as_object().unwrap().clone().into_iter().collect()),
            SnapshotMetadata::default(),
        )
    }

    #[test]
    fn rejects_document_paths() {
        assert!(Query::collection("users/alice").is_err());
    }

    #[test]
    fn in_filter_is_capped() {
        let values = (0..11).map(Value::from).collect::<Vec<_>>();
        let err = Query::collection("locations")
            .unwrap()
            .where_in("sessionUUID", values)
            .unwrap_err();
        assert_eq!(err.code_str(), "store/invalid-argument");

        let empty = Query::collection("locations")
            .unwrap()
            .where_in("sessionUUID", Vec::new());
        assert!(empty.is_err());
    }

    #[test]
    fn filters_match_fields() {
        let query = Query::collection("locations")
            .unwrap()
            .where_eq("ownerUUID", "u1")
            .unwrap()
            .where_in("sessionUUID", vec![json!("s1"), json!("s2")])
            .unwrap()
            .where_field("speed", FilterOperator::GreaterThan, json!(10))
            .unwrap();

        let hit = doc("a", json!({"ownerUUID": "u1", "sessionUUID": "s2", "speed": 12.5}));
        let wrong_session = doc("b", json!({"ownerUUID": "u1", "sessionUUID": "s3", "speed": 20}));
        let slow = doc("c", json!({"ownerUUID": "u1", "sessionUUID": "s1", "speed": 3}));
        let text_speed = doc("d", json!({"ownerUUID": "u1", "sessionUUID": "s1", "speed": "fast"}));

        for (snapshot, expected) in [(hit, true), (wrong_session, false), (slow, false), (text_speed, false)] {
            assert_eq!(
                query.matches(snapshot.key(), snapshot.data().unwrap()),
                expected,
                "{}",
                snapshot.id()
            );
        }
    }

    #[test]
    fn other_collections_never_match() {
        let query = Query::collection("locations").unwrap();
        let key = DocumentKey::from_string("sensorEvents/a").unwrap();
        assert!(!query.matches(&key, &DocumentData::new()));
    }

    #[test]
    fn apply_orders_and_limits() {
        let query = Query::collection("locations")
            .unwrap()
            .order_by("timestamp", OrderDirection::Descending)
            .limit(2);
        let result = query.apply(vec![
            doc("a", json!({"timestamp": 1})),
            doc("b", json!({"timestamp": 3})),
            doc("c", json!({"timestamp": 2})),
        ]);
        let ids = result.iter().map(|d| d.id().to_string()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["b", "c"]);
    }
}
