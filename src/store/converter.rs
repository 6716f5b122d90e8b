use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::store::error::{invalid_argument, StoreResult};
use crate::store::value::DocumentData;

/// Converts between domain models and stored document maps.
///
/// Writes go through `to_map`, reads through `from_map`.
pub trait DataConverter: Send + Sync + Clone + 'static {
    /// The strongly typed model associated with this converter.
    type Model: Clone + PartialEq + Send + Sync + 'static;

    fn to_map(&self, value: &Self::Model) -> StoreResult<DocumentData>;

    fn from_map(&self, value: &DocumentData) -> StoreResult<Self::Model>;
}

/// Converter for any serde model that serialises to a JSON object.
pub struct SerdeConverter<T> {
    _model: PhantomData<fn() -> T>,
}

impl<T> SerdeConverter<T> {
    pub fn new() -> Self {
        Self {
            _model: PhantomData,
        }
    }
}

impl<T> Default for SerdeConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for SerdeConverter<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SerdeConverter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SerdeConverter")
    }
}

impl<T> DataConverter for SerdeConverter<T>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync + 'static,
{
    type Model = T;

    fn to_map(&self, value: &T) -> StoreResult<DocumentData> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(invalid_argument(format!(
                "documents must serialise to an object, got {other}"
            ))),
        }
    }

    fn from_map(&self, value: &DocumentData) -> StoreResult<T> {
        let object = value
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect::<serde_json::Map<_, _>>();
        Ok(serde_json::from_value(Value::Object(object))?)
    }
}

/// Leaves document maps untouched.
#[derive(Clone, Debug, Default)]
pub struct PassthroughConverter;

impl DataConverter for PassthroughConverter {
    type Model = DocumentData;

    fn to_map(&self, value: &DocumentData) -> StoreResult<DocumentData> {
        Ok(value.clone())
    }

    fn from_map(&self, value: &DocumentData) -> StoreResult<DocumentData> {
        Ok(value.clone())
    }
}
