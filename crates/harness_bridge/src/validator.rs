use std::collections::BTreeMap;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::SchemaError;

/// Maps a decoded JSON value to an accepted event, or rejects it.
pub trait EventValidator {
    type Event;

    fn validate(&mut self, value: Value) -> Result<Self::Event, SchemaError>;
}

impl<E, F> EventValidator for F
where
    F: FnMut(Value) -> Result<E, SchemaError>,
{
    type Event = E;

    fn validate(&mut self, value: Value) -> Result<E, SchemaError> {
        self(value)
    }
}

/// Validates against a declared set of event kinds, each with its required fields.
///
/// Accepted events are returned as the original JSON object.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    discriminator: String,
    kinds: BTreeMap<String, Vec<String>>,
}

impl SchemaValidator {
    pub fn new(discriminator: impl Into<String>) -> Self {
        Self {
            discriminator: discriminator.into(),
            kinds: BTreeMap::new(),
        }
    }

    pub fn kind<I, S>(mut self, kind: impl Into<String>, required_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kinds.insert(
            kind.into(),
            required_fields.into_iter().map(Into::into).collect(),
        );
        self
    }

    pub fn discriminator(&self) -> &str {
        &self.discriminator
    }

    pub fn knows(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }
}

impl EventValidator for SchemaValidator {
    type Event = Value;

    fn validate(&mut self, value: Value) -> Result<Value, SchemaError> {
        let Some(object) = value.as_object() else {
            return Err(SchemaError::NotAnObject);
        };
        let Some(kind) = object.get(&self.discriminator).and_then(Value::as_str) else {
            return Err(SchemaError::MissingDiscriminator {
                field: self.discriminator.clone(),
            });
        };
        let Some(required) = self.kinds.get(kind) else {
            return Err(SchemaError::UnknownKind {
                kind: kind.to_string(),
            });
        };
        if let Some(field) = required.iter().find(|field| !object.contains_key(field.as_str())) {
            return Err(SchemaError::MissingField {
                kind: kind.to_string(),
                field: field.clone(),
            });
        }
        Ok(value)
    }
}

/// Validates by deserializing into `T`, typically an internally tagged enum.
pub struct SerdeValidator<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeValidator<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SerdeValidator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for SerdeValidator<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for SerdeValidator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerdeValidator")
            .field("target", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: DeserializeOwned> EventValidator for SerdeValidator<T> {
    type Event = T;

    fn validate(&mut self, value: Value) -> Result<T, SchemaError> {
        if !value.is_object() {
            return Err(SchemaError::NotAnObject);
        }
        Ok(serde_json::from_value(value)?)
    }
}
