use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::serialization::{type_name_of, SerializationError};

/// Error type for saga storage operations.
#[derive(Debug, Error)]
pub enum SagaError {
    #[error("saga {0} already exists")]
    AlreadyExists(String),

    #[error("saga {0} not found")]
    NotFound(String),

    /// Optimistic concurrency check failed on update or delete.
    #[error("concurrent write to saga {id}: expected revision {expected}, found {actual}")]
    ConcurrentWrite {
        id: String,
        expected: u64,
        actual: u64,
    },
}

/// One stored saga instance.
#[derive(Clone, Debug, PartialEq)]
pub struct SagaData {
    pub id: String,
    pub revision: u64,
    pub data_type: String,
    pub data: Value,
}

impl SagaData {
    /// Wrap typed saga state as a fresh instance at revision 0.
    pub fn new<T: Serialize>(id: impl Into<String>, data: &T) -> Result<Self, SerializationError> {
        Ok(Self {
            id: id.into(),
            revision: 0,
            data_type: type_name_of::<T>().to_string(),
            data: serde_json::to_value(data)?,
        })
    }

    pub fn is<T>(&self) -> bool {
        self.data_type == type_name_of::<T>()
    }

    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, SerializationError> {
        Ok(serde_json::from_value(self.data.clone())?)
    }

    /// Replace the stored state, keeping id and revision.
    pub fn set_data<T: Serialize>(&mut self, data: &T) -> Result<(), SerializationError> {
        self.data = serde_json::to_value(data)?;
        Ok(())
    }
}

/// Storage for saga instances.
///
/// Besides the lookups handlers need, the contract exposes the full set of
/// stored instances so tests can assert on saga state directly.
pub trait SagaStorage: Send + Sync {
    fn find(&self, id: &str) -> Option<SagaData>;

    /// Find an instance of `data_type` whose `property` equals `value`.
    fn find_by(&self, data_type: &str, property: &str, value: &Value) -> Option<SagaData>;

    fn insert(&self, saga: SagaData) -> Result<(), SagaError>;

    /// Store `saga` if its revision matches the stored one, bumping the revision.
    fn update(&self, saga: SagaData) -> Result<SagaData, SagaError>;

    fn delete(&self, saga: &SagaData) -> Result<(), SagaError>;

    /// Every stored instance, ordered by id.
    fn instances(&self) -> Vec<SagaData>;

    fn clear(&self);
}

/// In-memory saga storage backed by a `BTreeMap<String, SagaData>`.
#[derive(Debug, Default)]
pub struct InMemorySagaStorage {
    sagas: Mutex<BTreeMap<String, SagaData>>,
}

impl InMemorySagaStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SagaStorage for InMemorySagaStorage {
    fn find(&self, id: &str) -> Option<SagaData> {
        self.sagas.lock().get(id).cloned()
    }

    fn find_by(&self, data_type: &str, property: &str, value: &Value) -> Option<SagaData> {
        self.sagas
            .lock()
            .values()
            .find(|s| s.data_type == data_type && s.data.get(property) == Some(value))
            .cloned()
    }

    fn insert(&self, saga: SagaData) -> Result<(), SagaError> {
        let mut sagas = self.sagas.lock();
        if sagas.contains_key(&saga.id) {
            return Err(SagaError::AlreadyExists(saga.id));
        }
        sagas.insert(saga.id.clone(), saga);
        Ok(())
    }

    fn update(&self, mut saga: SagaData) -> Result<SagaData, SagaError> {
        let mut sagas = self.sagas.lock();
        let stored = sagas
            .get_mut(&saga.id)
            .ok_or_else(|| SagaError::NotFound(saga.id.clone()))?;
        if stored.revision != saga.revision {
            return Err(SagaError::ConcurrentWrite {
                id: saga.id,
                expected: saga.revision,
                actual: stored.revision,
            });
        }
        saga.revision += 1;
        *stored = saga.clone();
        Ok(saga)
    }

    fn delete(&self, saga: &SagaData) -> Result<(), SagaError> {
        let mut sagas = self.sagas.lock();
        let stored = sagas
            .get(&saga.id)
            .ok_or_else(|| SagaError::NotFound(saga.id.clone()))?;
        if stored.revision != saga.revision {
            return Err(SagaError::ConcurrentWrite {
                id: saga.id.clone(),
                expected: saga.revision,
                actual: stored.revision,
            });
        }
        sagas.remove(&saga.id);
        Ok(())
    }

    fn instances(&self) -> Vec<SagaData> {
        self.sagas.lock().values().cloned().collect()
    }

    fn clear(&self) {
        self.sagas.lock().clear();
    }
}
