use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Attachment {
    data: Vec<u8>,
    metadata: BTreeMap<String, String>,
}

/// In-memory attachment store for payloads too large to travel in a message.
///
/// Handlers save the payload here and pass the returned id in the message.
#[derive(Debug, Default)]
pub struct InMemoryDataStore {
    attachments: Mutex<HashMap<String, Attachment>>,
}

impl InMemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` under a fresh id and return the id.
    pub fn save(&self, data: impl Into<Vec<u8>>, metadata: BTreeMap<String, String>) -> String {
        let id = Uuid::new_v4().to_string();
        self.save_as(&id, data, metadata);
        id
    }

    /// Store `data` under `id`, replacing any previous attachment.
    pub fn save_as(&self, id: &str, data: impl Into<Vec<u8>>, metadata: BTreeMap<String, String>) {
        self.attachments.lock().insert(
            id.to_string(),
            Attachment {
                data: data.into(),
                metadata,
            },
        );
    }

    pub fn load(&self, id: &str) -> Option<Vec<u8>> {
        self.attachments.lock().get(id).map(|a| a.data.clone())
    }

    pub fn metadata(&self, id: &str) -> Option<BTreeMap<String, String>> {
        self.attachments.lock().get(id).map(|a| a.metadata.clone())
    }

    pub fn delete(&self, id: &str) -> bool {
        self.attachments.lock().remove(id).is_some()
    }

    /// Ids of every stored attachment, sorted.
    pub fn attachment_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.attachments.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Total payload size of every stored attachment.
    pub fn size_bytes(&self) -> usize {
        self.attachments.lock().values().map(|a| a.data.len()).sum()
    }

    pub fn clear(&self) {
        self.attachments.lock().clear();
    }
}
