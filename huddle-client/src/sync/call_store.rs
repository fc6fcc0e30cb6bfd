use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use huddle_core::{ActiveCallRecord, CallId, ParticipantId, RoomId};
use std::collections::BTreeSet;

/// Durable "who is on this call" store shared by every client of a call.
///
/// Mutations are set-add / set-remove and are applied atomically per call.
#[async_trait]
pub trait CallStore: Send + Sync {
    async fn get_call(&self, call_id: &CallId) -> Result<Option<ActiveCallRecord>, StoreError>;

    /// Adds `participant`, creating the record if needed.
    async fn add_participant(
        &self,
        call_id: &CallId,
        room_id: &RoomId,
        participant: &ParticipantId,
    ) -> Result<ActiveCallRecord, StoreError>;

    /// Removes `participant` and returns the remaining set, or `None` if
    /// there is no record for `call_id`.
    async fn remove_participant(
        &self,
        call_id: &CallId,
        participant: &ParticipantId,
    ) -> Result<Option<BTreeSet<ParticipantId>>, StoreError>;

    async fn delete_call(&self, call_id: &CallId) -> Result<(), StoreError>;
}

/// In-process [`CallStore`].
#[derive(Debug, Default)]
pub struct MemoryCallStore {
    calls: DashMap<CallId, ActiveCallRecord>,
}

impl MemoryCallStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

#[async_trait]
impl CallStore for MemoryCallStore {
    async fn get_call(&self, call_id: &CallId) -> Result<Option<ActiveCallRecord>, StoreError> {
        Ok(self.calls.get(call_id).map(|r| r.value().clone()))
    }

    async fn add_participant(
        &self,
        call_id: &CallId,
        room_id: &RoomId,
        participant: &ParticipantId,
    ) -> Result<ActiveCallRecord, StoreError> {
        let mut record = self
            .calls
            .entry(call_id.clone())
            .or_insert_with(|| ActiveCallRecord::new(call_id.clone(), room_id.clone()));
        record.participants.insert(participant.clone());
        Ok(record.clone())
    }

    async fn remove_participant(
        &self,
        call_id: &CallId,
        participant: &ParticipantId,
    ) -> Result<Option<BTreeSet<ParticipantId>>, StoreError> {
        Ok(self.calls.get_mut(call_id).map(|mut record| {
            record.participants.remove(participant);
            record.participants.clone()
        }))
    }

    async fn delete_call(&self, call_id: &CallId) -> Result<(), StoreError> {
        self.calls.remove(call_id);
        Ok(())
    }
}
