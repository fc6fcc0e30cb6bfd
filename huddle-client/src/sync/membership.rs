use crate::error::StoreError;
use crate::sync::CallStore;
use huddle_core::{CallId, ParticipantId, RoomId};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Keeps the durable call record in line with live mesh membership.
///
/// This is the only place that deletes a record: whenever a removal leaves
/// the participant set empty.
#[derive(Clone)]
pub struct MembershipSynchronizer {
    store: Arc<dyn CallStore>,
}

impl MembershipSynchronizer {
    pub fn new(store: Arc<dyn CallStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CallStore> {
        &self.store
    }

    pub async fn on_join(
        &self,
        call_id: &CallId,
        room_id: &RoomId,
        participant: &ParticipantId,
    ) -> Result<(), StoreError> {
        self.store
            .add_participant(call_id, room_id, participant)
            .await?;
        debug!(call = %call_id, participant = %participant, "Participant recorded");
        Ok(())
    }

    /// A missing record is a no-op.
    pub async fn on_leave(
        &self,
        call_id: &CallId,
        participant: &ParticipantId,
    ) -> Result<(), StoreError> {
        match self.store.remove_participant(call_id, participant).await? {
            Some(remaining) if remaining.is_empty() => {
                info!(call = %call_id, "Last participant left, deleting call record");
                self.store.delete_call(call_id).await
            }
            Some(_) => {
                debug!(call = %call_id, participant = %participant, "Participant removed");
                Ok(())
            }
            None => {
                debug!(call = %call_id, "No call record to update");
                Ok(())
            }
        }
    }

    /// Brings the record to exactly `live`, the relay's authoritative
    /// membership of the room.
    pub async fn reconcile(
        &self,
        call_id: &CallId,
        room_id: &RoomId,
        live: &BTreeSet<ParticipantId>,
    ) -> Result<(), StoreError> {
        let recorded = self
            .store
            .get_call(call_id)
            .await?
            .map(|r| r.participants)
            .unwrap_or_default();

        for participant in live.difference(&recorded) {
            self.store
                .add_participant(call_id, room_id, participant)
                .await?;
        }

        let stale: Vec<&ParticipantId> = recorded.difference(live).collect();
        if !stale.is_empty() {
            info!(
                call = %call_id,
                count = stale.len(),
                "Removing stale participants from call record"
            );
        }
        for participant in stale {
            self.on_leave(call_id, participant).await?;
        }
        Ok(())
    }
}
