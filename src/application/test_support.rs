//! In-memory collaborators shared by the application service tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::catalog::{AppCatalog, CatalogError};
use crate::application::directory::{DirectoryError, GroupInfo, GroupsDirectory};
use crate::application::queues::{
    DataQueue, DataQueueMessage, PrepareToSendMessage, PrepareToSendQueue, QueueError,
};
use crate::application::repos::{
    AppSettingsRepo, DeliveryUpdate, ExportsRepo, NotificationsRepo, OutcomeCounts, RepoError,
    SentNotificationsRepo, TeamsRepo,
};
use crate::domain::audience::Audience;
use crate::domain::entities::{
    DeliveryCounters, ExportRecord, NotificationContent, NotificationRecord, new_notification_id,
};
use crate::domain::types::{NotificationPartition, NotificationStatus};

/// Ordered record of collaborator calls, shared across stubs.
#[derive(Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<&'static str>>>,
}

impl CallLog {
    pub fn push(&self, entry: &'static str) {
        self.entries.lock().expect("call log lock").push(entry);
    }

    pub fn entries(&self) -> Vec<&'static str> {
        self.entries.lock().expect("call log lock").clone()
    }
}

pub fn draft_with_audience(id: &str, audience: Audience) -> NotificationRecord {
    let mut record = NotificationRecord::new_draft(
        NotificationContent {
            title: format!("Notification {id}"),
            ..Default::default()
        },
        audience,
        Some("author".to_string()),
    );
    record.id = id.to_string();
    record
}

pub fn sent_notification(
    id: &str,
    status: NotificationStatus,
    counters: DeliveryCounters,
) -> NotificationRecord {
    let mut record = draft_with_audience(id, Audience::default());
    record.partition = NotificationPartition::Sent;
    record.status = status;
    record.counters = counters;
    record.sending_started_at = Some(OffsetDateTime::now_utc());
    if status.is_terminal() {
        record.sent_at = Some(OffsetDateTime::now_utc());
    }
    record
}

#[derive(Default)]
pub struct InMemoryNotificationsRepo {
    records: Mutex<Vec<NotificationRecord>>,
    writes: AtomicUsize,
    log: CallLog,
}

impl InMemoryNotificationsRepo {
    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    /// Seed a record without counting it as a write.
    pub fn insert(&self, record: NotificationRecord) {
        self.records.lock().expect("records lock").push(record);
    }

    pub fn draft(&self, id: &str) -> Option<NotificationRecord> {
        self.lookup(NotificationPartition::Draft, id)
    }

    pub fn sent(&self, id: &str) -> Option<NotificationRecord> {
        self.lookup(NotificationPartition::Sent, id)
    }

    pub fn sent_ids(&self) -> Vec<String> {
        self.records
            .lock()
            .expect("records lock")
            .iter()
            .filter(|record| record.partition == NotificationPartition::Sent)
            .map(|record| record.id.clone())
            .collect()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lookup(&self, partition: NotificationPartition, id: &str) -> Option<NotificationRecord> {
        self.records
            .lock()
            .expect("records lock")
            .iter()
            .find(|record| record.partition == partition && record.id == id)
            .cloned()
    }
}

#[async_trait]
impl NotificationsRepo for InMemoryNotificationsRepo {
    async fn find(
        &self,
        partition: NotificationPartition,
        id: &str,
    ) -> Result<Option<NotificationRecord>, RepoError> {
        self.log.push("find");
        Ok(self.lookup(partition, id))
    }

    async fn create_or_update(&self, record: &NotificationRecord) -> Result<(), RepoError> {
        self.log.push("create_or_update");
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().expect("records lock");
        match records
            .iter_mut()
            .find(|existing| existing.partition == record.partition && existing.id == record.id)
        {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(())
    }

    async fn move_draft_to_sent(&self, draft: &NotificationRecord) -> Result<String, RepoError> {
        self.log.push("move_draft_to_sent");
        let mut records = self.records.lock().expect("records lock");
        let record = records
            .iter_mut()
            .find(|record| record.partition == NotificationPartition::Draft && record.id == draft.id)
            .ok_or(RepoError::NotFound)?;

        let sent_id = new_notification_id();
        record.source_draft_id = Some(record.id.clone());
        record.id = sent_id.clone();
        record.partition = NotificationPartition::Sent;
        record.status = NotificationStatus::Preparing;
        record.sending_started_at = Some(OffsetDateTime::now_utc());
        Ok(sent_id)
    }

    async fn delete(&self, record: &NotificationRecord) -> Result<(), RepoError> {
        self.log.push("delete");
        let mut records = self.records.lock().expect("records lock");
        let before = records.len();
        records.retain(|existing| {
            !(existing.partition == record.partition && existing.id == record.id)
        });
        if records.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn most_recent_sent(&self, limit: u32) -> Result<Vec<NotificationRecord>, RepoError> {
        let mut sent: Vec<NotificationRecord> = self
            .records
            .lock()
            .expect("records lock")
            .iter()
            .filter(|record| record.partition == NotificationPartition::Sent)
            .cloned()
            .collect();
        sent.sort_by(|a, b| b.id.cmp(&a.id));
        sent.truncate(limit as usize);
        Ok(sent)
    }

    async fn all_drafts(&self) -> Result<Vec<NotificationRecord>, RepoError> {
        Ok(self
            .records
            .lock()
            .expect("records lock")
            .iter()
            .filter(|record| record.is_draft())
            .cloned()
            .collect())
    }

    async fn update_delivery(&self, update: &DeliveryUpdate) -> Result<bool, RepoError> {
        self.log.push("update_delivery");
        let mut records = self.records.lock().expect("records lock");
        let Some(record) = records.iter_mut().find(|record| {
            record.partition == NotificationPartition::Sent
                && record.id == update.notification_id
                && !record.status.is_terminal()
        }) else {
            return Ok(false);
        };

        record.counters = record.counters.merge_monotonic(&update.counters);
        if update.status != NotificationStatus::Preparing {
            record.status = update.status;
        }
        if update.sent_at.is_some() {
            record.sent_at = update.sent_at;
        }
        if update.warning_message.is_some() {
            record.warning_message = update.warning_message.clone();
        }
        Ok(true)
    }
}

#[derive(Default)]
pub struct RecordingSentRepo {
    counts: OutcomeCounts,
    log: CallLog,
}

impl RecordingSentRepo {
    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn with_counts(mut self, counts: OutcomeCounts) -> Self {
        self.counts = counts;
        self
    }
}

#[async_trait]
impl SentNotificationsRepo for RecordingSentRepo {
    async fn ensure_storage(&self) -> Result<(), RepoError> {
        self.log.push("ensure_storage");
        Ok(())
    }

    async fn outcome_counts(&self, _notification_id: &str) -> Result<OutcomeCounts, RepoError> {
        Ok(self.counts)
    }
}

#[derive(Default)]
pub struct RecordingQueues {
    prepared: Mutex<Vec<PrepareToSendMessage>>,
    delayed: Mutex<Vec<(DataQueueMessage, Duration)>>,
    fail_prepare: AtomicBool,
    log: CallLog,
}

impl RecordingQueues {
    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn fail_prepare_to_send(&self) {
        self.fail_prepare.store(true, Ordering::SeqCst);
    }

    pub fn prepared(&self) -> Vec<PrepareToSendMessage> {
        self.prepared.lock().expect("prepared lock").clone()
    }

    pub fn delayed(&self) -> Vec<(DataQueueMessage, Duration)> {
        self.delayed.lock().expect("delayed lock").clone()
    }
}

#[async_trait]
impl PrepareToSendQueue for RecordingQueues {
    async fn send(&self, message: PrepareToSendMessage) -> Result<String, QueueError> {
        self.log.push("prepare_to_send");
        if self.fail_prepare.load(Ordering::SeqCst) {
            return Err(QueueError {
                queue: "prepare_to_send",
                source: RepoError::Timeout,
            });
        }
        self.prepared.lock().expect("prepared lock").push(message);
        Ok(new_notification_id())
    }
}

#[async_trait]
impl DataQueue for RecordingQueues {
    async fn send_delayed(
        &self,
        message: DataQueueMessage,
        delay: Duration,
    ) -> Result<String, QueueError> {
        self.log.push("data_queue");
        self.delayed
            .lock()
            .expect("delayed lock")
            .push((message, delay));
        Ok(new_notification_id())
    }
}

enum GroupEntry {
    Found(GroupInfo),
    Failing,
}

#[derive(Default)]
pub struct StubDirectory {
    groups: HashMap<String, GroupEntry>,
}

impl StubDirectory {
    pub fn with_group(mut self, id: &str, name: &str, hidden_membership: bool) -> Self {
        self.groups.insert(
            id.to_string(),
            GroupEntry::Found(GroupInfo {
                id: id.to_string(),
                display_name: name.to_string(),
                hidden_membership,
            }),
        );
        self
    }

    pub fn with_failure(mut self, id: &str) -> Self {
        self.groups.insert(id.to_string(), GroupEntry::Failing);
        self
    }
}

#[async_trait]
impl GroupsDirectory for StubDirectory {
    async fn group_by_id(&self, id: &str) -> Result<Option<GroupInfo>, DirectoryError> {
        match self.groups.get(id) {
            Some(GroupEntry::Found(group)) => Ok(Some(group.clone())),
            Some(GroupEntry::Failing) => Err(DirectoryError::Service {
                status: 503,
                message: format!("lookup of {id} failed"),
            }),
            None => Ok(None),
        }
    }
}

#[derive(Default)]
pub struct StubTeamsRepo {
    teams: HashMap<String, String>,
}

impl StubTeamsRepo {
    pub fn with_team(mut self, id: &str, name: &str) -> Self {
        self.teams.insert(id.to_string(), name.to_string());
        self
    }
}

#[async_trait]
impl TeamsRepo for StubTeamsRepo {
    async fn team_names_by_ids(&self, ids: &[String]) -> Result<Vec<String>, RepoError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.teams.get(id).cloned())
            .collect())
    }
}

pub struct StubCatalog {
    response: Result<Option<String>, CatalogError>,
    calls: AtomicUsize,
}

impl StubCatalog {
    pub fn returning(response: Result<Option<String>, CatalogError>) -> Self {
        Self {
            response,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AppCatalog for StubCatalog {
    async fn teams_app_id(&self, _external_id: &str) -> Result<Option<String>, CatalogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.response {
            Ok(app_id) => Ok(app_id.clone()),
            Err(CatalogError::Service { status, message }) => Err(CatalogError::Service {
                status: *status,
                message: message.clone(),
            }),
            Err(CatalogError::Unavailable(message)) => {
                Err(CatalogError::Unavailable(message.clone()))
            }
        }
    }
}

#[derive(Default)]
pub struct RecordingAppSettings {
    stored: Mutex<Option<String>>,
    writes: Mutex<Vec<String>>,
}

impl RecordingAppSettings {
    pub fn with_app_id(app_id: &str) -> Self {
        Self {
            stored: Mutex::new(Some(app_id.to_string())),
            writes: Mutex::default(),
        }
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().expect("writes lock").clone()
    }
}

#[async_trait]
impl AppSettingsRepo for RecordingAppSettings {
    async fn user_app_id(&self) -> Result<Option<String>, RepoError> {
        Ok(self.stored.lock().expect("stored lock").clone())
    }

    async fn set_user_app_id(&self, app_id: &str) -> Result<(), RepoError> {
        *self.stored.lock().expect("stored lock") = Some(app_id.to_string());
        self.writes
            .lock()
            .expect("writes lock")
            .push(app_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct StubExports {
    exports: Vec<ExportRecord>,
}

impl StubExports {
    pub fn with_export(mut self, export: ExportRecord) -> Self {
        self.exports.push(export);
        self
    }
}

#[async_trait]
impl ExportsRepo for StubExports {
    async fn find_export(
        &self,
        user_id: &str,
        notification_id: &str,
    ) -> Result<Option<ExportRecord>, RepoError> {
        Ok(self
            .exports
            .iter()
            .find(|export| export.user_id == user_id && export.notification_id == notification_id)
            .cloned())
    }
}
