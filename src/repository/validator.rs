//! Validation-task and validator-profile persistence.
//!
//! Tasks live under `val:<id>` with the `val:index` sorted set; profiles
//! live under `valprofile:<addr>` with the `valprofile:index` set for
//! enumeration.

use std::sync::Arc;

use crate::domain::{OrderId, TaskId, TaskStatus, ValidationTask, ValidatorProfile, WalletAddress};
use crate::error::{Error, QuorumError, Result};
use crate::store::{keys, KeyedStore};

/// How far back the pending-task scans look in the index.
const TASK_SCAN_LIMIT: usize = 256;

/// Keyed storage of [`ValidationTask`] and [`ValidatorProfile`] records.
pub struct ValidatorRepository {
    store: Arc<dyn KeyedStore>,
}

impl ValidatorRepository {
    #[must_use]
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self { store }
    }

    pub async fn insert_task(&self, task: &ValidationTask) -> Result<()> {
        let body = serde_json::to_string(task)?;
        self.store
            .set(&keys::task(&task.id), &body, Some(keys::TASK_TTL))
            .await?;
        self.store
            .zadd(
                keys::TASK_INDEX,
                task.created_at.timestamp_millis() as f64,
                task.id.as_str(),
            )
            .await?;
        Ok(())
    }

    /// Compare-and-set write on the task's version token.
    pub async fn update_task(&self, task: &mut ValidationTask) -> Result<()> {
        let stored = self.get_task(&task.id).await?.ok_or_else(|| {
            Error::Quorum(QuorumError::TaskNotFound {
                task_id: task.id.to_string(),
            })
        })?;
        if stored.version != task.version {
            return Err(Error::Conflict {
                entity: keys::task(&task.id),
                expected: task.version,
                found: stored.version,
            });
        }
        task.version += 1;
        let body = serde_json::to_string(task)?;
        self.store
            .set(&keys::task(&task.id), &body, Some(keys::TASK_TTL))
            .await?;
        Ok(())
    }

    pub async fn get_task(&self, id: &TaskId) -> Result<Option<ValidationTask>> {
        let Some(body) = self.store.get(&keys::task(id)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&body)?))
    }

    /// Most recently opened tasks, newest first.
    pub async fn list_recent_tasks(&self, limit: usize) -> Result<Vec<ValidationTask>> {
        let ids = self.store.zrange_recent(keys::TASK_INDEX, limit).await?;
        let mut tasks = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(task) = self.get_task(&TaskId::new(id)).await? {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }

    /// The pending task for `order_id`, if one exists. Drives the
    /// one-pending-task-per-order guard.
    pub async fn pending_task_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<ValidationTask>> {
        let tasks = self.list_recent_tasks(TASK_SCAN_LIMIT).await?;
        Ok(tasks
            .into_iter()
            .find(|t| &t.order_id == order_id && t.status == TaskStatus::Pending))
    }

    /// All pending tasks, for the deadline sweep.
    pub async fn pending_tasks(&self) -> Result<Vec<ValidationTask>> {
        let tasks = self.list_recent_tasks(TASK_SCAN_LIMIT).await?;
        Ok(tasks
            .into_iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .collect())
    }

    pub async fn insert_profile(&self, profile: &ValidatorProfile) -> Result<()> {
        let body = serde_json::to_string(profile)?;
        self.store
            .set(
                &keys::validator(&profile.address),
                &body,
                Some(keys::VALIDATOR_TTL),
            )
            .await?;
        self.store
            .sadd(keys::VALIDATOR_INDEX, profile.address.as_str())
            .await?;
        Ok(())
    }

    /// Compare-and-set write on the profile's version token.
    pub async fn update_profile(&self, profile: &mut ValidatorProfile) -> Result<()> {
        let stored = self.get_profile(&profile.address).await?.ok_or_else(|| {
            Error::Quorum(QuorumError::NotEligible {
                validator: profile.address.to_string(),
                reason: "not registered".into(),
            })
        })?;
        if stored.version != profile.version {
            return Err(Error::Conflict {
                entity: keys::validator(&profile.address),
                expected: profile.version,
                found: stored.version,
            });
        }
        profile.version += 1;
        let body = serde_json::to_string(profile)?;
        self.store
            .set(
                &keys::validator(&profile.address),
                &body,
                Some(keys::VALIDATOR_TTL),
            )
            .await?;
        Ok(())
    }

    pub async fn get_profile(&self, addr: &WalletAddress) -> Result<Option<ValidatorProfile>> {
        let Some(body) = self.store.get(&keys::validator(addr)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&body)?))
    }

    pub async fn all_profiles(&self) -> Result<Vec<ValidatorProfile>> {
        let addrs = self.store.smembers(keys::VALIDATOR_INDEX).await?;
        let mut profiles = Vec::with_capacity(addrs.len());
        for addr in addrs {
            if let Some(profile) = self.get_profile(&WalletAddress::new(addr)).await? {
                profiles.push(profile);
            }
        }
        Ok(profiles)
    }
}
