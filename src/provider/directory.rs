//! User materialization: provider profile → local user id.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Claims the provider reports for an authenticated subject.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderProfile {
    pub subject: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Local identity produced by materializing a profile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaterializedUser {
    pub user_id: String,
    /// First time this subject was seen; drives the onboarding redirect.
    pub is_new: bool,
}

/// Upserts provider subjects into local user records.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn materialize(&self, profile: &ProviderProfile) -> Result<MaterializedUser>;
}

/// In-memory [`UserDirectory`] keyed by provider subject.
pub struct MemoryUserDirectory {
    users: Mutex<HashMap<String, String>>,
}

impl MemoryUserDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryUserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn materialize(&self, profile: &ProviderProfile) -> Result<MaterializedUser> {
        let mut users = self.users.lock().await;
        if let Some(user_id) = users.get(&profile.subject) {
            return Ok(MaterializedUser {
                user_id: user_id.clone(),
                is_new: false,
            });
        }
        let user_id = Uuid::new_v4().to_string();
        users.insert(profile.subject.clone(), user_id.clone());
        Ok(MaterializedUser {
            user_id,
            is_new: true,
        })
    }
}
