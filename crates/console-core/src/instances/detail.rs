//! Read-only detail view of one instance.

use super::access::{admits, AccessSummary};
use super::state::{InstanceAction, InstanceState, StatusBadge};
use crate::error::ValidationError;
use secretary_client::BotInstance;

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceDetail {
    pub instance: BotInstance,
    pub state: InstanceState,
    pub badge: StatusBadge,
    /// Masked previews as `(field, preview)`; plain secrets never reach the console.
    pub secrets: Vec<(&'static str, String)>,
    pub access: AccessSummary,
}

impl InstanceDetail {
    pub fn new(instance: BotInstance) -> Self {
        let state = InstanceState::of(&instance);
        let secrets = instance
            .settings
            .masked_secrets()
            .into_iter()
            .map(|(name, preview)| (name, preview.to_string()))
            .collect();
        let access = AccessSummary::of(&instance.settings);

        Self {
            badge: state.badge(),
            state,
            secrets,
            access,
            instance,
        }
    }

    pub fn actions(&self) -> &'static [InstanceAction] {
        self.state.actions()
    }

    /// Whether `identity` (user id, phone or origin) may use this instance.
    pub fn admits(&self, identity: &str) -> Result<bool, ValidationError> {
        admits(&self.instance.settings, identity)
    }

    pub fn is_open(&self) -> bool {
        self.access.is_open(&self.instance.settings)
    }
}
