//! Capability seam over one channel's instance endpoints.

use super::state::InstanceAction;
use async_trait::async_trait;
use secretary_client::{BotInstance, ChannelKind, ClientError, InstancePayload, InstanceStatus, InstancesApi};

/// Everything the instance view-model needs from the backend.
///
/// One implementation covers all channels; the channel only changes the
/// endpoint prefix and the settings variant.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InstanceApi: Send + Sync {
    fn channel(&self) -> ChannelKind;

    async fn list(&self) -> Result<Vec<BotInstance>, ClientError>;

    async fn get(&self, id: &str) -> Result<BotInstance, ClientError>;

    async fn create(&self, payload: &InstancePayload) -> Result<BotInstance, ClientError>;

    async fn update(&self, id: &str, payload: &InstancePayload) -> Result<BotInstance, ClientError>;

    async fn delete(&self, id: &str) -> Result<(), ClientError>;

    async fn perform(&self, id: &str, action: InstanceAction) -> Result<(), ClientError>;

    async fn status(&self, id: &str) -> Result<InstanceStatus, ClientError>;
}

#[async_trait]
impl InstanceApi for InstancesApi {
    fn channel(&self) -> ChannelKind {
        self.kind()
    }

    async fn list(&self) -> Result<Vec<BotInstance>, ClientError> {
        InstancesApi::list(self).await
    }

    async fn get(&self, id: &str) -> Result<BotInstance, ClientError> {
        InstancesApi::get(self, id).await
    }

    async fn create(&self, payload: &InstancePayload) -> Result<BotInstance, ClientError> {
        InstancesApi::create(self, payload).await
    }

    async fn update(&self, id: &str, payload: &InstancePayload) -> Result<BotInstance, ClientError> {
        InstancesApi::update(self, id, payload).await
    }

    async fn delete(&self, id: &str) -> Result<(), ClientError> {
        InstancesApi::delete(self, id).await
    }

    async fn perform(&self, id: &str, action: InstanceAction) -> Result<(), ClientError> {
        match action {
            InstanceAction::Start => self.start(id).await,
            InstanceAction::Stop => self.stop(id).await,
            InstanceAction::Restart => self.restart(id).await,
        }
    }

    async fn status(&self, id: &str) -> Result<InstanceStatus, ClientError> {
        InstancesApi::status(self, id).await
    }
}
