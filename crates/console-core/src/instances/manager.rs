//! Instance list + detail view-model for one channel.

use super::api::InstanceApi;
use super::detail::InstanceDetail;
use super::form::InstanceForm;
use super::state::{InstanceAction, InstanceState};
use crate::error::{to_query_error, CoreError, CoreResult, ValidationError};
use crate::keys;
use crate::messages::{Locale, Text};
use crate::notify::{Notifier, Toast, ToastLevel};
use query_cache::{PollHandle, QueryCache, QuerySnapshot, RefetchInterval};
use secretary_client::{BotInstance, ChannelKind, InstanceStatus};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Pending {
    Update,
    Delete,
    Action(InstanceAction),
}

impl Pending {
    fn label(&self) -> String {
        match self {
            Pending::Update => "update".into(),
            Pending::Delete => "delete".into(),
            Pending::Action(action) => action.to_string(),
        }
    }
}

#[derive(Default)]
struct ViewState {
    selected: Option<String>,
    pending: HashSet<(String, Pending)>,
}

fn lock(view: &Mutex<ViewState>) -> MutexGuard<'_, ViewState> {
    view.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Marks an `(instance, operation)` pair in flight until dropped.
struct PendingGuard<'a> {
    view: &'a Mutex<ViewState>,
    key: (String, Pending),
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.view).pending.remove(&self.key);
    }
}

/// List, selection and lifecycle actions for the instances of one channel.
///
/// Reads go through the shared cache. Every mutation reports its outcome as
/// a localized toast; failures leave cached data and selection untouched.
pub struct InstanceManager {
    api: Arc<dyn InstanceApi>,
    cache: QueryCache,
    notifier: Arc<dyn Notifier>,
    locale: Locale,
    status_interval: Duration,
    view: Mutex<ViewState>,
}

impl InstanceManager {
    pub fn new(
        api: Arc<dyn InstanceApi>,
        cache: QueryCache,
        notifier: Arc<dyn Notifier>,
        locale: Locale,
    ) -> Self {
        Self {
            api,
            cache,
            notifier,
            locale,
            status_interval: DEFAULT_STATUS_INTERVAL,
            view: Mutex::new(ViewState::default()),
        }
    }

    /// Poll interval for [`watch_status`](Self::watch_status) while running.
    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }

    pub fn channel(&self) -> ChannelKind {
        self.api.channel()
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Whether `action` is currently in flight for `id`.
    pub fn is_pending(&self, id: &str, action: InstanceAction) -> bool {
        lock(&self.view)
            .pending
            .contains(&(id.to_string(), Pending::Action(action)))
    }

    /// Cached list, refreshed when stale.
    pub async fn list(&self) -> QuerySnapshot<Vec<BotInstance>> {
        let api = self.api.clone();
        self.cache
            .fetch(&keys::instances(self.channel()), move || async move {
                api.list().await.map_err(to_query_error)
            })
            .await
    }

    async fn reload(&self) -> QuerySnapshot<Vec<BotInstance>> {
        let api = self.api.clone();
        self.cache
            .refetch(&keys::instances(self.channel()), move || async move {
                api.list().await.map_err(to_query_error)
            })
            .await
    }

    pub async fn instances(&self) -> CoreResult<Vec<BotInstance>> {
        Ok(self.list().await.into_result()?)
    }

    pub async fn instance(&self, id: &str) -> CoreResult<BotInstance> {
        let api = self.api.clone();
        let owned = id.to_string();
        let snapshot = self
            .cache
            .fetch(&keys::instance(self.channel(), id), move || async move {
                api.get(&owned).await.map_err(to_query_error)
            })
            .await;
        Ok(snapshot.into_result()?)
    }

    pub async fn detail(&self, id: &str) -> CoreResult<InstanceDetail> {
        Ok(InstanceDetail::new(self.instance(id).await?))
    }

    pub fn selected(&self) -> Option<String> {
        lock(&self.view).selected.clone()
    }

    /// Point the detail view at `id`, which must be in the list.
    pub async fn select(&self, id: &str) -> CoreResult<()> {
        let listed = self.instances().await?.iter().any(|i| i.id == id);
        if !listed {
            return Err(CoreError::UnknownInstance(id.to_string()));
        }
        lock(&self.view).selected = Some(id.to_string());
        Ok(())
    }

    pub fn clear_selection(&self) {
        lock(&self.view).selected = None;
    }

    pub async fn selected_detail(&self) -> CoreResult<InstanceDetail> {
        let id = self.selected().ok_or(CoreError::NoSelection)?;
        self.detail(&id).await
    }

    /// Create an instance. Nothing is sent if the form is invalid.
    ///
    /// The new instance becomes selected once the refreshed list contains it.
    #[instrument(skip(self, form), fields(channel = %self.channel()))]
    pub async fn create(&self, form: &InstanceForm) -> CoreResult<BotInstance> {
        let kind = self.check_form(form)?;
        let payload = form.to_payload()?;

        let created = match self
            .cache
            .mutate(self.api.create(&payload), &[keys::instances(kind)])
            .await
        {
            Ok(instance) => instance,
            Err(e) => {
                let error = to_query_error(e);
                self.toast(ToastLevel::Error, Text::SaveFailed(&error.message));
                return Err(error.into());
            }
        };

        self.toast(ToastLevel::Success, Text::Created(&created.name));
        self.cache
            .set_data(&keys::instance(kind, &created.id), created.clone())
            .await;

        let listed = self
            .reload()
            .await
            .data
            .map(|list| list.iter().any(|i| i.id == created.id))
            .unwrap_or(false);

        if listed {
            lock(&self.view).selected = Some(created.id.clone());
        } else {
            warn!(id = %created.id, "Created instance not in refreshed list, keeping selection");
        }

        Ok(created)
    }

    /// Replace every editable field of `id`.
    #[instrument(skip(self, form), fields(channel = %self.channel()))]
    pub async fn update(&self, id: &str, form: &InstanceForm) -> CoreResult<BotInstance> {
        let kind = self.check_form(form)?;
        let payload = form.to_payload()?;
        let _guard = self.begin(id, Pending::Update)?;

        match self
            .cache
            .mutate(
                self.api.update(id, &payload),
                &[keys::instances(kind), keys::instance(kind, id)],
            )
            .await
        {
            Ok(updated) => {
                self.cache
                    .set_data(&keys::instance(kind, id), updated.clone())
                    .await;
                self.toast(ToastLevel::Success, Text::Updated(&updated.name));
                Ok(updated)
            }
            Err(e) => {
                let error = to_query_error(e);
                self.toast(ToastLevel::Error, Text::SaveFailed(&error.message));
                Err(error.into())
            }
        }
    }

    /// Delete `id`. A selection pointing at it moves to the first remaining
    /// instance, or to none.
    #[instrument(skip(self), fields(channel = %self.channel()))]
    pub async fn delete(&self, id: &str) -> CoreResult<()> {
        let kind = self.channel();
        let _guard = self.begin(id, Pending::Delete)?;
        let name = self.display_name(id).await;

        if let Err(e) = self
            .cache
            .mutate(self.api.delete(id), &[keys::instances(kind)])
            .await
        {
            let error = to_query_error(e);
            self.toast(ToastLevel::Error, Text::DeleteFailed(&error.message));
            return Err(error.into());
        }

        self.cache.remove(&keys::instance(kind, id)).await;
        self.cache.remove(&keys::instance_status(kind, id)).await;
        self.toast(ToastLevel::Success, Text::Deleted(&name));

        let remaining: Vec<BotInstance> = self
            .reload()
            .await
            .data
            .unwrap_or_default()
            .into_iter()
            .filter(|i| i.id != id)
            .collect();

        {
            let mut view = lock(&self.view);
            let dangling = match view.selected.as_deref() {
                Some(selected) => selected == id || !remaining.iter().any(|i| i.id == selected),
                None => false,
            };
            if dangling {
                view.selected = remaining.first().map(|i| i.id.clone());
                debug!(selected = ?view.selected, "Selection moved after delete");
            }
        }

        Ok(())
    }

    /// Run a lifecycle action. Actions the current state does not allow are
    /// rejected without a request.
    #[instrument(skip(self), fields(channel = %self.channel()))]
    pub async fn perform(&self, id: &str, action: InstanceAction) -> CoreResult<()> {
        let kind = self.channel();
        let _guard = self.begin(id, Pending::Action(action))?;

        let instance = self.instance(id).await?;
        let state = InstanceState::of(&instance);
        if let Err(rejected) = state.after(action) {
            self.toast(ToastLevel::Warning, Text::Rejected(action, state));
            return Err(CoreError::Transition {
                id: id.to_string(),
                action,
                reason: rejected.to_string(),
            });
        }

        match self
            .cache
            .mutate(
                self.api.perform(id, action),
                &[keys::instances(kind), keys::instance(kind, id)],
            )
            .await
        {
            Ok(()) => {
                info!("Instance {} accepted {}", id, action);
                self.toast(ToastLevel::Success, Text::Performed(action, &instance.name));
                Ok(())
            }
            Err(e) => {
                let error = to_query_error(e);
                self.toast(ToastLevel::Error, Text::ActionFailed(action, &error.message));
                Err(error.into())
            }
        }
    }

    pub async fn start(&self, id: &str) -> CoreResult<()> {
        self.perform(id, InstanceAction::Start).await
    }

    pub async fn stop(&self, id: &str) -> CoreResult<()> {
        self.perform(id, InstanceAction::Stop).await
    }

    pub async fn restart(&self, id: &str) -> CoreResult<()> {
        self.perform(id, InstanceAction::Restart).await
    }

    /// Fresh liveness report from the backend.
    pub async fn status(&self, id: &str) -> CoreResult<InstanceStatus> {
        let api = self.api.clone();
        let owned = id.to_string();
        let snapshot = self
            .cache
            .refetch(&keys::instance_status(self.channel(), id), move || async move {
                api.status(&owned).await.map_err(to_query_error)
            })
            .await;
        Ok(snapshot.into_result()?)
    }

    /// Poll the status of `id` while it reports running.
    pub fn watch_status(&self, id: &str) -> PollHandle<InstanceStatus> {
        let api = self.api.clone();
        let owned = id.to_string();
        let interval = self.status_interval;

        self.cache.poll(
            keys::instance_status(self.channel(), id),
            RefetchInterval::conditional(move |status: Option<&InstanceStatus>| {
                status.filter(|s| s.running).map(|_| interval)
            }),
            move || {
                let api = api.clone();
                let id = owned.clone();
                async move { api.status(&id).await.map_err(to_query_error) }
            },
        )
    }

    fn check_form(&self, form: &InstanceForm) -> Result<ChannelKind, ValidationError> {
        let kind = self.channel();
        if form.kind() != kind {
            return Err(ValidationError::InvalidValue {
                field: "channel".into(),
                message: format!("{} form used for {} instances", form.kind(), kind),
            });
        }
        Ok(kind)
    }

    fn begin(&self, id: &str, op: Pending) -> CoreResult<PendingGuard<'_>> {
        let key = (id.to_string(), op);
        if !lock(&self.view).pending.insert(key.clone()) {
            return Err(CoreError::Pending {
                id: id.to_string(),
                action: op.label(),
            });
        }
        Ok(PendingGuard {
            view: &self.view,
            key,
        })
    }

    async fn display_name(&self, id: &str) -> String {
        let kind = self.channel();
        if let Some(instance) = self
            .cache
            .snapshot::<BotInstance>(&keys::instance(kind, id))
            .await
            .data
        {
            return instance.name;
        }
        self.cache
            .snapshot::<Vec<BotInstance>>(&keys::instances(kind))
            .await
            .data
            .and_then(|list| list.into_iter().find(|i| i.id == id))
            .map(|i| i.name)
            .unwrap_or_else(|| id.to_string())
    }

    fn toast(&self, level: ToastLevel, text: Text<'_>) {
        self.notifier
            .notify(Toast::new(level, self.locale.render(text)));
    }
}
