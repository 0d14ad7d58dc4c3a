//! Admin console view-models.
//!
//! Everything here sits between [`secretary_client`] and a front end: bot
//! instance management with selection and pending state, log browsing,
//! assistant settings, polling of long-running jobs and bounded buffers for
//! streamed output.
//! All reads go through a shared [`query_cache::QueryCache`], and every
//! user-visible outcome is reported through a [`Notifier`].

pub mod buffer;
pub mod error;
pub mod instances;
pub mod keys;
pub mod logs;
pub mod messages;
pub mod notify;
pub mod operations;
pub mod settings;

pub use buffer::{StreamBuffer, StreamConsumer};
pub use error::{CoreError, CoreResult, ValidationError};
pub use instances::{InstanceAction, InstanceDetail, InstanceForm, InstanceManager, InstanceState};
pub use logs::{LogBrowser, LogSource};
pub use messages::{Locale, Text};
pub use notify::{Notifier, RecordingNotifier, Toast, ToastLevel, TracingNotifier};
pub use operations::{Operation, OperationWatcher};
pub use settings::SettingsManager;
