//! Instance commands: list, select, show, create, update, lifecycle, delete.

use crate::commands::{CommandHandler, CommandLine};
use crate::context::Console;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use console_core::instances::BadgeColor;
use console_core::{InstanceAction, InstanceDetail, InstanceForm, InstanceManager, Text};
use secretary_client::{ChannelKind, ChannelSettings};
use std::fmt::Write;
use std::sync::Arc;

pub struct InstancesHandler {
    console: Arc<Console>,
}

impl InstancesHandler {
    pub fn new(console: Arc<Console>) -> Self {
        Self { console }
    }

    fn channel_arg(value: &str) -> AppResult<ChannelKind> {
        value.parse().map_err(|e: String| AppError::usage(e))
    }

    fn state_label(&self, detail: &InstanceDetail) -> String {
        self.console.locale.render(Text::State(detail.state))
    }

    async fn list(&self, command: &CommandLine) -> AppResult<String> {
        if let Some(channel) = command.arg(0) {
            self.console.set_channel(Self::channel_arg(channel)?);
        }
        let manager = self.console.current();
        let snapshot = manager.list().await;
        let selected = manager.selected();

        let mut out = String::new();
        if let (Some(_), Some(error)) = (&snapshot.data, &snapshot.error) {
            let _ = writeln!(out, "(cached, refresh failed: {})", error);
        }
        let instances = snapshot.into_result()?;

        let _ = write!(out, "{} instances ({})", manager.channel(), instances.len());
        for instance in instances {
            let detail = InstanceDetail::new(instance);
            let marker = if selected.as_deref() == Some(detail.instance.id.as_str()) {
                '*'
            } else {
                ' '
            };
            let _ = write!(
                out,
                "\n{} {:<12} {:<24} {}",
                marker,
                detail.instance.id,
                detail.instance.name,
                self.state_label(&detail)
            );
        }
        Ok(out)
    }

    async fn show(&self, command: &CommandLine) -> AppResult<String> {
        let id = self.console.target(command.arg(0))?;
        let detail = self.console.current().detail(&id).await?;
        let instance = &detail.instance;

        let mut out = format!("{} ({}) [{}]", instance.name, instance.id, instance.kind());
        let badge = &detail.badge;
        let _ = write!(
            out,
            "\nState: {} ({}{})",
            self.state_label(&detail),
            match badge.color {
                BadgeColor::Green => "green",
                BadgeColor::Gray => "gray",
            },
            if badge.pulsing { ", pulsing" } else { "" }
        );
        if let Some(description) = &instance.description {
            let _ = write!(out, "\nDescription: {}", description);
        }
        let _ = write!(out, "\nAuto-start: {}", yes_no(instance.auto_start));
        if let Some(backend) = &instance.ai.llm_backend {
            let _ = write!(out, "\nLLM backend: {}", backend);
        }
        for (field, preview) in &detail.secrets {
            let _ = write!(out, "\n{}: {}", field, preview);
        }

        let access = &detail.access;
        match &instance.settings {
            ChannelSettings::Widget(_) if detail.is_open() => {
                let _ = write!(out, "\nDomains: any");
            }
            ChannelSettings::Widget(_) => {
                let _ = write!(out, "\nDomains: {}", access.domains);
            }
            _ if detail.is_open() => {
                let _ = write!(out, "\nAccess: open ({} blocked, {} admins)", access.blocked, access.admins);
            }
            _ => {
                let _ = write!(
                    out,
                    "\nAccess: {} allowed, {} blocked, {} admins",
                    access.allowed, access.blocked, access.admins
                );
            }
        }

        if let Some(identity) = command.option("check") {
            let _ = write!(out, "\nAdmits {}: {}", identity, yes_no(detail.admits(identity)?));
        }

        let actions: Vec<&str> = detail.actions().iter().map(InstanceAction::as_str).collect();
        if !actions.is_empty() {
            let _ = write!(out, "\nActions: {}", actions.join(", "));
        }
        Ok(out)
    }

    async fn create(&self, command: &CommandLine) -> AppResult<String> {
        let kind = match command.arg(0) {
            Some(channel) => Self::channel_arg(channel)?,
            None => return Err(AppError::usage("create <channel> name=<name> [field=value...]")),
        };

        let mut form = InstanceForm::new(kind);
        for (field, value) in &command.options {
            form.set(field, value)?;
        }

        self.console.set_channel(kind);
        let created = self.console.manager(kind).create(&form).await?;
        Ok(format!("{} ({})", created.name, created.id))
    }

    async fn update(&self, command: &CommandLine) -> AppResult<String> {
        if command.options.is_empty() {
            return Err(AppError::usage("update [id] field=value..."));
        }
        let id = self.console.target(command.arg(0))?;
        let manager = self.console.current();

        let mut form = InstanceForm::edit(&manager.instance(&id).await?);
        for (field, value) in &command.options {
            form.set(field, value)?;
        }

        let updated = manager.update(&id, &form).await?;
        Ok(format!("{} ({})", updated.name, updated.id))
    }

    async fn perform(&self, command: &CommandLine) -> AppResult<String> {
        let action: InstanceAction = command.name.parse().map_err(|e: String| AppError::usage(e))?;
        let id = self.console.target(command.arg(0))?;
        let manager = self.console.current();

        manager.perform(&id, action).await?;
        self.describe_state(manager, &id).await
    }

    async fn describe_state(&self, manager: &InstanceManager, id: &str) -> AppResult<String> {
        let detail = manager.detail(id).await?;
        Ok(format!("{}: {}", detail.instance.name, self.state_label(&detail)))
    }

    async fn delete(&self, command: &CommandLine) -> AppResult<String> {
        let id = self.console.target(command.arg(0))?;
        let manager = self.console.current();
        manager.delete(&id).await?;

        Ok(match manager.selected() {
            Some(selected) => format!("Selected: {}", selected),
            None => "No instance selected".into(),
        })
    }

    async fn select(&self, command: &CommandLine) -> AppResult<String> {
        let id = command.arg(0).ok_or_else(|| AppError::usage("select <id>"))?;
        let manager = self.console.current();
        manager.select(id).await?;
        self.describe_state(manager, id).await
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[async_trait]
impl CommandHandler for InstancesHandler {
    fn name(&self) -> &str {
        "instances"
    }

    fn triggers(&self) -> &[&str] {
        &[
            "instances", "select", "show", "create", "update", "start", "stop", "restart", "delete",
        ]
    }

    async fn execute(&self, command: &CommandLine) -> AppResult<String> {
        match command.name.as_str() {
            "instances" => self.list(command).await,
            "select" => self.select(command).await,
            "show" => self.show(command).await,
            "create" => self.create(command).await,
            "update" => self.update(command).await,
            "delete" => self.delete(command).await,
            _ => self.perform(command).await,
        }
    }
}
