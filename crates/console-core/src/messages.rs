//! Localized user-facing texts.

use crate::instances::{InstanceAction, InstanceState};
use crate::operations::Operation;
use secretary_client::ExportFormat;
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ru,
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "ru" => Ok(Locale::Ru),
            other => Err(format!("unsupported locale: {}", other)),
        }
    }
}

/// Something to tell the operator.
#[derive(Debug, Clone, Copy)]
pub enum Text<'a> {
    Created(&'a str),
    Updated(&'a str),
    Deleted(&'a str),
    Performed(InstanceAction, &'a str),
    ActionFailed(InstanceAction, &'a str),
    Rejected(InstanceAction, InstanceState),
    SaveFailed(&'a str),
    DeleteFailed(&'a str),
    LogsCleaned(u64),
    CleanupFailed(&'a str),
    Exported(ExportFormat, &'a str),
    ExportFailed(&'a str),
    JobStarted(Operation),
    JobStopped(Operation),
    JobFailed(Operation, &'a str),
    BackendSwitched(&'a str),
    PresetSelected(&'a str),
    SettingsFailed(&'a str),
    State(InstanceState),
}

impl Locale {
    pub fn render(self, text: Text<'_>) -> String {
        match self {
            Locale::En => english(text),
            Locale::Ru => russian(text),
        }
    }
}

fn english(text: Text<'_>) -> String {
    match text {
        Text::Created(name) => format!("Instance \"{}\" created", name),
        Text::Updated(name) => format!("Instance \"{}\" saved", name),
        Text::Deleted(name) => format!("Instance \"{}\" deleted", name),
        Text::Performed(InstanceAction::Start, name) => format!("Bot \"{}\" started", name),
        Text::Performed(InstanceAction::Stop, name) => format!("Bot \"{}\" stopped", name),
        Text::Performed(InstanceAction::Restart, name) => format!("Bot \"{}\" restarted", name),
        Text::ActionFailed(InstanceAction::Start, error) => format!("Failed to start: {}", error),
        Text::ActionFailed(InstanceAction::Stop, error) => format!("Failed to stop: {}", error),
        Text::ActionFailed(InstanceAction::Restart, error) => format!("Failed to restart: {}", error),
        Text::Rejected(action, state) => format!(
            "Cannot {} an instance that is {}",
            action,
            english(Text::State(state)).to_lowercase()
        ),
        Text::SaveFailed(error) => format!("Failed to save: {}", error),
        Text::DeleteFailed(error) => format!("Failed to delete: {}", error),
        Text::LogsCleaned(count) => format!("Removed {} log entries", count),
        Text::CleanupFailed(error) => format!("Cleanup failed: {}", error),
        Text::Exported(format, path) => format!("Exported {} to {}", format.as_str().to_uppercase(), path),
        Text::ExportFailed(error) => format!("Export failed: {}", error),
        Text::JobStarted(operation) => format!("{} started", english_job(operation)),
        Text::JobStopped(operation) => format!("{} stopped", english_job(operation)),
        Text::JobFailed(operation, error) => format!("{} failed: {}", english_job(operation), error),
        Text::BackendSwitched(backend) => format!("LLM backend switched to {}", backend),
        Text::PresetSelected(name) => format!("TTS preset \"{}\" selected", name),
        Text::SettingsFailed(error) => format!("Failed to apply settings: {}", error),
        Text::State(InstanceState::Running) => "Running".into(),
        Text::State(InstanceState::Stopped) => "Stopped".into(),
        Text::State(InstanceState::Disabled) => "Disabled".into(),
    }
}

fn russian(text: Text<'_>) -> String {
    match text {
        Text::Created(name) => format!("Инстанс «{}» создан", name),
        Text::Updated(name) => format!("Инстанс «{}» сохранён", name),
        Text::Deleted(name) => format!("Инстанс «{}» удалён", name),
        Text::Performed(InstanceAction::Start, name) => format!("Бот «{}» запущен", name),
        Text::Performed(InstanceAction::Stop, name) => format!("Бот «{}» остановлен", name),
        Text::Performed(InstanceAction::Restart, name) => format!("Бот «{}» перезапущен", name),
        Text::ActionFailed(InstanceAction::Start, error) => format!("Ошибка запуска: {}", error),
        Text::ActionFailed(InstanceAction::Stop, error) => format!("Ошибка остановки: {}", error),
        Text::ActionFailed(InstanceAction::Restart, error) => format!("Ошибка перезапуска: {}", error),
        Text::Rejected(action, state) => format!(
            "Действие «{}» недоступно: {}",
            action,
            russian(Text::State(state)).to_lowercase()
        ),
        Text::SaveFailed(error) => format!("Ошибка сохранения: {}", error),
        Text::DeleteFailed(error) => format!("Ошибка удаления: {}", error),
        Text::LogsCleaned(count) => format!("Удалено записей: {}", count),
        Text::CleanupFailed(error) => format!("Ошибка очистки: {}", error),
        Text::Exported(format, path) => format!("Экспорт {} сохранён в {}", format.as_str().to_uppercase(), path),
        Text::ExportFailed(error) => format!("Ошибка экспорта: {}", error),
        Text::JobStarted(operation) => format!("Запущено: {}", russian_job(operation)),
        Text::JobStopped(operation) => format!("Остановлено: {}", russian_job(operation)),
        Text::JobFailed(operation, error) => format!("Ошибка ({}): {}", russian_job(operation), error),
        Text::BackendSwitched(backend) => format!("LLM-бэкенд переключён на {}", backend),
        Text::PresetSelected(name) => format!("Пресет TTS «{}» выбран", name),
        Text::SettingsFailed(error) => format!("Ошибка применения настроек: {}", error),
        Text::State(InstanceState::Running) => "Работает".into(),
        Text::State(InstanceState::Stopped) => "Остановлен".into(),
        Text::State(InstanceState::Disabled) => "Отключён".into(),
    }
}

fn english_job(operation: Operation) -> &'static str {
    match operation {
        Operation::ModelScan => "Model scan",
        Operation::ModelDownload => "Model download",
        Operation::Training => "Training",
    }
}

fn russian_job(operation: Operation) -> &'static str {
    match operation {
        Operation::ModelScan => "сканирование моделей",
        Operation::ModelDownload => "загрузка модели",
        Operation::Training => "обучение",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_per_locale() {
        let text = Text::Performed(InstanceAction::Stop, "Reception");
        assert_eq!(Locale::En.render(text), "Bot \"Reception\" stopped");
        assert_eq!(Locale::Ru.render(text), "Бот «Reception» остановлен");
    }

    #[test]
    fn test_rejection_names_state() {
        let text = Text::Rejected(InstanceAction::Start, InstanceState::Disabled);
        assert_eq!(
            Locale::En.render(text),
            "Cannot start an instance that is disabled"
        );
    }

    #[test]
    fn test_job_texts() {
        let text = Text::JobFailed(Operation::ModelScan, "disk full");
        assert_eq!(Locale::En.render(text), "Model scan failed: disk full");
        assert_eq!(Locale::Ru.render(text), "Ошибка (сканирование моделей): disk full");
        assert_eq!(Locale::En.render(Text::JobStarted(Operation::Training)), "Training started");
    }

    #[test]
    fn test_locale_parse() {
        assert_eq!("RU".parse::<Locale>(), Ok(Locale::Ru));
        assert!("de".parse::<Locale>().is_err());
    }
}
