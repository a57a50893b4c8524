//! Strategy settings — an enumerated-option configuration registry.
//!
//! Each placement strategy exposes a [`Config`] made of named [`Setting`]s.
//! A setting lists its allowed [`SettingValue`]s, exactly one of which is
//! flagged as the default. Callers may select another option before the
//! strategy runs; reading an unset setting yields the default.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{ConfigError, ConfigResult};

/// One allowed option of a [`Setting`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingValue {
    pub value: String,
    pub description: String,
    pub default: bool,
}

impl SettingValue {
    pub fn new(value: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            description: description.into(),
            default: false,
        }
    }

    /// Build the option that is selected when nothing else is.
    pub fn default_option(value: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            default: true,
            ..Self::new(value, description)
        }
    }
}

/// A named configuration axis with its allowed options.
///
/// Only built in code; the selection can only ever hold one of `options`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Setting {
    pub name: String,
    pub description: String,
    options: Vec<SettingValue>,
    /// Selected option value; `None` falls back to the default.
    #[serde(skip_serializing_if = "Option::is_none")]
    selected: Option<String>,
}

impl Setting {
    /// Exactly one of `options` must be flagged as the default.
    pub fn new(name: impl Into<String>, options: Vec<SettingValue>) -> Self {
        let name = name.into();
        debug_assert_eq!(
            options.iter().filter(|o| o.default).count(),
            1,
            "setting `{name}` needs exactly one default option"
        );
        Self {
            name,
            description: String::new(),
            options,
            selected: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn options(&self) -> &[SettingValue] {
        &self.options
    }

    pub fn default_value(&self) -> Option<&SettingValue> {
        self.options.iter().find(|o| o.default)
    }

    /// The selected option, or the default when none is selected.
    pub fn value(&self) -> Option<&SettingValue> {
        match &self.selected {
            Some(selected) => self.options.iter().find(|o| &o.value == selected),
            None => self.default_value(),
        }
    }

    /// Select an option by its value.
    pub fn set_value(&mut self, value: &str) -> ConfigResult<()> {
        if !self.options.iter().any(|o| o.value == value) {
            return Err(ConfigError::InvalidValue {
                setting: self.name.clone(),
                value: value.to_string(),
                allowed: self.allowed(),
            });
        }
        self.selected = Some(value.to_string());
        Ok(())
    }

    /// Drop the selection so the default applies again.
    pub fn clear_value(&mut self) {
        self.selected = None;
    }

    fn allowed(&self) -> String {
        self.options
            .iter()
            .map(|o| o.value.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// The settings a strategy exposes, keyed by setting name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Config {
    settings: BTreeMap<String, Setting>,
}

impl Config {
    pub fn new(settings: Vec<Setting>) -> Self {
        let mut config = Self::default();
        for setting in settings {
            config.add_setting(setting);
        }
        config
    }

    /// Insert a setting, replacing any setting with the same name.
    pub fn add_setting(&mut self, setting: Setting) {
        self.settings.insert(setting.name.clone(), setting);
    }

    pub fn settings(&self) -> impl Iterator<Item = &Setting> {
        self.settings.values()
    }

    pub fn setting(&self, name: &str) -> Option<&Setting> {
        self.settings.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Resolved value of a setting.
    pub fn value(&self, name: &str) -> ConfigResult<&SettingValue> {
        let setting = self
            .settings
            .get(name)
            .ok_or_else(|| ConfigError::UnknownSetting(name.to_string()))?;
        setting
            .value()
            .ok_or_else(|| ConfigError::NoDefault(name.to_string()))
    }

    pub fn set_value(&mut self, name: &str, value: &str) -> ConfigResult<()> {
        self.settings
            .get_mut(name)
            .ok_or_else(|| ConfigError::UnknownSetting(name.to_string()))?
            .set_value(value)
    }
}
