/*
 * Copyright (C) 2026 Mark Wells Dev
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Configuration namespace; keys are addressed as `sif.<section>.<field>`.
pub const NAMESPACE: &str = "sif";

/// User settings under the `sif` namespace.
///
/// On disk and in the environment keys are snake_case (`language_server`);
/// the editor-facing keys are camelCase (`sif.languageServer.path`).
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Language server settings (`sif.languageServer.*`).
    #[serde(default)]
    pub language_server: ToolSettings,

    /// Interpreter settings (`sif.interpreter.*`).
    #[serde(default)]
    pub interpreter: ToolSettings,
}

/// Settings for one external tool.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ToolSettings {
    /// Explicit path to the executable. Empty means "search for it".
    #[serde(default)]
    pub path: String,
}

impl Settings {
    /// Load settings from the user config directory, an explicit file and
    /// the environment, later sources overriding earlier ones.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or does not match the
    /// settings schema.
    pub fn load(explicit_file: Option<PathBuf>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("language_server.path", "")?
            .set_default("interpreter.path", "")?;

        // 2. User config directory (~/.config/sif/settings.toml)
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join(NAMESPACE).join("settings.toml");
            if config_path.exists() {
                builder = builder.add_source(config::File::from(config_path));
            }
        }

        // 3. Explicit file
        if let Some(path) = explicit_file {
            builder = builder.add_source(config::File::from(path));
        }

        // 4. Environment (SIF_LANGUAGE_SERVER__PATH, SIF_INTERPRETER__PATH)
        builder = builder.add_source(
            config::Environment::with_prefix("SIF")
                .prefix_separator("_")
                .separator("__"),
        );

        let config = builder
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Looks up a fully qualified key such as `sif.interpreter.path`.
    ///
    /// Unset values are reported as `None`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let key = key.strip_prefix(NAMESPACE)?.strip_prefix('.')?;
        let value = match key {
            "languageServer.path" => &self.language_server.path,
            "interpreter.path" => &self.interpreter.path,
            _ => return None,
        };
        (!value.is_empty()).then(|| value.clone())
    }
}
