use std::{collections::HashMap, fs, path::Path};

use sheets_integration::{SheetsConfig, DEFAULT_API_BASE, DEFAULT_RANGE, DEFAULT_TOKEN_URI};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub google_client_email: Option<String>,
    pub google_private_key: Option<String>,
    pub google_sheet_id: Option<String>,
    pub sheets_range: String,
    pub google_token_uri: String,
    pub sheets_api_base: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:3000".into(),
            google_client_email: None,
            google_private_key: None,
            google_sheet_id: None,
            sheets_range: DEFAULT_RANGE.into(),
            google_token_uri: DEFAULT_TOKEN_URI.into(),
            sheets_api_base: DEFAULT_API_BASE.into(),
        }
    }
}

impl Settings {
    /// All three Google values are present. The route still answers without
    /// them, with a configuration error.
    pub fn sheets_ready(&self) -> bool {
        self.google_client_email.is_some()
            && self.google_private_key.is_some()
            && self.google_sheet_id.is_some()
    }

    pub fn sheets_config(&self) -> SheetsConfig {
        SheetsConfig {
            client_email: self.google_client_email.clone(),
            private_key: self.google_private_key.clone(),
            spreadsheet_id: self.google_sheet_id.clone(),
            range: self.sheets_range.clone(),
            token_uri: self.google_token_uri.clone(),
            api_base: self.sheets_api_base.clone(),
        }
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new("server.toml"), |key| std::env::var(key).ok())
}

/// Defaults, then the optional toml file, then the environment. Blank values
/// count as unset.
pub fn load_settings_from(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();
    let env = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            let file = |key: &str| {
                file_cfg
                    .get(key)
                    .filter(|value| !value.trim().is_empty())
                    .cloned()
            };
            if let Some(v) = file("bind_addr") {
                settings.server_bind = v;
            }
            if let Some(v) = file("google_client_email") {
                settings.google_client_email = Some(v);
            }
            if let Some(v) = file("google_private_key") {
                settings.google_private_key = Some(v);
            }
            if let Some(v) = file("google_sheet_id") {
                settings.google_sheet_id = Some(v);
            }
            if let Some(v) = file("sheets_range") {
                settings.sheets_range = v;
            }
            if let Some(v) = file("google_token_uri") {
                settings.google_token_uri = v;
            }
            if let Some(v) = file("sheets_api_base") {
                settings.sheets_api_base = v;
            }
        }
    }

    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = env("GOOGLE_CLIENT_EMAIL") {
        settings.google_client_email = Some(v);
    }
    if let Some(v) = env("APP__GOOGLE_CLIENT_EMAIL") {
        settings.google_client_email = Some(v);
    }

    if let Some(v) = env("GOOGLE_PRIVATE_KEY") {
        settings.google_private_key = Some(v);
    }
    if let Some(v) = env("APP__GOOGLE_PRIVATE_KEY") {
        settings.google_private_key = Some(v);
    }

    if let Some(v) = env("GOOGLE_SHEET_ID") {
        settings.google_sheet_id = Some(v);
    }
    if let Some(v) = env("APP__GOOGLE_SHEET_ID") {
        settings.google_sheet_id = Some(v);
    }

    if let Some(v) = env("APP__SHEETS_RANGE") {
        settings.sheets_range = v;
    }
    if let Some(v) = env("APP__GOOGLE_TOKEN_URI") {
        settings.google_token_uri = v;
    }
    if let Some(v) = env("APP__SHEETS_API_BASE") {
        settings.sheets_api_base = v;
    }

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
