use std::fs;

use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_url: String,
    pub freshness_dwell_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8787".into(),
            freshness_dwell_secs: 10,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    freshness_dwell_secs: Option<u64>,
}

/// Defaults, overridden by `panel.toml`, overridden by environment.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("panel.toml") {
        apply_file_settings(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("PANEL_SERVER_URL") {
        settings.server_url = v;
    }

    settings
}

fn apply_file_settings(settings: &mut Settings, raw: &str) {
    match toml::from_str::<FileSettings>(raw) {
        Ok(file_cfg) => {
            if let Some(v) = file_cfg.server_url {
                settings.server_url = v;
            }
            if let Some(v) = file_cfg.freshness_dwell_secs {
                settings.freshness_dwell_secs = v;
            }
        }
        Err(err) => tracing::warn!(error = %err, "ignoring malformed panel.toml"),
    }
}
