use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context};
use serde::Deserialize;
use shared::protocol::{AuditRequest, DEFAULT_AUDIT_QUERY};
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "auditor.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditorSettings {
    pub server_url: String,
    pub request_timeout_secs: u64,
    pub query: String,
    pub system_prompt: Option<String>,
}

impl Default for AuditorSettings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".into(),
            // Audits run an LLM over the whole document; allow for slow backends.
            request_timeout_secs: 300,
            query: DEFAULT_AUDIT_QUERY.into(),
            system_prompt: None,
        }
    }
}

impl AuditorSettings {
    pub fn audit_request(&self) -> AuditRequest {
        let request = AuditRequest::new(self.query.clone());
        match &self.system_prompt {
            Some(prompt) => request.with_system_prompt(prompt.clone()),
            None => request,
        }
    }

    /// Checks the base address and returns it without a trailing slash.
    pub fn validated_server_url(&self) -> anyhow::Result<String> {
        let url = Url::parse(&self.server_url)
            .with_context(|| format!("invalid server_url {:?}", self.server_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "server_url must use http or https, got {:?}",
                url.scheme()
            ));
        }
        Ok(url.as_str().trim_end_matches('/').to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    server_url: Option<String>,
    request_timeout_secs: Option<u64>,
    query: Option<String>,
    system_prompt: Option<String>,
}

/// Defaults, then the config file, then environment variables.
///
/// An explicitly named config file must exist; the default `auditor.toml` is optional.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<AuditorSettings> {
    let mut settings = AuditorSettings::default();

    let (path, required) = match config_path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    match fs::read_to_string(&path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("failed to parse {}", path.display()))?,
        Err(err) if required => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
        Err(_) => {}
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

fn apply_file(settings: &mut AuditorSettings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file_cfg.query {
        settings.query = v;
    }
    if let Some(v) = file_cfg.system_prompt {
        settings.system_prompt = Some(v);
    }
    Ok(())
}

fn apply_env(
    settings: &mut AuditorSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = lookup("AUDITOR_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = lookup("AUDITOR_REQUEST_TIMEOUT_SECS") {
        settings.request_timeout_secs = v
            .parse()
            .with_context(|| format!("AUDITOR_REQUEST_TIMEOUT_SECS must be a number, got {v:?}"))?;
    }

    if let Some(v) = lookup("AUDITOR_QUERY") {
        settings.query = v;
    }
    if let Some(v) = lookup("AUDITOR_SYSTEM_PROMPT") {
        settings.system_prompt = Some(v);
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
