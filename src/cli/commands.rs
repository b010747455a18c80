use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::info;

use crate::api::FatSecretClient;
use crate::auth::{Credentials, OAuthEndpoints, OAuthSession, StdinPrompt, CACHE_NAMES};
use crate::config::{expand_home, AppConfig, DATA_DIR_ENV};
use crate::diary::{DiaryExporter, DiaryRange, DiaryResult};
use crate::http::{ReqwestTransport, ResilientClient, ThreadSleeper};
use crate::storage::CredentialStore;

// -- Wiring -------------------------------------------------------------------

fn open_store(config: &AppConfig) -> Result<CredentialStore> {
    let env_dir = std::env::var(DATA_DIR_ENV).ok();
    let storage = config.storage_config(env_dir.as_deref())?;
    Ok(CredentialStore::new(&storage))
}

/// Reads `{consumer_key, consumer_secret}` from a JSON key file.
pub fn load_credentials(key_file: &Path) -> Result<Credentials> {
    let path = expand_home(key_file)?;
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read key file {}", path.display()))?;
    let creds: Credentials = serde_json::from_str(contents.trim())
        .with_context(|| format!("Invalid credentials format in {}", path.display()))?;
    if creds.consumer_key.is_empty() || creds.consumer_secret.is_empty() {
        anyhow::bail!("Key file {} has an empty consumer key or secret", path.display());
    }
    Ok(creds)
}

fn authorized_session(config: &AppConfig, key_file: &Path) -> Result<OAuthSession> {
    let credentials = load_credentials(key_file)?;
    let store = open_store(config)?;
    let transport = ReqwestTransport::new(config.request_timeout())?;
    let http = ResilientClient::new(Arc::new(transport), Arc::new(ThreadSleeper), config.http.policy());

    let mut session = OAuthSession::new(credentials, store, http, OAuthEndpoints::fatsecret());
    session
        .authorize(&mut StdinPrompt)
        .context("FatSecret authorization failed")?;
    Ok(session)
}

fn write_result(out: &Path, result: &DiaryResult) -> Result<()> {
    let json = serde_json::to_string(result)?;
    fs::write(out, json).with_context(|| format!("Failed to write {}", out.display()))?;
    Ok(())
}

// -- Commands -----------------------------------------------------------------

pub fn cmd_diary(out: &Path, key_file: &Path, from: NaiveDate, to: NaiveDate) -> Result<()> {
    let range = DiaryRange::new(from, to)?;
    let config = AppConfig::load()?;

    let session = authorized_session(&config, key_file)?;
    let sleeper = session.sleeper();
    let mut api = FatSecretClient::new(session, config.rate_limit.policy());

    info!("Fetching diary {}..{}", range.from, range.to);
    let result = DiaryExporter::new(&mut api, sleeper, config.courtesy_delay())
        .export(range)
        .context("Diary export failed")?;

    write_result(out, &result)?;
    info!(
        "Diary with {} days and {} entries was written to {}",
        result.day_aggregates.len(),
        result.entries.len(),
        out.display()
    );
    Ok(())
}

pub fn cmd_auth(key_file: &Path) -> Result<()> {
    let config = AppConfig::load()?;
    authorized_session(&config, key_file)?;
    eprintln!("Authorized. Access token cached.");
    Ok(())
}

pub fn cmd_status() -> Result<()> {
    let config = AppConfig::load()?;
    let store = open_store(&config)?;

    println!("Secrets in {}:", store.dir().display());
    let entries = store.entries(CACHE_NAMES)?;
    if entries.is_empty() {
        println!("  (none) -- run `fatdiary auth` to authorize");
        return Ok(());
    }

    let now = CredentialStore::now();
    for (name, secret) in entries {
        let age_secs = now.saturating_sub(secret.time);
        let age = if age_secs < 3600 {
            "<1h old".to_string()
        } else if age_secs < 86400 {
            format!("{}h old", age_secs / 3600)
        } else {
            format!("{} days old", age_secs / 86400)
        };
        println!("  {} -- {}", name, age);
    }
    Ok(())
}

pub fn cmd_reset() -> Result<()> {
    let config = AppConfig::load()?;
    let store = open_store(&config)?;

    let mut removed = 0;
    for name in CACHE_NAMES {
        if store.remove(name)? {
            removed += 1;
        }
    }
    eprintln!("Removed {} cached secret(s) from {}.", removed, store.dir().display());
    Ok(())
}
