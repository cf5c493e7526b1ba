//! Shared HTTP request helpers for CLI commands.

use anyhow::{Context, Result};
use serde::Deserialize;

pub fn base_url(host: &str, port: u16) -> String {
    format!("http://{host}:{port}")
}

pub async fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    reqwest::get(url)
        .await
        .with_context(|| format!("failed to reach the viewer at {url}; is camlinkd viewer running?"))?
        .json::<T>()
        .await
        .context("failed to parse response")
}
