//! Persisted browser session (cookies + per-origin local storage) so runs
//! after the first interactive setup start out already logged in.

use std::path::Path;

use chromiumoxide::{Browser, Page, cdp::browser_protocol::network::CookieParam};
use color_eyre::{Result, eyre::eyre};
use serde::{Deserialize, Serialize};

/// One `localStorage` key/value pair.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StorageEntry {
	pub name: String,
	pub value: String,
}

/// `localStorage` contents for a single origin.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OriginStorage {
	pub origin: String,
	pub entries: Vec<StorageEntry>,
}

/// Serialized authentication state. Cookies are kept in their CDP wire shape
/// so capture and restore are a plain serde round trip.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SessionState {
	pub cookies: Vec<serde_json::Value>,
	#[serde(default)]
	pub origins: Vec<OriginStorage>,
}

impl SessionState {
	/// Reads the session file. An absent file is not an error; the caller
	/// falls back to interactive setup.
	pub fn load(path: &Path) -> Result<Option<Self>> {
		if !path.exists() {
			return Ok(None);
		}
		let raw = std::fs::read_to_string(path).map_err(|e| eyre!("Failed to read session file {}: {e}", path.display()))?;
		let state: Self = serde_json::from_str(&raw).map_err(|e| eyre!("Session file {} is corrupt: {e}", path.display()))?;
		Ok(Some(state))
	}

	pub fn save(&self, path: &Path) -> Result<()> {
		let raw = serde_json::to_string_pretty(self)?;
		std::fs::write(path, raw).map_err(|e| eyre!("Failed to write session file {}: {e}", path.display()))?;
		Ok(())
	}

	/// Snapshots the live browser's cookies and the current page's
	/// `localStorage`.
	pub async fn capture(browser: &Browser, page: &Page) -> Result<Self> {
		let cookies = browser.get_cookies().await.map_err(|e| eyre!("Failed to read browser cookies: {e}"))?;
		let cookies = cookies.into_iter().filter_map(|c| serde_json::to_value(c).ok()).collect();

		let mut origins = Vec::new();
		if let Some(origin) = capture_local_storage(page).await? {
			origins.push(origin);
		}

		Ok(Self { cookies, origins })
	}

	/// Re-injects cookies and replays local storage into a fresh browser.
	/// Visits each stored origin so the storage writes land in scope.
	pub async fn restore(&self, browser: &Browser, page: &Page) -> Result<()> {
		let params: Vec<CookieParam> = self.cookies.iter().filter_map(|v| serde_json::from_value(v.clone()).ok()).collect();
		if params.is_empty() {
			return Err(eyre!("Session file contains no restorable cookies"));
		}
		browser.set_cookies(params).await.map_err(|e| eyre!("Failed to set cookies: {e}"))?;

		for origin in &self.origins {
			if origin.entries.is_empty() {
				continue;
			}
			page.goto(origin.origin.as_str()).await.map_err(|e| eyre!("Failed to open {}: {e}", origin.origin))?;
			restore_local_storage(page, &origin.entries).await?;
		}

		Ok(())
	}
}

async fn capture_local_storage(page: &Page) -> Result<Option<OriginStorage>> {
	let script = r#"
		(function() {
			const entries = [];
			for (let i = 0; i < localStorage.length; i++) {
				const name = localStorage.key(i);
				entries.push({ name: name, value: localStorage.getItem(name) });
			}
			return JSON.stringify({ origin: location.origin, entries: entries });
		})()
	"#;

	let result = page.evaluate(script).await.map_err(|e| eyre!("Failed to snapshot local storage: {e}"))?;
	let Some(json_str) = result.value().and_then(|v| v.as_str()) else {
		return Ok(None);
	};
	let origin: OriginStorage = serde_json::from_str(json_str).map_err(|e| eyre!("Failed to parse storage snapshot: {e}"))?;
	Ok(Some(origin))
}

async fn restore_local_storage(page: &Page, entries: &[StorageEntry]) -> Result<()> {
	let payload = serde_json::to_string(entries)?;
	let script = format!(
		r#"
		(function() {{
			const entries = {payload};
			for (const e of entries) {{
				localStorage.setItem(e.name, e.value);
			}}
			return true;
		}})()
		"#
	);
	page.evaluate(script).await.map_err(|e| eyre!("Failed to restore local storage: {e}"))?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_file_is_not_found() {
		let path = std::env::temp_dir().join("leet_headless_no_such_session.json");
		let loaded = SessionState::load(&path).unwrap();
		assert!(loaded.is_none());
	}

	#[test]
	fn save_then_load_round_trips() {
		let path = std::env::temp_dir().join("leet_headless_session_roundtrip.json");
		let state = SessionState {
			cookies: vec![serde_json::json!({"name": "LEETCODE_SESSION", "value": "abc", "domain": ".leetcode.com", "path": "/"})],
			origins: vec![OriginStorage {
				origin: "https://leetcode.com".to_string(),
				entries: vec![StorageEntry { name: "theme".to_string(), value: "dark".to_string() }],
			}],
		};
		state.save(&path).unwrap();
		let loaded = SessionState::load(&path).unwrap().unwrap();
		assert_eq!(loaded.cookies.len(), 1);
		assert_eq!(loaded.origins[0].entries[0].name, "theme");
		std::fs::remove_file(&path).ok();
	}
}
