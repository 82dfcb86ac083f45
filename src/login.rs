//! Login handling. The site's login flow involves captchas and third-party
//! identity providers, so first login is manual: `setup` opens a visible
//! browser, the user signs in, and the session is captured for later
//! headless runs.

use std::path::Path;

use chromiumoxide::{Browser, Page};
use color_eyre::{Result, eyre::eyre};
use tokio::io::{AsyncBufReadExt as _, BufReader};

use crate::session::SessionState;

const LOGIN_URL: &str = "https://leetcode.com/accounts/login/";
/// Elements that only render for an authenticated user.
const LOGGED_IN_SELECTORS: &str = r#"[data-cy="user-avatar"], .nav-user-icon-base, img[class*="avatar"], a[href="/profile/"]"#;

/// True when the page shows a logged-in chrome (avatar or profile link).
pub async fn is_logged_in(page: &Page) -> Result<bool> {
	let script = format!(
		r#"
		(function() {{
			for (const el of document.querySelectorAll('{LOGGED_IN_SELECTORS}')) {{
				if (el.offsetParent !== null || el.getClientRects().length > 0) return true;
			}}
			return false;
		}})()
		"#
	);
	let result = page.evaluate(script).await.map_err(|e| eyre!("Login check failed: {e}"))?;
	Ok(result.value().and_then(|v| v.as_bool()) == Some(true))
}

/// Validates a restored session by loading the home page and looking for the
/// logged-in chrome. Bounded; a stale session is a `false`, not an error.
pub async fn validate_session(page: &Page) -> Result<bool> {
	page.goto("https://leetcode.com/").await.map_err(|e| eyre!("Failed to open home page: {e}"))?;
	tokio::time::sleep(tokio::time::Duration::from_secs(3)).await;

	for _ in 0..5 {
		if is_logged_in(page).await? {
			return Ok(true);
		}
		tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
	}
	Ok(false)
}

/// Interactive first-time setup: opens the login page in the (visible)
/// browser, waits for the user to finish signing in, then captures the
/// session to `auth_path`.
pub async fn interactive_setup(browser: &Browser, page: &Page, auth_path: &Path) -> Result<()> {
	page.goto(LOGIN_URL).await.map_err(|e| eyre!("Failed to open login page: {e}"))?;
	tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

	eprintln!("Sign in in the browser window (any method works, captcha included).");
	eprintln!("Press Enter here once you can see your avatar in the top-right corner.");

	let mut line = String::new();
	BufReader::new(tokio::io::stdin()).read_line(&mut line).await.map_err(|e| eyre!("Failed to read confirmation: {e}"))?;

	// Confirm before capturing, otherwise we would persist an anonymous
	// session that fails on every later run.
	let mut confirmed = false;
	for _ in 0..10 {
		if is_logged_in(page).await? {
			confirmed = true;
			break;
		}
		tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
	}
	if !confirmed {
		return Err(eyre!("Could not confirm a signed-in session; finish logging in and run setup again"));
	}

	let state = SessionState::capture(browser, page).await?;
	state.save(auth_path)?;
	tracing::info!("session captured to {}", auth_path.display());
	eprintln!("Session saved. Headless runs will reuse it until it expires.");
	Ok(())
}
