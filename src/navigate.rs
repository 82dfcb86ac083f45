//! Page navigation: every control on the site is located through an ordered
//! list of fallback strategies, first visible match wins. Absence is a
//! boolean result, never an error; the caller decides whether to degrade.

use std::{path::PathBuf, time::Duration};

use chromiumoxide::{Browser, Page, page::ScreenshotParams};
use color_eyre::{Result, eyre::eyre};

use crate::DAILY_CHALLENGE_URL;

/// Total time budget for one locate call.
const LOCATE_TIMEOUT: Duration = Duration::from_secs(8);
/// Re-poll interval while waiting for an element to show up.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// One way of finding a control, in decreasing order of specificity.
#[derive(Clone, Debug)]
pub enum Locator {
	/// Plain CSS selector
	Css(&'static str),
	/// Case-insensitive substring match on the text of elements matching
	/// `roots`
	Text { roots: &'static str, needle: &'static str },
	/// Anchor whose href contains the fragment
	HrefContains(&'static str),
}

/// Quotes a string as a JS string literal.
fn js_str(s: &str) -> String {
	format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

impl Locator {
	/// JS expression evaluating to the first matching element or null.
	fn finder_js(&self) -> String {
		match self {
			Locator::Css(sel) => format!("firstVisible(document.querySelectorAll({}))", js_str(sel)),
			Locator::Text { roots, needle } =>
				format!(
					"firstVisible(Array.from(document.querySelectorAll({})).filter(el => (el.textContent || '').trim().toLowerCase().includes({})))",
					js_str(roots),
					js_str(&needle.to_lowercase())
				),
			Locator::HrefContains(fragment) => format!("firstVisible(Array.from(document.querySelectorAll('a[href]')).filter(el => el.getAttribute('href').includes({})))", js_str(fragment)),
		}
	}
}

/// Builds one script that walks the strategy list in priority order and
/// clicks the first visible match, returning the index of the strategy that
/// won (-1 if none).
fn click_script(locators: &[Locator]) -> String {
	let finders: Vec<String> = locators.iter().map(|l| format!("() => {}", l.finder_js())).collect();
	format!(
		r#"
		(function() {{
			function firstVisible(list) {{
				for (const el of list) {{
					if (el && (el.offsetParent !== null || el.getClientRects().length > 0)) return el;
				}}
				return null;
			}}
			const finders = [{}];
			for (let i = 0; i < finders.length; i++) {{
				const el = finders[i]();
				if (el) {{
					el.scrollIntoView({{ block: 'center' }});
					el.click();
					return i;
				}}
			}}
			return -1;
		}})()
		"#,
		finders.join(", ")
	)
}

/// Clicks the first control the strategy list can find, re-polling until the
/// per-call deadline. Returns false if nothing matched in time.
pub async fn click_first(page: &Page, locators: &[Locator]) -> Result<bool> {
	let script = click_script(locators);
	let deadline = tokio::time::Instant::now() + LOCATE_TIMEOUT;
	loop {
		let result = page.evaluate(script.clone()).await.map_err(|e| eyre!("Locator script failed: {e}"))?;
		let matched = result.value().and_then(|v| v.as_i64()).unwrap_or(-1);
		if matched >= 0 {
			tracing::debug!("clicked via strategy #{matched}");
			return Ok(true);
		}
		if tokio::time::Instant::now() >= deadline {
			return Ok(false);
		}
		tokio::time::sleep(POLL_INTERVAL).await;
	}
}

/// Waits for a selector to resolve to a visible element, bounded by the
/// locate timeout.
pub async fn wait_for(page: &Page, selector: &str) -> Result<bool> {
	let sel = serde_json::to_string(selector)?;
	let script = format!(
		r#"
		(function() {{
			for (const el of document.querySelectorAll({sel})) {{
				if (el.offsetParent !== null || el.getClientRects().length > 0) return true;
			}}
			return false;
		}})()
		"#
	);
	let deadline = tokio::time::Instant::now() + LOCATE_TIMEOUT;
	loop {
		let result = page.evaluate(script.clone()).await.map_err(|e| eyre!("Wait script failed: {e}"))?;
		if result.value().and_then(|v| v.as_bool()) == Some(true) {
			return Ok(true);
		}
		if tokio::time::Instant::now() >= deadline {
			return Ok(false);
		}
		tokio::time::sleep(POLL_INTERVAL).await;
	}
}

/// Opens the challenge of the day. The site opens the problem in a new tab,
/// so the caller must adopt the returned page as its active handle.
pub async fn open_daily_challenge(browser: &Browser, page: &Page) -> Result<Page> {
	let locators = [
		Locator::Css(r#"a[href*="/problems/"][href*="envType=daily-question"]"#),
		Locator::Css(r#"[data-cy="daily-question-link"]"#),
		Locator::Css(r#"[data-testid="daily-question"]"#),
		Locator::Text { roots: "a, button", needle: "Today" },
		Locator::HrefContains("envType=daily-question"),
	];

	if click_first(page, &locators).await? {
		if let Some(tab) = adopt_problem_tab(browser).await? {
			return Ok(tab);
		}
		tracing::warn!("daily link clicked but no problem tab appeared, falling back to the problem listing");
	}

	// Fallback: open the daily listing directly and click the daily link
	// there; the listing itself is not a problem page.
	let fresh = browser.new_page(DAILY_CHALLENGE_URL).await.map_err(|e| eyre!("Failed to open the problem listing: {e}"))?;
	tokio::time::sleep(Duration::from_secs(3)).await;
	if !click_first(&fresh, &locators).await? {
		return Err(eyre!("Daily challenge link not found on the problem listing"));
	}
	match adopt_problem_tab(browser).await? {
		Some(tab) => Ok(tab),
		None => Err(eyre!("Daily challenge problem page never opened")),
	}
}

/// Scans the browser's tabs for a problem page, bounded. The daily link
/// usually opens a new tab but sometimes navigates in place; either way the
/// page list ends up holding the problem URL.
async fn adopt_problem_tab(browser: &Browser) -> Result<Option<Page>> {
	let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
	while tokio::time::Instant::now() < deadline {
		for candidate in browser.pages().await.map_err(|e| eyre!("Failed to list pages: {e}"))? {
			let url = candidate.url().await.ok().flatten().unwrap_or_default();
			if crate::is_daily_challenge_url(&url) {
				candidate.bring_to_front().await.ok();
				return Ok(Some(candidate));
			}
		}
		tokio::time::sleep(POLL_INTERVAL).await;
	}
	Ok(None)
}

/// Known alternate labels the dropdown may use for the same language.
pub fn language_synonyms(name: &str) -> Vec<String> {
	let mut variants = vec![name.to_string()];
	match name.to_lowercase().as_str() {
		"python3" => variants.push("Python".to_string()),
		"python" => variants.push("Python3".to_string()),
		"c++" | "cpp" => variants.extend(["C++".to_string(), "cpp".to_string()]),
		"c#" | "csharp" => variants.extend(["C#".to_string(), "csharp".to_string()]),
		"javascript" | "js" => variants.push("JavaScript".to_string()),
		"go" | "golang" => variants.extend(["Go".to_string(), "Golang".to_string()]),
		_ => {}
	}
	variants
}

/// Selects the preferred language in the editor dropdown. Non-fatal: returns
/// false if the dropdown or the option never shows up, and the run proceeds
/// with whatever language is already selected.
pub async fn select_language(page: &Page, name: &str) -> Result<bool> {
	let chevron = [
		Locator::Css(r#"svg[data-icon="chevron-down"]"#),
		Locator::Css("svg.fa-chevron-down"),
		Locator::Css("div.relative.text-gray-60 svg"),
		Locator::Css(r#"button[aria-haspopup="dialog"]"#),
	];
	if !click_first(page, &chevron).await? {
		tracing::warn!("language dropdown control not found");
		return Ok(false);
	}

	if !wait_for(page, r#"[role="dialog"][data-state="open"], [role="dialog"]"#).await? {
		tracing::warn!("language dropdown never opened");
		return Ok(false);
	}

	let variants = language_synonyms(name);
	let payload = serde_json::to_string(&variants)?;
	// Exact label match first (case-insensitive), then the synonym table, in
	// the order the variants list carries them.
	let script = format!(
		r#"
		(function() {{
			const variants = {payload}.map(v => v.toLowerCase());
			const dialog = document.querySelector('[role="dialog"]');
			if (!dialog) return false;
			const options = Array.from(dialog.querySelectorAll('div.text-text-primary, [role="option"], li'));
			for (const wanted of variants) {{
				for (const option of options) {{
					const label = (option.textContent || '').trim().toLowerCase();
					if (label === wanted) {{
						const target = option.closest('div.group.cursor-pointer, [role="option"], li') || option;
						target.click();
						return true;
					}}
				}}
			}}
			return false;
		}})()
		"#
	);

	let result = page.evaluate(script).await.map_err(|e| eyre!("Language selection script failed: {e}"))?;
	let selected = result.value().and_then(|v| v.as_bool()) == Some(true);
	if selected {
		tokio::time::sleep(Duration::from_secs(2)).await;
	} else {
		tracing::warn!("language {name} not present in dropdown");
	}
	Ok(selected)
}

pub async fn click_run(page: &Page) -> Result<bool> {
	let locators = [
		Locator::Css(r#"button[data-e2e-locator="console-run-button"]"#),
		Locator::Text { roots: "button", needle: "Run" },
		Locator::Css(r#"button[class*="run"]"#),
	];
	click_first(page, &locators).await
}

pub async fn click_submit(page: &Page) -> Result<bool> {
	let locators = [
		Locator::Css(r#"button[data-e2e-locator="console-submit-button"]"#),
		Locator::Text { roots: "button", needle: "Submit" },
		Locator::Css(r#"button[class*="submit"]"#),
	];
	click_first(page, &locators).await
}

pub async fn open_solutions_tab(page: &Page) -> Result<bool> {
	let locators = [
		Locator::Css("#solutions_tab"),
		Locator::Text { roots: r#"div[role="tab"], .flexlayout__tab_button"#, needle: "Solutions" },
		Locator::Text { roots: "div, button, a", needle: "Solutions" },
	];
	let opened = click_first(page, &locators).await?;
	if opened {
		tokio::time::sleep(Duration::from_secs(3)).await;
	}
	Ok(opened)
}

/// Opens the n-th entry in the community solutions listing (1-based). The
/// first entry is often editorial, so diversify retries start at rank 2.
pub async fn select_nth_solution(page: &Page, rank: usize) -> Result<bool> {
	let script = format!(
		r#"
		(function() {{
			const selectors = [
				'div.group.flex.w-full.cursor-pointer',
				'div[class*="group"][class*="cursor-pointer"]',
				'article'
			];
			for (const selector of selectors) {{
				const entries = Array.from(document.querySelectorAll(selector))
					.filter(el => el.offsetParent !== null || el.getClientRects().length > 0);
				if (entries.length >= {rank}) {{
					entries[{rank} - 1].click();
					return true;
				}}
			}}
			return false;
		}})()
		"#
	);
	let deadline = tokio::time::Instant::now() + LOCATE_TIMEOUT;
	loop {
		let result = page.evaluate(script.clone()).await.map_err(|e| eyre!("Solution list script failed: {e}"))?;
		if result.value().and_then(|v| v.as_bool()) == Some(true) {
			tokio::time::sleep(Duration::from_secs(3)).await;
			return Ok(true);
		}
		if tokio::time::Instant::now() >= deadline {
			return Ok(false);
		}
		tokio::time::sleep(POLL_INTERVAL).await;
	}
}

/// Switches back to the problem statement tab after browsing solutions.
pub async fn back_to_description(page: &Page) -> Result<bool> {
	let locators = [
		Locator::Css("#description_tab"),
		Locator::Text { roots: r#"div[role="tab"], .flexlayout__tab_button"#, needle: "Description" },
		Locator::Text { roots: "div, button", needle: "Description" },
	];
	let switched = click_first(page, &locators).await?;
	if switched {
		tokio::time::sleep(Duration::from_secs(2)).await;
	}
	Ok(switched)
}

/// Best-effort screenshot for post-mortem debugging of a failed step.
pub async fn save_failure_screenshot(page: &Page, label: &str) -> Result<PathBuf> {
	let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
	let path = PathBuf::from(format!("failure-{label}-{stamp}.png"));
	page.save_screenshot(ScreenshotParams::builder().full_page(true).build(), &path)
		.await
		.map_err(|e| eyre!("Failed to capture screenshot: {e}"))?;
	Ok(path)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn synonyms_cover_both_python_spellings() {
		assert!(language_synonyms("Python3").contains(&"Python".to_string()));
		assert!(language_synonyms("Python").contains(&"Python3".to_string()));
	}

	#[test]
	fn cpp_maps_to_both_labels() {
		let variants = language_synonyms("C++");
		assert!(variants.contains(&"cpp".to_string()));
		assert_eq!(variants[0], "C++");
	}

	#[test]
	fn unknown_language_passes_through() {
		assert_eq!(language_synonyms("Rust"), vec!["Rust".to_string()]);
	}

	#[test]
	fn click_script_orders_strategies() {
		let script = click_script(&[Locator::Css("#run"), Locator::Text { roots: "button", needle: "Run" }]);
		// CSS strategy must be compiled before the text strategy.
		let css_pos = script.find("#run").unwrap();
		assert!(script.find("querySelectorAll(\"button\")").unwrap() > css_pos);
	}

	#[test]
	fn js_str_escapes_quotes() {
		assert_eq!(js_str(r#"a[href*="daily"]"#), r#""a[href*=\"daily\"]""#);
	}
}
