//! Result interpretation: reads the judge panel after a run or a submit and
//! folds the displayed verdict into a closed outcome taxonomy. Classification
//! is pure so it can be tested against the label table directly.

use std::time::Duration;

use chromiumoxide::Page;
use color_eyre::{Result, eyre::eyre};
use serde::Deserialize;

/// How long to wait for the run verdict to render.
const RUN_RESULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Submissions queue server-side, so the budget is longer.
const SUBMIT_RESULT_TIMEOUT: Duration = Duration::from_secs(45);
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Closed verdict taxonomy. Each kind maps to one orchestrator policy:
/// accept, diversify, repair, or re-check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutcomeKind {
	Accepted,
	WrongAnswer,
	RuntimeError,
	CompileError,
	LimitExceeded,
	Unknown,
}

impl std::fmt::Display for OutcomeKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutcomeKind::Accepted => write!(f, "Accepted"),
			OutcomeKind::WrongAnswer => write!(f, "Wrong Answer"),
			OutcomeKind::RuntimeError => write!(f, "Runtime Error"),
			OutcomeKind::CompileError => write!(f, "Compile Error"),
			OutcomeKind::LimitExceeded => write!(f, "Limit Exceeded"),
			OutcomeKind::Unknown => write!(f, "Unknown"),
		}
	}
}

/// A classified verdict plus whatever diagnostic text the panel offered.
/// The diagnostic feeds the repair prompt, so scraping it is best-effort
/// but worth the extra pass.
#[derive(Clone, Debug)]
pub struct Outcome {
	pub kind: OutcomeKind,
	pub label: String,
	pub diagnostic: Option<String>,
	/// "X / Y testcases passed", when the panel shows it.
	pub testcases: Option<(u32, u32)>,
}

impl Outcome {
	pub fn unknown() -> Self {
		Self { kind: OutcomeKind::Unknown, label: String::new(), diagnostic: None, testcases: None }
	}
}

/// Folds a verdict label into the taxonomy. Only the exact word
/// "Accepted" counts as accepted; anything unrecognized is Unknown.
pub fn classify(label: &str) -> OutcomeKind {
	let label = label.trim();
	if label.eq_ignore_ascii_case("accepted") {
		return OutcomeKind::Accepted;
	}
	if label.contains("Wrong Answer") {
		return OutcomeKind::WrongAnswer;
	}
	if label.contains("Runtime Error") {
		return OutcomeKind::RuntimeError;
	}
	if label.contains("Compilation Error") || label.contains("Compile Error") {
		return OutcomeKind::CompileError;
	}
	if label.contains("Time Limit Exceeded") || label.contains("Memory Limit Exceeded") || label.contains("Output Limit Exceeded") {
		return OutcomeKind::LimitExceeded;
	}
	OutcomeKind::Unknown
}

/// Pulls "X / Y testcases passed" out of the panel text, if present.
pub fn parse_testcase_counter(text: &str) -> Option<(u32, u32)> {
	let re = regex::Regex::new(r"(\d+)\s*/\s*(\d+)\s+test\s*cases?\s+passed").ok()?;
	let lowered = text.to_lowercase();
	let caps = re.captures(&lowered)?;
	let passed = caps.get(1)?.as_str().parse().ok()?;
	let total = caps.get(2)?.as_str().parse().ok()?;
	Some((passed, total))
}

#[derive(Debug, Deserialize)]
struct PanelScrape {
	label: String,
	#[serde(default)]
	diagnostic: Option<String>,
	#[serde(default)]
	panel_text: Option<String>,
}

/// One pass over the verdict panel: verdict label plus failing-case details
/// (input, actual output, expected output, or the compiler message).
async fn scrape_panel(page: &Page, result_selector: &str) -> Result<Option<PanelScrape>> {
	let sel = serde_json::to_string(result_selector)?;
	let script = format!(
		r#"
		(function() {{
			const panel = document.querySelector({sel});
			if (!panel || !panel.textContent || !panel.textContent.trim()) return null;
			const label = panel.textContent.trim();

			const parts = [];
			const labels = ['Input', 'Output', 'Expected'];
			const rows = Array.from(document.querySelectorAll('div.group.relative, div[class*="console"] div'));
			for (const want of labels) {{
				for (const row of rows) {{
					const text = (row.textContent || '').trim();
					if (text.startsWith(want) && text.length > want.length && text.length < 2000) {{
						parts.push(text);
						break;
					}}
				}}
			}}
			for (const block of document.querySelectorAll('div.whitespace-pre-wrap, pre')) {{
				const text = (block.textContent || '').trim();
				if (text && (label.includes('Error') || label.includes('Exceeded')) && text.length < 4000) {{
					parts.push(text);
					break;
				}}
			}}

			const container = panel.closest('div[class*="result"]') || panel.parentElement;
			return JSON.stringify({{
				label: label,
				diagnostic: parts.length ? parts.join('\n') : null,
				panel_text: container ? container.textContent : null
			}});
		}})()
		"#
	);
	let result = page.evaluate(script).await.map_err(|e| eyre!("Verdict scrape failed: {e}"))?;
	match result.value().and_then(|v| v.as_str()) {
		Some(json) => Ok(Some(serde_json::from_str(json)?)),
		None => Ok(None),
	}
}

async fn check_result(page: &Page, result_selector: &str, timeout: Duration) -> Result<Outcome> {
	let deadline = tokio::time::Instant::now() + timeout;
	loop {
		if let Some(scrape) = scrape_panel(page, result_selector).await? {
			let kind = classify(&scrape.label);
			// "Pending"/"Judging" style labels classify as Unknown; keep
			// polling until the deadline before reporting that.
			if kind != OutcomeKind::Unknown || tokio::time::Instant::now() >= deadline {
				let testcases = scrape.panel_text.as_deref().and_then(parse_testcase_counter);
				return Ok(Outcome { kind, label: scrape.label, diagnostic: scrape.diagnostic, testcases });
			}
		}
		if tokio::time::Instant::now() >= deadline {
			return Ok(Outcome::unknown());
		}
		tokio::time::sleep(POLL_INTERVAL).await;
	}
}

/// Waits for the console run verdict and classifies it.
pub async fn check_run_result(page: &Page) -> Result<Outcome> {
	check_result(page, r#"div[data-e2e-locator="console-result"]"#, RUN_RESULT_TIMEOUT).await
}

/// Waits for the submission verdict. A different panel than the run console,
/// with a longer budget since submissions queue server-side.
pub async fn check_submission_result(page: &Page) -> Result<Outcome> {
	check_result(page, r#"div[data-e2e-locator="submission-result"], span[data-e2e-locator="submission-result"]"#, SUBMIT_RESULT_TIMEOUT).await
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_exact_accepted_is_accepted() {
		assert_eq!(classify("Accepted"), OutcomeKind::Accepted);
		assert_eq!(classify("  accepted  "), OutcomeKind::Accepted);
		assert_eq!(classify("Not Accepted"), OutcomeKind::Unknown);
		assert_eq!(classify("Accepted!"), OutcomeKind::Unknown);
	}

	#[test]
	fn known_failure_labels_classify() {
		assert_eq!(classify("Wrong Answer"), OutcomeKind::WrongAnswer);
		assert_eq!(classify("Runtime Error"), OutcomeKind::RuntimeError);
		assert_eq!(classify("Compilation Error"), OutcomeKind::CompileError);
		assert_eq!(classify("Compile Error"), OutcomeKind::CompileError);
		assert_eq!(classify("Time Limit Exceeded"), OutcomeKind::LimitExceeded);
		assert_eq!(classify("Memory Limit Exceeded"), OutcomeKind::LimitExceeded);
		assert_eq!(classify("Output Limit Exceeded"), OutcomeKind::LimitExceeded);
	}

	#[test]
	fn decorated_labels_still_classify() {
		assert_eq!(classify("Wrong Answer · 3 ms"), OutcomeKind::WrongAnswer);
	}

	#[test]
	fn gibberish_is_unknown() {
		assert_eq!(classify("Judging"), OutcomeKind::Unknown);
		assert_eq!(classify(""), OutcomeKind::Unknown);
	}

	#[test]
	fn testcase_counter_parses() {
		assert_eq!(parse_testcase_counter("3 / 21 testcases passed"), Some((3, 21)));
		assert_eq!(parse_testcase_counter("20/21 test cases passed"), Some((20, 21)));
		assert_eq!(parse_testcase_counter("3 / 21 Testcases Passed"), Some((3, 21)));
		assert_eq!(parse_testcase_counter("no counter here"), None);
	}
}
