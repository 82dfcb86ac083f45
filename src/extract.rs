//! Content extraction: problem statement, starter code, and community
//! solutions, each behind a tiered fallback chain. Extraction returns
//! `Ok(None)` when the page simply does not have the content yet; errors are
//! reserved for broken evaluation.

use std::time::Duration;

use chromiumoxide::Page;
use color_eyre::{Result, eyre::eyre};
use serde::Deserialize;

use crate::{ProblemSnapshot, navigate};

/// Per-language skeleton used when neither the visible editor lines nor the
/// editor model yield the starter code.
pub fn placeholder_starter(language: &str) -> String {
	match language.to_lowercase().as_str() {
		"python" | "python3" => "class Solution:\n    def solve(self):\n        pass\n".to_string(),
		"java" => "class Solution {\n    public void solve() {\n    }\n}\n".to_string(),
		"c++" | "cpp" => "class Solution {\npublic:\n    void solve() {\n    }\n};\n".to_string(),
		"javascript" | "js" => "var solve = function() {\n};\n".to_string(),
		_ => "// implement Solution here\n".to_string(),
	}
}

/// Splits the raw description text into statement / examples / constraints.
/// Examples are delimited by "Example N:" headings; everything after
/// "Constraints:" is the constraints block.
pub fn partition_description(text: &str) -> (String, Vec<String>, Option<String>) {
	let example_re = regex::Regex::new(r"(?m)^\s*Example\s+\d+\s*:").ok();
	let constraints_re = regex::Regex::new(r"(?m)^\s*Constraints\s*:").ok();

	let (before_constraints, constraints) = match constraints_re.as_ref().and_then(|re| re.find(text)) {
		Some(m) => {
			let tail = text[m.end()..].trim();
			(&text[..m.start()], if tail.is_empty() { None } else { Some(tail.to_string()) })
		}
		None => (text, None),
	};

	let marks: Vec<(usize, usize)> = example_re.as_ref().map(|re| re.find_iter(before_constraints).map(|m| (m.start(), m.end())).collect()).unwrap_or_default();

	if marks.is_empty() {
		return (before_constraints.trim().to_string(), Vec::new(), constraints);
	}

	let statement = before_constraints[..marks[0].0].trim().to_string();
	let mut examples = Vec::with_capacity(marks.len());
	for (i, &(start, _)) in marks.iter().enumerate() {
		let end = marks.get(i + 1).map_or(before_constraints.len(), |&(next, _)| next);
		let body = before_constraints[start..end].trim();
		if !body.is_empty() {
			examples.push(body.to_string());
		}
	}
	(statement, examples, constraints)
}

#[derive(Debug, Deserialize)]
struct PageScrape {
	title: String,
	description: String,
}

/// Reads the problem title and statement off the description pane. Returns
/// `Ok(None)` if the pane never renders within the locate budget.
pub async fn extract_problem(page: &Page, language: &str) -> Result<Option<ProblemSnapshot>> {
	if !navigate::wait_for(page, r#"[data-track-load="description_content"]"#).await? {
		tracing::warn!("description pane did not render");
		return Ok(None);
	}

	let script = r#"
		(function() {
			const titleSelectors = [
				'[data-cy="question-title"]',
				'div.text-title-large a',
				'a[href*="/problems/"].no-underline',
				'h4'
			];
			let title = '';
			for (const selector of titleSelectors) {
				const el = document.querySelector(selector);
				if (el && el.textContent && el.textContent.trim()) {
					title = el.textContent.trim();
					break;
				}
			}

			const pane = document.querySelector('[data-track-load="description_content"]');
			if (!pane) return null;
			let description = pane.textContent || '';
			const blocks = Array.from(pane.querySelectorAll('p, pre, ul, ol')).map(el => (el.textContent || '').trim()).filter(Boolean);
			if (blocks.length) description = blocks.join('\n');
			if (!description.trim()) return null;

			return JSON.stringify({ title: title, description: description });
		})()
	"#;

	let result = page.evaluate(script).await.map_err(|e| eyre!("Description scrape failed: {e}"))?;
	let Some(json) = result.value().and_then(|v| v.as_str()) else {
		return Ok(None);
	};
	let scrape: PageScrape = serde_json::from_str(json)?;

	let (statement, examples, constraints) = partition_description(&scrape.description);
	let starter_code = extract_starter_code(page, language).await?;

	Ok(Some(ProblemSnapshot {
		title: if scrape.title.is_empty() { "Daily Challenge".to_string() } else { scrape.title },
		statement,
		examples,
		constraints,
		starter_code,
	}))
}

/// Reads the starter code out of the editor. Three tiers: the rendered
/// `.view-line` spans, the monaco model, then a hard-coded skeleton.
pub async fn extract_starter_code(page: &Page, language: &str) -> Result<String> {
	if !navigate::wait_for(page, ".monaco-editor").await? {
		tracing::warn!("editor did not render, using skeleton starter code");
		return Ok(placeholder_starter(language));
	}
	// Let monaco finish laying the lines out.
	tokio::time::sleep(Duration::from_secs(2)).await;

	let script = r#"
		(function() {
			const lines = Array.from(document.querySelectorAll('.monaco-editor .view-line'));
			if (lines.length) {
				// view-lines render out of order; sort by on-screen position.
				lines.sort((a, b) => a.getBoundingClientRect().top - b.getBoundingClientRect().top);
				const text = lines.map(l => l.textContent || '').join('\n');
				if (text.trim()) return text;
			}
			if (window.monaco && window.monaco.editor) {
				const models = window.monaco.editor.getModels();
				if (models.length) {
					const text = models[0].getValue();
					if (text && text.trim()) return text;
				}
			}
			return null;
		})()
	"#;

	let result = page.evaluate(script).await.map_err(|e| eyre!("Starter code scrape failed: {e}"))?;
	match result.value().and_then(|v| v.as_str()) {
		// monaco uses non-breaking spaces for indentation
		Some(code) => Ok(code.replace('\u{a0}', " ")),
		None => {
			tracing::warn!("starter code not found, using skeleton");
			Ok(placeholder_starter(language))
		}
	}
}

/// Minimum plausible length for a scraped community solution, per tier.
const MIN_CODE_BLOCK_LEN: usize = 50;
const MIN_TEXT_GUESS_LEN: usize = 100;

/// Scrapes the code out of an opened community solution post. Tiers: the
/// post's dedicated code blocks, then any pre/code element, then the longest
/// chunk of text that looks like code. Longest plausible match wins.
pub async fn extract_community_solution(page: &Page) -> Result<Option<String>> {
	tokio::time::sleep(Duration::from_secs(2)).await;

	let script = format!(
		r#"
		(function() {{
			function longest(candidates, minLen) {{
				let best = null;
				for (const text of candidates) {{
					if (text.length >= minLen && (!best || text.length > best.length)) best = text;
				}}
				return best;
			}}

			const hooked = Array.from(document.querySelectorAll('div.break-words pre code, div.break-words pre'))
				.map(el => (el.textContent || '').trim()).filter(Boolean);
			let best = longest(hooked, {MIN_CODE_BLOCK_LEN});
			if (best) return best;

			const generic = Array.from(document.querySelectorAll('pre code, pre'))
				.map(el => (el.textContent || '').trim()).filter(Boolean);
			best = longest(generic, {MIN_CODE_BLOCK_LEN});
			if (best) return best;

			const keywords = ['class Solution', 'def ', 'function ', 'public ', '#include'];
			const guesses = Array.from(document.querySelectorAll('div'))
				.map(el => (el.textContent || '').trim())
				.filter(text => keywords.some(k => text.includes(k)) && text.length < 8000);
			return longest(guesses, {MIN_TEXT_GUESS_LEN});
		}})()
		"#
	);

	let result = page.evaluate(script).await.map_err(|e| eyre!("Community solution scrape failed: {e}"))?;
	Ok(result.value().and_then(|v| v.as_str()).map(|code| code.replace('\u{a0}', " ")))
}

#[cfg(test)]
mod tests {
	use super::*;

	const SAMPLE: &str = "Given an array of integers, return the sum.\n\
		Example 1:\nInput: [1,2]\nOutput: 3\n\
		Example 2:\nInput: [0]\nOutput: 0\n\
		Constraints:\n1 <= n <= 100";

	#[test]
	fn partitions_statement_examples_constraints() {
		let (statement, examples, constraints) = partition_description(SAMPLE);
		assert_eq!(statement, "Given an array of integers, return the sum.");
		assert_eq!(examples.len(), 2);
		assert!(examples[0].starts_with("Example 1:"));
		assert!(examples[1].contains("Output: 0"));
		assert_eq!(constraints.as_deref(), Some("1 <= n <= 100"));
	}

	#[test]
	fn no_markers_means_everything_is_statement() {
		let (statement, examples, constraints) = partition_description("Just a plain statement.");
		assert_eq!(statement, "Just a plain statement.");
		assert!(examples.is_empty());
		assert!(constraints.is_none());
	}

	#[test]
	fn constraints_without_examples() {
		let (statement, examples, constraints) = partition_description("Do the thing.\nConstraints:\nn >= 1");
		assert_eq!(statement, "Do the thing.");
		assert!(examples.is_empty());
		assert_eq!(constraints.as_deref(), Some("n >= 1"));
	}

	#[test]
	fn placeholder_matches_language() {
		assert!(placeholder_starter("Python3").contains("class Solution:"));
		assert!(placeholder_starter("Rust").contains("implement Solution"));
	}
}
