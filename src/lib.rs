use std::fmt;

use serde::{Deserialize, Serialize};

pub mod config;
pub mod editor;
pub mod extract;
pub mod llm;
pub mod login;
pub mod navigate;
pub mod outcome;
pub mod runner;
pub mod session;

/// Problem listing entry point for the challenge of the day.
pub const DAILY_CHALLENGE_URL: &str = "https://leetcode.com/problemset/all/?envType=daily-question";

/// Detects if a URL points at an actual problem page. The daily listing
/// itself carries the `envType=daily-question` query too, so only the
/// `/problems/` path segment counts.
pub fn is_daily_challenge_url(url: &str) -> bool {
	url.contains("/problems/")
}

/// Everything scraped from the problem page, captured once per run.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ProblemSnapshot {
	/// Problem title as rendered in the page header
	pub title: String,
	/// Statement text preceding the first example
	pub statement: String,
	/// "Example N: ..." blocks, in page order
	pub examples: Vec<String>,
	/// Text following the "Constraints:" marker, when the page has one
	pub constraints: Option<String>,
	/// Starter template read from the code editor
	pub starter_code: String,
}

impl fmt::Display for ProblemSnapshot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "{}", self.title)?;
		writeln!(f)?;
		writeln!(f, "{}", self.statement)?;
		for example in &self.examples {
			writeln!(f)?;
			writeln!(f, "{example}")?;
		}
		if let Some(constraints) = &self.constraints {
			writeln!(f)?;
			writeln!(f, "Constraints:")?;
			writeln!(f, "{constraints}")?;
		}
		Ok(())
	}
}

/// Where a candidate solution came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CandidateOrigin {
	/// First solution produced by the model from the problem alone
	Generated,
	/// Model repair of a previous candidate using run diagnostics
	GeneratedFix,
	/// Community-posted solution, adapted to the template
	Community,
}

impl fmt::Display for CandidateOrigin {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CandidateOrigin::Generated => write!(f, "generated"),
			CandidateOrigin::GeneratedFix => write!(f, "generated-fix"),
			CandidateOrigin::Community => write!(f, "community"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn problem_pages_match_the_listing_does_not() {
		assert!(is_daily_challenge_url("https://leetcode.com/problems/two-sum/?envType=daily-question&envId=2026-08-30"));
		assert!(is_daily_challenge_url("https://leetcode.com/problems/two-sum/description/"));
		assert!(!is_daily_challenge_url(DAILY_CHALLENGE_URL));
		assert!(!is_daily_challenge_url("https://leetcode.com/"));
	}
}
