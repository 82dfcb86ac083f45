//! The solve loop. Candidate production and verdict handling are split
//! behind the [`Harness`] trait so the retry policy can be exercised
//! without a browser.

use color_eyre::Result;

use crate::{
	CandidateOrigin, ProblemSnapshot,
	config::AppConfig,
	editor, extract,
	llm::LlmClient,
	navigate,
	outcome::{Outcome, OutcomeKind},
};

/// Everything the orchestrator needs from the outside world: candidate
/// sources and the run/submit cycle.
#[allow(async_fn_in_trait)]
pub trait Harness {
	/// Fresh solution for the problem.
	async fn generate(&mut self, problem: &ProblemSnapshot, language: &str) -> Result<String>;
	/// Corrected version of a candidate that failed with a diagnostic.
	async fn repair(&mut self, problem: &ProblemSnapshot, language: &str, failed: &str, outcome: &Outcome) -> Result<String>;
	/// Ready-to-paste source derived from the rank-th community solution,
	/// or None when the listing has no usable entry at that rank.
	async fn community(&mut self, problem: &ProblemSnapshot, language: &str, rank: usize) -> Result<Option<String>>;
	/// Writes the source into the editor and runs the sample tests.
	async fn write_and_run(&mut self, source: &str) -> Result<Outcome>;
	/// Runs the sample tests again on whatever is already in the editor.
	async fn rerun(&mut self) -> Result<Outcome>;
	/// Submits the current editor content against the hidden tests.
	async fn submit(&mut self) -> Result<Outcome>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveEnd {
	/// Submission accepted (or accepted locally under --no-submit).
	Done,
	/// Attempt budget exhausted or no candidate could be produced.
	Abandoned,
}

#[derive(Clone, Debug)]
pub struct AttemptRecord {
	pub origin: CandidateOrigin,
	pub outcome: OutcomeKind,
	/// Verdict of the submission, when this attempt got that far.
	pub submitted: Option<OutcomeKind>,
}

#[derive(Debug)]
pub struct SolveReport {
	pub end: SolveEnd,
	pub attempts: Vec<AttemptRecord>,
}

pub struct Orchestrator {
	max_attempts: usize,
	solution_rank: usize,
	no_submit: bool,
}

impl Orchestrator {
	pub fn new(config: &AppConfig) -> Self {
		Self {
			max_attempts: config.max_attempts,
			solution_rank: config.solution_rank,
			no_submit: config.no_submit,
		}
	}

	/// Runs the retry loop to completion. Verdict policy:
	/// - accepted runs are confirmed with a second run before submitting;
	/// - wrong answers switch to a community solution (never a repair,
	///   the approach itself is wrong);
	/// - runtime/compile/limit failures go back to the model with the
	///   diagnostic;
	/// - unrecognized verdicts re-run the same candidate;
	/// - a post-submit wrong answer diversifies one rank deeper.
	/// Every run consumes one attempt out of the fixed budget.
	pub async fn drive<H: Harness>(&self, harness: &mut H, problem: &ProblemSnapshot, language: &str) -> Result<SolveReport> {
		let mut report = SolveReport { end: SolveEnd::Abandoned, attempts: Vec::new() };

		let mut source = match harness.generate(problem, language).await {
			Ok(code) => code,
			Err(e) => {
				tracing::error!("could not produce an initial candidate: {e:#}");
				return Ok(report);
			}
		};
		let mut origin = CandidateOrigin::Generated;
		// Rank of the next community solution to try. Starts past the
		// editorial pin and deepens on every fetch.
		let mut rank = self.solution_rank;
		let mut pending_write = true;

		for attempt in 1..=self.max_attempts {
			let mut outcome = if pending_write { harness.write_and_run(&source).await? } else { harness.rerun().await? };
			pending_write = true;
			tracing::info!("attempt {attempt}/{}: {origin} candidate -> {}", self.max_attempts, outcome.kind);

			if outcome.kind == OutcomeKind::Accepted {
				// Panels flake; only a second accepted run unlocks submit.
				let confirm = harness.rerun().await?;
				if confirm.kind == OutcomeKind::Accepted {
					if self.no_submit {
						report.attempts.push(AttemptRecord { origin, outcome: OutcomeKind::Accepted, submitted: None });
						report.end = SolveEnd::Done;
						return Ok(report);
					}
					let verdict = harness.submit().await?;
					report.attempts.push(AttemptRecord { origin, outcome: OutcomeKind::Accepted, submitted: Some(verdict.kind) });
					match verdict.kind {
						OutcomeKind::Accepted => {
							report.end = SolveEnd::Done;
							return Ok(report);
						}
						OutcomeKind::WrongAnswer => {
							// Hidden tests disagreed with the samples; the
							// approach is wrong, go deeper in the listing.
							if let Some((passed, total)) = verdict.testcases {
								tracing::info!("{passed}/{total} testcases passed");
							}
							tracing::warn!("submission rejected ({}), diversifying", verdict.label);
							// A candidate produced now would have no run left.
							if attempt == self.max_attempts {
								break;
							}
							match self.diversify(harness, problem, language, &mut rank).await {
								Some(code) => {
									source = code;
									origin = CandidateOrigin::Community;
									continue;
								}
								None => return Ok(report),
							}
						}
						_ => {
							tracing::error!("submission failed with {}", verdict.kind);
							return Ok(report);
						}
					}
				}
				// The confirmation verdict governs this attempt.
				tracing::warn!("confirmation run disagreed: {}", confirm.kind);
				outcome = confirm;
			}

			report.attempts.push(AttemptRecord { origin, outcome: outcome.kind, submitted: None });

			// The budget is spent; producing another candidate would only
			// throw it away.
			if attempt == self.max_attempts {
				break;
			}

			match outcome.kind {
				OutcomeKind::WrongAnswer => match self.diversify(harness, problem, language, &mut rank).await {
					Some(code) => {
						source = code;
						origin = CandidateOrigin::Community;
					}
					None => return Ok(report),
				},
				OutcomeKind::RuntimeError | OutcomeKind::CompileError | OutcomeKind::LimitExceeded => match harness.repair(problem, language, &source, &outcome).await {
					Ok(code) => {
						source = code;
						origin = CandidateOrigin::GeneratedFix;
					}
					Err(e) => {
						tracing::error!("repair failed: {e:#}");
						return Ok(report);
					}
				},
				OutcomeKind::Unknown => {
					// Could be a panel that never rendered; re-run the same
					// candidate instead of discarding it.
					pending_write = false;
				}
				OutcomeKind::Accepted => unreachable!("accepted verdicts are handled above"),
			}
		}

		tracing::warn!("attempt budget exhausted after {} attempts", self.max_attempts);
		Ok(report)
	}

	/// Fetches and adapts the next community solution, advancing the rank.
	/// None means the candidate pipeline is out of options.
	async fn diversify<H: Harness>(&self, harness: &mut H, problem: &ProblemSnapshot, language: &str, rank: &mut usize) -> Option<String> {
		let fetched = harness.community(problem, language, *rank).await;
		*rank += 1;
		match fetched {
			Ok(Some(code)) => Some(code),
			Ok(None) => {
				tracing::error!("no usable community solution at rank {}", *rank - 1);
				None
			}
			Err(e) => {
				tracing::error!("community fetch failed: {e:#}");
				None
			}
		}
	}
}

/// Production harness: drives the real page and the real model.
pub struct BrowserHarness<'a> {
	pub page: &'a chromiumoxide::Page,
	pub llm: &'a LlmClient,
}

impl Harness for BrowserHarness<'_> {
	async fn generate(&mut self, problem: &ProblemSnapshot, language: &str) -> Result<String> {
		self.llm.generate_solution(problem, language).await
	}

	async fn repair(&mut self, problem: &ProblemSnapshot, language: &str, failed: &str, outcome: &Outcome) -> Result<String> {
		self.llm.repair_solution(problem, language, failed, &outcome.kind.to_string(), outcome.diagnostic.as_deref()).await
	}

	async fn community(&mut self, problem: &ProblemSnapshot, language: &str, rank: usize) -> Result<Option<String>> {
		if !navigate::open_solutions_tab(self.page).await? {
			return Ok(None);
		}
		let scraped = if navigate::select_nth_solution(self.page, rank).await? {
			extract::extract_community_solution(self.page).await?
		} else {
			None
		};
		// Always switch back, even when the scrape came up empty.
		navigate::back_to_description(self.page).await?;
		match scraped {
			Some(code) => Ok(Some(self.llm.adapt_solution(problem, language, &code).await?)),
			None => Ok(None),
		}
	}

	async fn write_and_run(&mut self, source: &str) -> Result<Outcome> {
		editor::write_source(self.page, source).await?;
		tokio::time::sleep(std::time::Duration::from_secs(1)).await;
		// A run on a half-written buffer burns an attempt; verify the paste.
		match editor::read_back(self.page).await? {
			Some(buffer) if buffer.trim().len() >= source.trim().len() / 2 => {}
			_ => tracing::warn!("editor buffer looks incomplete after write"),
		}
		self.rerun().await
	}

	async fn rerun(&mut self) -> Result<Outcome> {
		if !navigate::click_run(self.page).await? {
			tracing::warn!("run button not found");
			return Ok(Outcome::unknown());
		}
		crate::outcome::check_run_result(self.page).await
	}

	async fn submit(&mut self) -> Result<Outcome> {
		if !navigate::click_submit(self.page).await? {
			tracing::warn!("submit button not found");
			return Ok(Outcome::unknown());
		}
		crate::outcome::check_submission_result(self.page).await
	}
}

#[cfg(test)]
mod tests {
	use std::collections::VecDeque;

	use super::*;

	fn outcome(kind: OutcomeKind) -> Outcome {
		Outcome { kind, label: kind.to_string(), diagnostic: None, testcases: None }
	}

	/// Harness scripted with queues of verdicts; counts every call.
	#[derive(Default)]
	struct Scripted {
		run_verdicts: VecDeque<OutcomeKind>,
		submit_verdicts: VecDeque<OutcomeKind>,
		generate_calls: usize,
		repair_calls: usize,
		community_ranks: Vec<usize>,
		submit_calls: usize,
		community_available: bool,
	}

	impl Harness for Scripted {
		async fn generate(&mut self, _problem: &ProblemSnapshot, _language: &str) -> Result<String> {
			self.generate_calls += 1;
			Ok("generated".to_string())
		}

		async fn repair(&mut self, _problem: &ProblemSnapshot, _language: &str, _failed: &str, _outcome: &Outcome) -> Result<String> {
			self.repair_calls += 1;
			Ok("repaired".to_string())
		}

		async fn community(&mut self, _problem: &ProblemSnapshot, _language: &str, rank: usize) -> Result<Option<String>> {
			self.community_ranks.push(rank);
			Ok(self.community_available.then(|| format!("community-{rank}")))
		}

		async fn write_and_run(&mut self, _source: &str) -> Result<Outcome> {
			Ok(outcome(self.run_verdicts.pop_front().unwrap_or(OutcomeKind::Unknown)))
		}

		async fn rerun(&mut self) -> Result<Outcome> {
			Ok(outcome(self.run_verdicts.pop_front().unwrap_or(OutcomeKind::Unknown)))
		}

		async fn submit(&mut self) -> Result<Outcome> {
			self.submit_calls += 1;
			Ok(outcome(self.submit_verdicts.pop_front().unwrap_or(OutcomeKind::Unknown)))
		}
	}

	fn problem() -> ProblemSnapshot {
		ProblemSnapshot {
			title: "Two Sum".to_string(),
			statement: "Find two numbers.".to_string(),
			examples: vec![],
			constraints: None,
			starter_code: "class Solution:".to_string(),
		}
	}

	fn orchestrator(max_attempts: usize, no_submit: bool) -> Orchestrator {
		Orchestrator { max_attempts, solution_rank: 2, no_submit }
	}

	#[tokio::test]
	async fn unknown_verdicts_exhaust_the_budget() {
		let mut harness = Scripted { run_verdicts: VecDeque::from(vec![OutcomeKind::Unknown; 5]), ..Default::default() };
		let report = orchestrator(3, false).drive(&mut harness, &problem(), "Python3").await.unwrap();

		assert_eq!(report.end, SolveEnd::Abandoned);
		assert_eq!(report.attempts.len(), 3);
		assert_eq!(harness.generate_calls, 1);
		assert_eq!(harness.repair_calls, 0);
		assert!(harness.community_ranks.is_empty());
		assert_eq!(harness.submit_calls, 0);
	}

	#[tokio::test]
	async fn wrong_answer_diversifies_instead_of_repairing() {
		let mut harness = Scripted {
			// attempt 1 run: WA; attempt 2 run + confirmation: accepted
			run_verdicts: VecDeque::from(vec![OutcomeKind::WrongAnswer, OutcomeKind::Accepted, OutcomeKind::Accepted]),
			submit_verdicts: VecDeque::from(vec![OutcomeKind::Accepted]),
			community_available: true,
			..Default::default()
		};
		let report = orchestrator(3, false).drive(&mut harness, &problem(), "Python3").await.unwrap();

		assert_eq!(report.end, SolveEnd::Done);
		assert_eq!(harness.repair_calls, 0);
		assert_eq!(harness.community_ranks, vec![2]);
		assert_eq!(report.attempts.last().unwrap().origin, CandidateOrigin::Community);
	}

	#[tokio::test]
	async fn runtime_error_goes_back_for_repair() {
		let mut harness = Scripted {
			run_verdicts: VecDeque::from(vec![OutcomeKind::RuntimeError, OutcomeKind::Accepted, OutcomeKind::Accepted]),
			submit_verdicts: VecDeque::from(vec![OutcomeKind::Accepted]),
			..Default::default()
		};
		let report = orchestrator(3, false).drive(&mut harness, &problem(), "Python3").await.unwrap();

		assert_eq!(report.end, SolveEnd::Done);
		assert_eq!(harness.repair_calls, 1);
		assert!(harness.community_ranks.is_empty());
		assert_eq!(report.attempts.last().unwrap().origin, CandidateOrigin::GeneratedFix);
	}

	#[tokio::test]
	async fn flaky_confirmation_blocks_submission() {
		// First run accepts, the confirmation run flips to wrong answer:
		// no submission happens and the loop diversifies.
		let mut harness = Scripted {
			run_verdicts: VecDeque::from(vec![OutcomeKind::Accepted, OutcomeKind::WrongAnswer]),
			community_available: false,
			..Default::default()
		};
		let report = orchestrator(3, false).drive(&mut harness, &problem(), "Python3").await.unwrap();

		assert_eq!(harness.submit_calls, 0);
		assert_eq!(report.end, SolveEnd::Abandoned);
		assert_eq!(harness.community_ranks, vec![2]);
		assert_eq!(report.attempts[0].outcome, OutcomeKind::WrongAnswer);
	}

	#[tokio::test]
	async fn post_submit_wrong_answer_diversifies_deeper() {
		// Every local run accepts but the hidden tests keep rejecting:
		// community ranks must advance and the solve never reports Done.
		let mut harness = Scripted {
			run_verdicts: VecDeque::from(vec![OutcomeKind::Accepted; 6]),
			submit_verdicts: VecDeque::from(vec![OutcomeKind::WrongAnswer; 3]),
			community_available: true,
			..Default::default()
		};
		let report = orchestrator(3, false).drive(&mut harness, &problem(), "Python3").await.unwrap();

		assert_eq!(report.end, SolveEnd::Abandoned);
		// The budget-final rejection does not fetch a candidate it could
		// never run.
		assert_eq!(harness.community_ranks, vec![2, 3]);
		assert_eq!(harness.submit_calls, 3);
		assert!(report.attempts.iter().all(|a| a.submitted == Some(OutcomeKind::WrongAnswer)));
	}

	#[tokio::test]
	async fn final_attempt_failure_skips_candidate_production() {
		let mut harness = Scripted {
			run_verdicts: VecDeque::from(vec![OutcomeKind::WrongAnswer]),
			community_available: true,
			..Default::default()
		};
		let report = orchestrator(1, false).drive(&mut harness, &problem(), "Python3").await.unwrap();

		assert_eq!(report.end, SolveEnd::Abandoned);
		assert!(harness.community_ranks.is_empty());
		assert_eq!(harness.repair_calls, 0);

		let mut harness = Scripted { run_verdicts: VecDeque::from(vec![OutcomeKind::RuntimeError]), ..Default::default() };
		let report = orchestrator(1, false).drive(&mut harness, &problem(), "Python3").await.unwrap();

		assert_eq!(report.end, SolveEnd::Abandoned);
		assert_eq!(harness.repair_calls, 0);
		assert_eq!(report.attempts.len(), 1);
	}

	#[tokio::test]
	async fn no_submit_stops_after_confirmed_accept() {
		let mut harness = Scripted { run_verdicts: VecDeque::from(vec![OutcomeKind::Accepted, OutcomeKind::Accepted]), ..Default::default() };
		let report = orchestrator(3, true).drive(&mut harness, &problem(), "Python3").await.unwrap();

		assert_eq!(report.end, SolveEnd::Done);
		assert_eq!(harness.submit_calls, 0);
		assert_eq!(report.attempts[0].submitted, None);
	}

	#[tokio::test]
	async fn missing_community_solution_abandons() {
		let mut harness = Scripted { run_verdicts: VecDeque::from(vec![OutcomeKind::WrongAnswer]), community_available: false, ..Default::default() };
		let report = orchestrator(3, false).drive(&mut harness, &problem(), "Python3").await.unwrap();

		assert_eq!(report.end, SolveEnd::Abandoned);
		assert_eq!(report.attempts.len(), 1);
	}
}
