//! LLM-backed solution generation over the OpenAI chat-completions API.
//! Three prompt shapes: generate from scratch, repair with a diagnostic, and
//! adapt a community solution to the starter signature. Models are tried in
//! the configured order until one answers.

use std::time::Duration;

use color_eyre::{
	Result,
	eyre::{bail, eyre},
};
use serde::{Deserialize, Serialize};

use crate::{ProblemSnapshot, config::AppConfig};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct ChatMessage {
	role: &'static str,
	content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
	model: String,
	messages: Vec<ChatMessage>,
	temperature: f32,
	max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
	message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
	content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
	choices: Vec<ChatChoice>,
}

pub struct LlmClient {
	http: reqwest::Client,
	api_key: String,
	base_url: String,
	models: Vec<String>,
}

impl LlmClient {
	pub fn new(config: &AppConfig) -> Result<Self> {
		config.require_api_key()?;
		let api_key = config.api_key.clone();
		let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build().map_err(|e| eyre!("Failed to build HTTP client: {e}"))?;
		Ok(Self {
			http,
			api_key,
			base_url: config.api_base_url.clone(),
			models: config.models.clone(),
		})
	}

	async fn chat(&self, prompt: String, max_tokens: u32) -> Result<String> {
		let mut last_err = None;
		for model in &self.models {
			let request = ChatRequest {
				model: model.clone(),
				messages: vec![
					ChatMessage {
						role: "system",
						content: "You are an expert competitive programmer. Reply with code only, no explanations.".to_string(),
					},
					ChatMessage { role: "user", content: prompt.clone() },
				],
				// Low temperature: we want the most likely correct solution,
				// not a creative one.
				temperature: 0.1,
				max_tokens,
			};

			let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
			let response = match self.http.post(&url).bearer_auth(&self.api_key).json(&request).send().await {
				Ok(r) => r,
				Err(e) => {
					tracing::warn!("model {model} unreachable: {e}");
					last_err = Some(eyre!("{e}"));
					continue;
				}
			};

			if !response.status().is_success() {
				let status = response.status();
				let body = response.text().await.unwrap_or_default();
				tracing::warn!("model {model} returned {status}: {body}");
				last_err = Some(eyre!("model {model} returned {status}"));
				continue;
			}

			// A garbled body from one model is no different from a 5xx:
			// the rest of the list still gets its turn.
			let parsed: ChatResponse = match response.json().await {
				Ok(parsed) => parsed,
				Err(e) => {
					tracing::warn!("model {model} returned a malformed completion: {e}");
					last_err = Some(eyre!("model {model} returned a malformed completion: {e}"));
					continue;
				}
			};
			match parsed.choices.into_iter().next() {
				Some(choice) => {
					let code = tidy_source(&choice.message.content);
					if code.is_empty() {
						last_err = Some(eyre!("model {model} returned an empty completion"));
						continue;
					}
					tracing::info!("model {model} produced {} bytes of code", code.len());
					return Ok(code);
				}
				None => {
					last_err = Some(eyre!("model {model} returned no choices"));
					continue;
				}
			}
		}
		match last_err {
			Some(e) => Err(e.wrap_err("all models failed")),
			None => bail!("no models configured"),
		}
	}

	/// Generates a fresh solution from the problem snapshot.
	pub async fn generate_solution(&self, problem: &ProblemSnapshot, language: &str) -> Result<String> {
		let prompt = build_generate_prompt(problem, language);
		self.chat(prompt, 1000).await
	}

	/// Asks for a corrected version of a solution that failed with a
	/// concrete diagnostic (runtime error, compile error, limit).
	pub async fn repair_solution(&self, problem: &ProblemSnapshot, language: &str, failed_source: &str, verdict: &str, diagnostic: Option<&str>) -> Result<String> {
		let prompt = build_repair_prompt(problem, language, failed_source, verdict, diagnostic);
		self.chat(prompt, 1500).await
	}

	/// Rewrites a community solution so it compiles against the starter
	/// signature in the requested language.
	pub async fn adapt_solution(&self, problem: &ProblemSnapshot, language: &str, community_source: &str) -> Result<String> {
		let prompt = build_adapt_prompt(problem, language, community_source);
		self.chat(prompt, 1500).await
	}
}

fn build_generate_prompt(problem: &ProblemSnapshot, language: &str) -> String {
	let mut prompt = format!("Solve this problem in {language}.\n\nProblem: {}\n\n{}\n", problem.title, problem.statement);
	for example in &problem.examples {
		prompt.push('\n');
		prompt.push_str(example);
		prompt.push('\n');
	}
	if let Some(constraints) = &problem.constraints {
		prompt.push_str(&format!("\nConstraints:\n{constraints}\n"));
	}
	prompt.push_str(&format!(
		"\nComplete this starter code exactly, keeping the class and method signatures:\n{}\n\nReturn ONLY the complete {language} code, no markdown, no commentary.",
		problem.starter_code
	));
	prompt
}

fn build_repair_prompt(problem: &ProblemSnapshot, language: &str, failed_source: &str, verdict: &str, diagnostic: Option<&str>) -> String {
	let mut prompt = format!("This {language} solution to \"{}\" failed with: {verdict}\n\n{failed_source}\n", problem.title);
	if let Some(diagnostic) = diagnostic {
		prompt.push_str(&format!("\nJudge output:\n{diagnostic}\n"));
	}
	prompt.push_str(&format!(
		"\nProblem statement:\n{}\n\nFix the bug and return ONLY the corrected, complete {language} code. Keep the original class and method signatures.",
		problem.statement
	));
	prompt
}

fn build_adapt_prompt(problem: &ProblemSnapshot, language: &str, community_source: &str) -> String {
	format!(
		"Here is a working solution to \"{}\" found online:\n\n{community_source}\n\nRewrite it in {language} so it fits this starter code exactly:\n{}\n\nReturn ONLY the complete {language} code, no markdown, no commentary.",
		problem.title, problem.starter_code
	)
}

/// Drops markdown code fences around a completion, language tag included.
pub fn strip_code_fences(text: &str) -> String {
	let trimmed = text.trim();
	let Some(rest) = trimmed.strip_prefix("```") else {
		return trimmed.to_string();
	};
	// Skip the language tag on the opening fence line.
	let body = match rest.find('\n') {
		Some(idx) => &rest[idx + 1..],
		None => rest,
	};
	// The closing fence is not always the last thing in the reply; cut at
	// the last fence so trailing commentary goes with it.
	match body.rfind("```") {
		Some(idx) => body[..idx].trim().to_string(),
		None => body.trim().to_string(),
	}
}

/// Normalizes a completion into pasteable source: fences stripped, leading
/// chatter before the first code-looking line removed.
pub fn tidy_source(text: &str) -> String {
	let code = strip_code_fences(text);
	let markers = ["class ", "def ", "function ", "public ", "#include", "import ", "using ", "var ", "impl ", "fn "];
	let first_is_code = code.lines().next().is_some_and(|line| markers.iter().any(|m| line.trim_start().starts_with(m)));
	if !first_is_code {
		// The model sometimes prepends a sentence despite instructions.
		if let Some(idx) = code.lines().position(|line| markers.iter().any(|m| line.trim_start().starts_with(m)))
			&& idx > 0 && idx <= 3
		{
			return code.lines().skip(idx).collect::<Vec<_>>().join("\n");
		}
	}
	code
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn strips_fence_with_language_tag() {
		assert_eq!(strip_code_fences("```python\ndef solve():\n    pass\n```"), "def solve():\n    pass");
	}

	#[test]
	fn strips_bare_fence() {
		assert_eq!(strip_code_fences("```\nx = 1\n```"), "x = 1");
	}

	#[test]
	fn chatter_after_the_closing_fence_is_dropped() {
		assert_eq!(strip_code_fences("```python\ndef solve():\n    pass\n```\nNote: runs in O(n)."), "def solve():\n    pass");
	}

	#[test]
	fn unfenced_text_passes_through() {
		assert_eq!(strip_code_fences("class Solution:\n    pass"), "class Solution:\n    pass");
	}

	#[test]
	fn tidy_drops_leading_chatter() {
		let raw = "Here is the fix:\nclass Solution:\n    pass";
		assert_eq!(tidy_source(raw), "class Solution:\n    pass");
	}

	#[test]
	fn tidy_keeps_clean_code() {
		let raw = "def solve():\n    return 1";
		assert_eq!(tidy_source(raw), raw);
	}

	/// Minimal one-shot HTTP responder for exercising the model fallback.
	async fn serve_responses(listener: tokio::net::TcpListener, bodies: Vec<String>) {
		use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
		for body in bodies {
			let Ok((mut stream, _)) = listener.accept().await else { return };
			let mut buf = Vec::new();
			let mut chunk = [0u8; 4096];
			// Read until the request headers are complete; the body length
			// does not matter, we answer regardless.
			loop {
				let Ok(n) = stream.read(&mut chunk).await else { return };
				if n == 0 {
					break;
				}
				buf.extend_from_slice(&chunk[..n]);
				if buf.windows(4).any(|w| w == b"\r\n\r\n") {
					break;
				}
			}
			let response = format!("HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}", body.len());
			let _ = stream.write_all(response.as_bytes()).await;
			let _ = stream.flush().await;
		}
	}

	fn test_config(base_url: String) -> crate::config::AppConfig {
		crate::config::AppConfig {
			api_key: "sk-test".to_string(),
			api_base_url: base_url,
			models: vec!["model-a".to_string(), "model-b".to_string()],
			preferred_language: "Python3".to_string(),
			max_attempts: 3,
			solution_rank: 2,
			auth_state_path: std::path::PathBuf::from("auth_state.json"),
			no_submit: false,
			visible: false,
		}
	}

	#[tokio::test]
	async fn malformed_response_falls_through_to_next_model() {
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		let good = serde_json::json!({
			"choices": [{"message": {"content": "def solve():\n    return 1"}}]
		})
		.to_string();
		tokio::spawn(serve_responses(listener, vec!["this is not json".to_string(), good]));

		let config = test_config(format!("http://{addr}/v1"));
		let client = LlmClient::new(&config).unwrap();
		let problem = ProblemSnapshot {
			title: "Two Sum".to_string(),
			statement: "Find two numbers.".to_string(),
			examples: vec![],
			constraints: None,
			starter_code: "def solve():".to_string(),
		};

		let code = client.generate_solution(&problem, "Python3").await.unwrap();
		assert!(code.contains("return 1"));
	}

	#[tokio::test]
	async fn all_models_malformed_reports_the_failure() {
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(serve_responses(listener, vec!["garbage".to_string(), "garbage".to_string()]));

		let config = test_config(format!("http://{addr}/v1"));
		let client = LlmClient::new(&config).unwrap();
		let problem = ProblemSnapshot {
			title: "Two Sum".to_string(),
			statement: "Find two numbers.".to_string(),
			examples: vec![],
			constraints: None,
			starter_code: "def solve():".to_string(),
		};

		let err = client.generate_solution(&problem, "Python3").await.unwrap_err();
		assert!(err.to_string().contains("all models failed"));
	}

	#[test]
	fn prompts_carry_the_starter_signature() {
		let problem = ProblemSnapshot {
			title: "Two Sum".to_string(),
			statement: "Find two numbers.".to_string(),
			examples: vec!["Example 1:\nInput: [1,2]".to_string()],
			constraints: Some("n >= 2".to_string()),
			starter_code: "class Solution:\n    def twoSum(self, nums, target):".to_string(),
		};
		let prompt = build_generate_prompt(&problem, "Python3");
		assert!(prompt.contains("Two Sum"));
		assert!(prompt.contains("def twoSum"));
		assert!(prompt.contains("Constraints:"));
		let repair = build_repair_prompt(&problem, "Python3", "bad code", "Runtime Error", Some("IndexError"));
		assert!(repair.contains("Runtime Error"));
		assert!(repair.contains("IndexError"));
	}
}
