use std::{env, path::PathBuf};

use color_eyre::{Result, eyre::eyre};

/// Runtime configuration, read once at startup from the environment
/// (a `.env` file in the working directory is loaded first if present).
#[derive(Clone, Debug)]
pub struct AppConfig {
	/// API key for the completion service
	pub api_key: String,
	/// Base URL of the completion service
	pub api_base_url: String,
	/// Model identifiers tried in order until one succeeds
	pub models: Vec<String>,
	/// Language to select in the editor dropdown
	pub preferred_language: String,
	/// Max write->run cycles before giving up
	pub max_attempts: usize,
	/// Which community solution to open when diversifying (1-based)
	pub solution_rank: usize,
	/// Where the captured session lives
	pub auth_state_path: PathBuf,
	/// Leave the final submission click to the user
	pub no_submit: bool,
	/// Run with a visible browser window
	pub visible: bool,
}

fn default_models() -> Vec<String> {
	vec!["gpt-3.5-turbo".to_string(), "gpt-4o-mini".to_string()]
}

fn default_max_attempts() -> usize {
	3
}

fn default_solution_rank() -> usize {
	2
}

impl AppConfig {
	pub fn from_env() -> Result<Self> {
		dotenv::dotenv().ok();

		let models = match env::var("OPENAI_MODEL") {
			Ok(list) => {
				let models: Vec<String> = list.split(',').map(|m| m.trim().to_string()).filter(|m| !m.is_empty()).collect();
				if models.is_empty() { default_models() } else { models }
			}
			Err(_) => default_models(),
		};

		Ok(Self {
			api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
			api_base_url: env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
			models,
			preferred_language: env::var("PREFERRED_LANGUAGE").unwrap_or_else(|_| "Python3".to_string()),
			max_attempts: env::var("MAX_ATTEMPTS").ok().and_then(|s| s.parse().ok()).unwrap_or_else(default_max_attempts),
			solution_rank: env::var("SOLUTION_RANK").ok().and_then(|s| s.parse().ok()).unwrap_or_else(default_solution_rank),
			auth_state_path: env::var("AUTH_STATE_PATH").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("auth_state.json")),
			no_submit: false,
			visible: false,
		})
	}

	/// The key as shipped in .env.example counts as absent.
	pub fn has_api_key(&self) -> bool {
		!self.api_key.is_empty() && self.api_key != "your_openai_api_key_here"
	}

	pub fn require_api_key(&self) -> Result<()> {
		if self.has_api_key() {
			Ok(())
		} else {
			Err(eyre!("OPENAI_API_KEY is missing or still the placeholder; set it in .env"))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn placeholder_key_counts_as_absent() {
		let mut config = AppConfig {
			api_key: String::new(),
			api_base_url: String::new(),
			models: default_models(),
			preferred_language: "Python3".to_string(),
			max_attempts: 3,
			solution_rank: 2,
			auth_state_path: PathBuf::from("auth_state.json"),
			no_submit: false,
			visible: false,
		};
		assert!(!config.has_api_key());
		config.api_key = "your_openai_api_key_here".to_string();
		assert!(!config.has_api_key());
		config.api_key = "sk-real".to_string();
		assert!(config.has_api_key());
	}
}
