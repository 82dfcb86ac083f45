use std::path::Path;

use chromiumoxide::browser::{Browser, BrowserConfig};
use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::eyre};
use futures::StreamExt;
use leet_headless::{config::AppConfig, extract, llm::LlmClient, login, navigate, runner, session::SessionState};

#[derive(Debug, Parser)]
#[command(name = "leet_headless")]
#[command(about = "Solves the daily coding challenge in a headless browser", long_about = None)]
struct Args {
	#[command(subcommand)]
	command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Interactive first-time login; captures the session for headless runs
	Setup,
	/// Verify that the captured session is still valid
	Check,
	/// Solve today's challenge end to end
	Solve {
		/// Run without a visible browser window
		#[arg(long)]
		headless: bool,

		/// Stop after a confirmed accepted run, never click submit
		#[arg(long)]
		no_submit: bool,
	},
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")))
		.init();

	let args = Args::parse();
	let mut config = AppConfig::from_env()?;

	match args.command {
		Command::Setup => {
			config.visible = true;
			let (browser, page, handle) = launch_browser(&config).await?;
			let result = login::interactive_setup(&browser, &page, &config.auth_state_path).await;
			shutdown(browser, handle).await;
			result
		}
		Command::Check => {
			println!("API key: {}", if config.has_api_key() { "present" } else { "MISSING (set OPENAI_API_KEY in .env)" });
			println!("Preferred language: {}", config.preferred_language);
			println!("Models: {}", config.models.join(", "));

			let (browser, page, handle) = launch_browser(&config).await?;
			let ok = match restore_session(&browser, &page, &config.auth_state_path).await? {
				true => login::validate_session(&page).await?,
				false => false,
			};
			shutdown(browser, handle).await;
			if ok && config.has_api_key() {
				println!("Session is valid. Ready to solve.");
				Ok(())
			} else {
				if !ok {
					println!("Session is missing or expired. Run `leet_headless setup`.");
				}
				std::process::exit(1);
			}
		}
		Command::Solve { headless, no_submit } => {
			config.visible = !headless;
			config.no_submit = no_submit;
			solve(&config).await
		}
	}
}

async fn launch_browser(config: &AppConfig) -> Result<(Browser, chromiumoxide::Page, tokio::task::JoinHandle<()>)> {
	let browser_config = if config.visible {
		BrowserConfig::builder().with_head().build().map_err(|e| eyre!("Failed to build browser config: {e}"))?
	} else {
		BrowserConfig::builder().build().map_err(|e| eyre!("Failed to build browser config: {e}"))?
	};

	let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| eyre!("Failed to launch browser: {e}"))?;

	// Consume browser events so the connection does not stall.
	let handle = tokio::spawn(async move {
		while let Some(_event) = handler.next().await {}
	});

	let page = browser.new_page("about:blank").await.map_err(|e| eyre!("Failed to create new page: {e}"))?;
	Ok((browser, page, handle))
}

async fn shutdown(mut browser: Browser, handle: tokio::task::JoinHandle<()>) {
	if let Err(e) = browser.close().await {
		tracing::warn!("browser close failed: {e}");
	}
	handle.abort();
}

/// Loads the captured session into the browser. False when no session file
/// exists yet.
async fn restore_session(browser: &Browser, page: &chromiumoxide::Page, auth_path: &Path) -> Result<bool> {
	let Some(state) = SessionState::load(auth_path)? else {
		return Ok(false);
	};
	state.restore(browser, page).await?;
	Ok(true)
}

async fn solve(config: &AppConfig) -> Result<()> {
	// Fail on a missing key before touching the browser.
	let llm = LlmClient::new(config)?;

	let (browser, page, handle) = launch_browser(config).await?;
	let end = match solve_on(&browser, &page, &llm, config).await {
		Ok(end) => end,
		Err(e) => {
			if let Ok(path) = navigate::save_failure_screenshot(&page, "solve").await {
				tracing::info!("saved failure screenshot to {}", path.display());
			}
			if config.visible {
				eprintln!("Solve failed: {e:#}");
				eprintln!("Browser left open for inspection. Press Ctrl+C to exit...");
				tokio::signal::ctrl_c().await?;
			}
			shutdown(browser, handle).await;
			return Err(e);
		}
	};

	match end {
		runner::SolveEnd::Done => {
			shutdown(browser, handle).await;
			println!("✓ Challenge solved!");
			Ok(())
		}
		runner::SolveEnd::Abandoned => {
			println!("✗ Gave up on today's challenge.");
			if config.visible {
				// The editor still holds the last candidate; hand over.
				eprintln!("Browser left open to finish by hand. Press Ctrl+C to exit...");
				tokio::signal::ctrl_c().await?;
			}
			shutdown(browser, handle).await;
			std::process::exit(1);
		}
	}
}

async fn solve_on(browser: &Browser, page: &chromiumoxide::Page, llm: &LlmClient, config: &AppConfig) -> Result<runner::SolveEnd> {
	if !restore_session(browser, page, &config.auth_state_path).await? {
		return Err(eyre!("No saved session at {}. Run `leet_headless setup` first.", config.auth_state_path.display()));
	}
	if !login::validate_session(page).await? {
		return Err(eyre!("Saved session has expired. Run `leet_headless setup` again."));
	}
	tracing::info!("session restored and validated");

	let problem_page = navigate::open_daily_challenge(browser, page).await?;
	tracing::info!("daily challenge opened");

	if !navigate::select_language(&problem_page, &config.preferred_language).await? {
		tracing::warn!("proceeding with the editor's current language");
	}

	let problem = extract::extract_problem(&problem_page, &config.preferred_language)
		.await?
		.ok_or_else(|| eyre!("Problem content never rendered"))?;
	tracing::info!("extracted \"{}\" ({} examples)", problem.title, problem.examples.len());

	let orchestrator = runner::Orchestrator::new(config);
	let mut harness = runner::BrowserHarness { page: &problem_page, llm };
	let report = orchestrator.drive(&mut harness, &problem, &config.preferred_language).await?;

	for (i, attempt) in report.attempts.iter().enumerate() {
		match attempt.submitted {
			Some(verdict) => println!("attempt {}: {} -> {} (submitted: {})", i + 1, attempt.origin, attempt.outcome, verdict),
			None => println!("attempt {}: {} -> {}", i + 1, attempt.origin, attempt.outcome),
		}
	}
	Ok(report.end)
}
