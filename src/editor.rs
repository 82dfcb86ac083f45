//! Writing source into the monaco editor. Primary path sets the editor
//! model directly; fallback simulates typing with the editor's auto-pairing
//! disabled so brackets and quotes land literally.

use std::time::Duration;

use chromiumoxide::Page;
use color_eyre::{Result, eyre::eyre};
use rand::Rng as _;

/// Escapes source for embedding in a JS template literal.
fn escape_template_literal(source: &str) -> String {
	source
		.replace('\\', "\\\\")
		.replace('`', "\\`")
		.replace('$', "\\$")
		.replace('\r', "\\r")
		.replace('\t', "\\t")
}

/// Replaces the editor content with `source`. Returns an error only when
/// both the model path and the typing fallback fail.
pub async fn write_source(page: &Page, source: &str) -> Result<()> {
	if set_via_model(page, source).await? {
		tracing::debug!("source written via editor model");
		return Ok(());
	}
	tracing::warn!("editor model unavailable, falling back to simulated typing");
	type_into_editor(page, source).await
}

/// Sets the whole buffer through monaco's model API in one shot.
async fn set_via_model(page: &Page, source: &str) -> Result<bool> {
	let escaped = escape_template_literal(source);
	let script = format!(
		r#"
		(function() {{
			if (!window.monaco || !window.monaco.editor) return false;
			const models = window.monaco.editor.getModels();
			if (!models.length) return false;
			models[0].setValue(`{escaped}`);
			return true;
		}})()
		"#
	);
	let result = page.evaluate(script).await.map_err(|e| eyre!("Editor model script failed: {e}"))?;
	Ok(result.value().and_then(|v| v.as_bool()) == Some(true))
}

/// Typing fallback: focus the editor, clear it, switch off auto-closing
/// pairs, then type character by character with human-ish jitter.
async fn type_into_editor(page: &Page, source: &str) -> Result<()> {
	let editor = page.find_element(".monaco-editor textarea.inputarea, .monaco-editor").await.map_err(|e| eyre!("Editor not found: {e}"))?;
	editor.focus().await.map_err(|e| eyre!("Failed to focus editor: {e}"))?;

	// Auto-closing pairs would double every bracket and quote we type.
	// Select-all goes through a synthetic ctrl-A keydown since the CDP key
	// helper only takes single keys; monaco handles its own keybinding.
	let prep = r#"
		(function() {
			if (window.monaco && window.monaco.editor) {
				const editors = window.monaco.editor.getEditors ? window.monaco.editor.getEditors() : [];
				for (const ed of editors) {
					ed.updateOptions({ autoClosingBrackets: 'never', autoClosingQuotes: 'never', autoSurround: 'never', autoIndent: 'none' });
				}
			}
			const target = document.activeElement || document.querySelector('.monaco-editor textarea.inputarea');
			if (target) {
				target.dispatchEvent(new KeyboardEvent('keydown', { key: 'a', code: 'KeyA', ctrlKey: true, bubbles: true }));
			}
			return true;
		})()
	"#;
	page.evaluate(prep).await.map_err(|e| eyre!("Editor prep script failed: {e}"))?;

	editor.press_key("Backspace").await.map_err(|e| eyre!("Clear failed: {e}"))?;
	tokio::time::sleep(Duration::from_millis(300)).await;

	let mut rng = rand::rng();
	for line in source.lines() {
		// Monaco auto-indents new lines even with autoIndent off in some
		// builds; type the stripped line and let indentation come from the
		// source's own whitespace.
		editor.type_str(line).await.map_err(|e| eyre!("Typing failed: {e}"))?;
		editor.press_key("Enter").await.map_err(|e| eyre!("Newline failed: {e}"))?;
		// Go back to column zero so our leading whitespace is authoritative.
		editor.press_key("Home").await.map_err(|e| eyre!("Home key failed: {e}"))?;
		tokio::time::sleep(Duration::from_millis(rng.random_range(20..80))).await;
	}
	Ok(())
}

/// Reads the buffer back so the caller can verify the paste took.
pub async fn read_back(page: &Page) -> Result<Option<String>> {
	let script = r#"
		(function() {
			if (window.monaco && window.monaco.editor) {
				const models = window.monaco.editor.getModels();
				if (models.length) return models[0].getValue();
			}
			const lines = Array.from(document.querySelectorAll('.monaco-editor .view-line'));
			if (lines.length) {
				lines.sort((a, b) => a.getBoundingClientRect().top - b.getBoundingClientRect().top);
				return lines.map(l => l.textContent || '').join('\n');
			}
			return null;
		})()
	"#;
	let result = page.evaluate(script).await.map_err(|e| eyre!("Editor read-back failed: {e}"))?;
	Ok(result.value().and_then(|v| v.as_str()).map(|s| s.replace('\u{a0}', " ")))
}
