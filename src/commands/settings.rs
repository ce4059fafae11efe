//! `set-baseURL`, `set-key`, `set-model` and `set-max-token`.

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use regex_lite::Regex;

use crate::config::{
    DEFAULT_MAX_TOKEN, KEY_API_KEY, KEY_BASE_URL, KEY_MAX_TOKEN, KEY_MODEL, Settings, split_list,
};
use crate::error::ConfigError;
use crate::llm::{ChatClient, ChatMessage, ChatRequest, normalize};
use crate::logging::Console;
use crate::prompt::Prompter;

static MAX_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[1-9]\d*$").expect("Invalid regex"));

/// Prompt sent to check that a model answers at all.
const PING_PROMPT: &str = "1+1=?";

pub fn set_base_url(settings: &mut Settings, console: &Console, url: Option<&str>) -> Result<()> {
    let url = url.map(str::trim).unwrap_or_default();
    settings.set(KEY_BASE_URL, url)?;
    if url.is_empty() {
        console.warn("Base URL cleared");
    } else {
        console.success(format!("Base URL set to {url}"));
    }
    Ok(())
}

pub fn set_key(settings: &mut Settings, console: &Console, key: Option<&str>) -> Result<()> {
    let key = key.map(str::trim).unwrap_or_default();
    settings.set(KEY_API_KEY, key)?;
    if key.is_empty() {
        console.warn("API key cleared");
    } else {
        console.success(format!("API key set: {}", mask_key(key)));
    }
    Ok(())
}

/// Masks each comma-separated key for display.
pub fn mask_key(keys: &str) -> String {
    split_list(keys)
        .iter()
        .map(|key| {
            let chars: Vec<char> = key.chars().collect();
            let len = chars.len();
            if len < 12 {
                let shown = if len < 5 { 1 } else { 3 };
                format!("{}...", chars[..shown].iter().collect::<String>())
            } else {
                format!(
                    "{}...{}",
                    chars[..5].iter().collect::<String>(),
                    chars[len - 5..].iter().collect::<String>()
                )
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Accepts positive integers without sign or leading zeros.
pub fn parse_max_token(value: &str) -> Result<usize, ConfigError> {
    let trimmed = value.trim();
    if !MAX_TOKEN_RE.is_match(trimmed) {
        return Err(ConfigError::InvalidMaxToken(value.to_string()));
    }
    trimmed
        .parse()
        .map_err(|_| ConfigError::InvalidMaxToken(value.to_string()))
}

pub fn set_max_token(settings: &mut Settings, console: &Console, value: &str) -> Result<usize> {
    let max_token = parse_max_token(value)?;
    if max_token > DEFAULT_MAX_TOKEN {
        console.warn(format!(
            "Max token above {DEFAULT_MAX_TOKEN} is not recommended"
        ));
    }
    settings.set(KEY_MAX_TOKEN, &max_token.to_string())?;
    console.success(format!(
        "Max token set to {max_token} ({}k)",
        round_thousands(max_token)
    ));
    Ok(max_token)
}

/// `n / 1000`, rounded half up.
fn round_thousands(n: usize) -> usize {
    n / 1000 + usize::from(n % 1000 >= 500)
}

/// Result of pinging the configured models.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PingReport {
    pub passed: Vec<String>,
    pub failed: Vec<String>,
    pub elapsed: Duration,
}

/// Stores `model`, or with no model asks the user to pick from the
/// endpoint's list. Every configured model is then pinged; a failed ping is
/// reported, not fatal.
pub async fn set_model<C, P>(
    settings: &mut Settings,
    client: &C,
    prompter: &P,
    console: &Console,
    model: Option<&str>,
) -> Result<Option<PingReport>>
where
    C: ChatClient,
    P: Prompter,
{
    let model = model.map(str::trim).unwrap_or_default();
    let previous = settings.get(KEY_MODEL);
    settings.set(KEY_MODEL, model)?;

    let model = if model.is_empty() {
        if previous.is_some() {
            console.warn("Model setting cleared");
        }
        select_models(settings, client, prompter, console).await?
    } else {
        model.to_string()
    };
    console.success(format!(
        "Model set:\n   - {}",
        split_list(&model).join("\n   - ")
    ));

    let models = settings.list(KEY_MODEL);
    if settings.get(KEY_BASE_URL).is_none() || models.is_empty() {
        return Ok(None);
    }
    let report = ping_models(client, console, &models).await;
    Ok(Some(report))
}

async fn select_models<C, P>(
    settings: &mut Settings,
    client: &C,
    prompter: &P,
    console: &Console,
) -> Result<String>
where
    C: ChatClient,
    P: Prompter,
{
    let base_url = settings.get(KEY_BASE_URL);
    if base_url.is_some() && settings.get(KEY_API_KEY).is_none() {
        console.warn("No API key is set, listing models may fail. Run `aicommit set-key <key>`");
    }
    console.info(format!("Base URL: {}", base_url.unwrap_or_default()));

    console.step("Loading the model list");
    let listed = client.list_models().await;
    console.finish("Loading the model list");
    let models = listed.context("Failed to load the model list")?;
    if models.is_empty() {
        bail!("No models available");
    }
    console.success(format!("Available models: {}", models.len()));

    let chosen = prompter
        .select_many("Select models", &models)
        .map_err(|e| ConfigError::Selection(e.to_string()))?;
    let selected: Vec<&str> = chosen
        .iter()
        .filter_map(|&i| models.get(i).map(String::as_str))
        .collect();
    if selected.is_empty() {
        return Err(ConfigError::Selection("Select at least one model".to_string()).into());
    }

    let joined = selected.join(",");
    settings.set(KEY_MODEL, &joined)?;
    Ok(joined)
}

async fn ping_models<C: ChatClient>(client: &C, console: &Console, models: &[String]) -> PingReport {
    console.step("Checking that the models respond");
    let start = Instant::now();
    let mut report = PingReport::default();

    for model in models {
        let request =
            ChatRequest::new(vec![ChatMessage::user(PING_PROMPT)]).with_model(model.as_str());
        let answered = match client.chat(request).await {
            Ok(body) => body.error_payload().is_none() && normalize(&body).is_ok(),
            Err(e) => {
                console.log().warning(&e.to_string(), Some(model.as_str()));
                false
            }
        };
        if answered {
            report.passed.push(model.clone());
        } else {
            report.failed.push(model.clone());
        }
    }
    report.elapsed = start.elapsed();
    console.finish("Checking that the models respond");

    if !report.passed.is_empty() {
        console.success(format!("{} model(s) passed", report.passed.len()));
    }
    if !report.failed.is_empty() {
        console.error(format!(
            "{} model(s) failed:\n   - {}",
            report.failed.len(),
            report.failed.join("\n   - ")
        ));
    }
    console.success(format!(
        "Model check took {:.3}s",
        report.elapsed.as_secs_f64()
    ));
    report
}
