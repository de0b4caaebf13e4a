use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::Config;
use crate::error::AppError;
use crate::models::plan::MoveOp;
use crate::services::organize_service::{self, FileSummary, MovesPayload, PlanTier};

pub fn build_prompt(instructions: &str, files: &[FileSummary]) -> Result<String, AppError> {
    let files_json = serde_json::to_string(files)?;
    Ok([
        "You are an expert file librarian. Organize files according to the user instructions.".to_string(),
        "Return strictly JSON with a top-level `moves` array of objects: { \"from\": string, \"to\": string, \"reason\": string }.".to_string(),
        "Only move items within the sandbox root (paths start with /). Keep file names the same unless necessary.".to_string(),
        format!("User instructions: {instructions}"),
        format!("Files: {files_json}"),
    ]
    .join("\n"))
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(AppError::ExternalService(format!(
        "server returned {}: {}",
        status.as_u16(),
        body.chars().take(200).collect::<String>()
    )))
}

fn transport(e: reqwest::Error) -> AppError {
    AppError::ExternalService(e.to_string())
}

#[derive(Debug, Serialize)]
struct OrganizeRequest<'a> {
    instructions: &'a str,
    files: &'a [FileSummary],
}

/// Client for an HTTP organizer exposing `POST /v1/organize`.
pub struct OrganizerClient {
    http: Client,
    endpoint: String,
}

impl OrganizerClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}/v1/organize", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl PlanTier for OrganizerClient {
    fn name(&self) -> &'static str {
        "organizer"
    }

    async fn propose(
        &self,
        files: &[FileSummary],
        instructions: &str,
    ) -> Result<Vec<MoveOp>, AppError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&OrganizeRequest {
                instructions,
                files,
            })
            .send()
            .await
            .map_err(transport)?;
        let payload: MovesPayload = error_for_status(response)
            .await?
            .json()
            .await
            .map_err(transport)?;
        Ok(payload.moves)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Direct call to a Gemini `generateContent` endpoint.
pub struct GeminiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(http: Client, base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = json!({
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
            "generationConfig": {"temperature": 0.0},
        });
        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        let parsed: GenerateResponse = error_for_status(response)
            .await?
            .json()
            .await
            .map_err(transport)?;
        Ok(parsed.text())
    }
}

#[async_trait]
impl PlanTier for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn propose(
        &self,
        files: &[FileSummary],
        instructions: &str,
    ) -> Result<Vec<MoveOp>, AppError> {
        let prompt = build_prompt(instructions, files)?;
        let text = self.generate(&prompt).await?;
        tracing::debug!(
            "[gemini] Response ({} chars): {}",
            text.len(),
            text.chars().take(500).collect::<String>()
        );
        if text.trim().is_empty() {
            return Err(AppError::ExternalService("empty model response".to_string()));
        }
        organize_service::extract_moves(&text).ok_or_else(|| {
            AppError::ExternalService("model response did not contain a moves payload".to_string())
        })
    }
}

/// Tiers enabled by configuration, in fallback order.
pub fn tiers_from_config(config: &Config) -> Result<Vec<Arc<dyn PlanTier>>, AppError> {
    let http = Client::builder()
        .timeout(Duration::from_secs(config.external_timeout_secs))
        .build()
        .map_err(transport)?;

    let mut tiers: Vec<Arc<dyn PlanTier>> = Vec::new();
    if let Some(url) = config.organizer_url() {
        tiers.push(Arc::new(OrganizerClient::new(http.clone(), url)));
    }
    if let Some(key) = config.google_api_key() {
        tiers.push(Arc::new(GeminiClient::new(
            http,
            &config.gemini_base_url,
            &config.gemini_model,
            key,
        )));
    }
    Ok(tiers)
}
