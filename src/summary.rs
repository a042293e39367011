use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{Cell, ModelEvidenceAggregate, OneLiner};

pub const PROMPT_EVIDENCE_LIMIT: usize = 5;
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o";
const MIN_API_KEY_LEN: usize = 10;
const ERROR_BODY_LIMIT: usize = 300;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("missing API key (set SUMMARY_API_KEY to enable one-line summaries)")]
    MissingApiKey,
    #[error("summary endpoint returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("summary request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("summary endpoint returned an empty response")]
    EmptyResponse,
    #[error("could not parse {{pro, con}} from response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummaryScope {
    Cell,
    CompareA,
    CompareB,
    ModelCard,
}

impl fmt::Display for SummaryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SummaryScope::Cell => "cell",
            SummaryScope::CompareA => "compareA",
            SummaryScope::CompareB => "compareB",
            SummaryScope::ModelCard => "modelCard",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRequest {
    pub scope: SummaryScope,
    pub model_name: String,
    pub homework: Option<String>,
    pub post_count: u64,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}

impl SummaryRequest {
    pub fn from_cell(scope: SummaryScope, model: &str, homework: &str, cell: &Cell) -> Self {
        Self {
            scope,
            model_name: model.to_string(),
            homework: Some(homework.to_string()),
            post_count: cell.post_count,
            strengths: cell.strengths.clone(),
            weaknesses: cell.weaknesses.clone(),
        }
    }

    pub fn from_aggregate(record: &ModelEvidenceAggregate) -> Self {
        Self {
            scope: SummaryScope::ModelCard,
            model_name: record.model.clone(),
            homework: None,
            post_count: record.post_count,
            strengths: record.strengths.clone(),
            weaknesses: record.weaknesses.clone(),
        }
    }

    /// `scope::homework::model`, with `ALL` standing in for a missing homework.
    pub fn cache_key(&self) -> String {
        format!(
            "{}::{}::{}",
            self.scope,
            self.homework.as_deref().unwrap_or("ALL"),
            self.model_name
        )
    }

    pub fn prompt(&self) -> String {
        format!(
            "You are analyzing evidence from student posts about LLM performance.\n\n\
             Return ONLY valid JSON in this exact format (no markdown, no extra text):\n\
             {{\"pro\":\"one concrete strength sentence under 25 words\",\"con\":\"one concrete weakness sentence under 25 words\"}}\n\n\
             Evidence for {} on {}:\n\
             Posts: {}\n\
             Strengths found: {}\n\
             Weaknesses found: {}\n\n\
             Requirements:\n\
             - Base pro/con ONLY on the evidence above\n\
             - Be specific and concrete (not generic)\n\
             - Max 25 words each\n\
             - If insufficient evidence, say \"Limited evidence suggests...\" or \"Few posts mention...\"\n\
             - Return ONLY the JSON object, nothing else",
            self.model_name,
            self.homework.as_deref().unwrap_or("all homeworks"),
            self.post_count,
            evidence_line(&self.strengths),
            evidence_line(&self.weaknesses),
        )
    }
}

fn evidence_line(items: &[String]) -> String {
    if items.is_empty() {
        return "None mentioned".to_string();
    }
    items
        .iter()
        .take(PROMPT_EVIDENCE_LIMIT)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Reads `{pro, con}` from a model reply. Accepts bare JSON, a fenced block,
/// or the first complete JSON object embedded in surrounding text.
pub fn parse_one_liner(text: &str) -> Result<OneLiner, SummaryError> {
    let value = serde_json::from_str::<Value>(text)
        .ok()
        .or_else(|| extract_json_object(text));

    let field = |name: &str| {
        value
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    match (field("pro"), field("con")) {
        (Some(pro), Some(con)) => Ok(OneLiner { pro, con }),
        _ => Err(SummaryError::InvalidResponse(
            text.chars().take(200).collect(),
        )),
    }
}

fn extract_json_object(text: &str) -> Option<Value> {
    let scope = match text.find("```") {
        Some(start) => {
            let after = &text[start + 3..];
            match after.find("```") {
                Some(end) => &after[..end],
                None => after,
            }
        }
        None => text,
    };
    scope
        .match_indices('{')
        .find_map(|(open, _)| {
            serde_json::Deserializer::from_str(&scope[open..])
                .into_iter::<Value>()
                .next()
                .and_then(Result::ok)
        })
        .filter(Value::is_object)
}

pub trait SummaryProvider {
    fn summarize(
        &self,
        request: &SummaryRequest,
    ) -> impl Future<Output = Result<OneLiner, SummaryError>> + Send;
}

/// OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct ChatCompletionsProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatCompletionsProvider {
    pub fn new(endpoint: &str, api_key: &str, model: &str) -> Result<Self, SummaryError> {
        let api_key = api_key.trim();
        if api_key.len() < MIN_API_KEY_LEN {
            return Err(SummaryError::MissingApiKey);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

impl SummaryProvider for ChatCompletionsProvider {
    async fn summarize(&self, request: &SummaryRequest) -> Result<OneLiner, SummaryError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": "You are a helpful assistant that returns only valid JSON." },
                { "role": "user", "content": request.prompt() }
            ],
            "temperature": 0.3,
            "max_completion_tokens": 150
        });

        debug!(endpoint = %self.endpoint, model = %self.model, "requesting one-line summary");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SummaryError::Http {
                status: status.as_u16(),
                body: text.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        let payload: Value = response.json().await?;
        let content = payload
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if content.is_empty() {
            return Err(SummaryError::EmptyResponse);
        }

        parse_one_liner(content)
    }
}

/// Deterministic pro/con lines built from the first evidence items.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineProvider;

impl SummaryProvider for OfflineProvider {
    async fn summarize(&self, request: &SummaryRequest) -> Result<OneLiner, SummaryError> {
        let pro = match request.strengths.first() {
            Some(first) => format!("Students credit {}: {}", request.model_name, first.trim()),
            None => format!(
                "Limited evidence suggests no clear strength for {}.",
                request.model_name
            ),
        };
        let con = match request.weaknesses.first() {
            Some(first) => format!("Students flag {}: {}", request.model_name, first.trim()),
            None => format!("Few posts mention weaknesses for {}.", request.model_name),
        };
        Ok(OneLiner { pro, con })
    }
}

#[derive(Debug)]
pub enum SummaryOutcome {
    Cached(OneLiner),
    Generated(OneLiner),
    /// Another request for this key is pending.
    InFlight,
    Disabled,
    Failed(SummaryError),
}

#[derive(Debug, Default)]
struct SessionState {
    cache: HashMap<String, OneLiner>,
    in_flight: HashSet<String>,
}

fn lock_state(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes its key from `in_flight` on drop.
struct PendingKey<'a> {
    state: &'a Mutex<SessionState>,
    key: String,
}

impl Drop for PendingKey<'_> {
    fn drop(&mut self) {
        lock_state(self.state).in_flight.remove(&self.key);
    }
}

#[derive(Debug)]
pub struct SummarySession<P> {
    enabled: bool,
    provider: P,
    state: Mutex<SessionState>,
}

impl<P: SummaryProvider> SummarySession<P> {
    pub fn new(enabled: bool, provider: P) -> Self {
        Self {
            enabled,
            provider,
            state: Mutex::new(SessionState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        lock_state(&self.state)
    }

    /// At most one request per cache key runs at a time. Only successes are
    /// cached, so a failed or abandoned key can be requested again.
    pub async fn request(&self, request: &SummaryRequest) -> SummaryOutcome {
        let pending = {
            let key = request.cache_key();
            let mut state = self.lock();
            if let Some(hit) = state.cache.get(&key) {
                return SummaryOutcome::Cached(hit.clone());
            }
            if !self.enabled {
                return SummaryOutcome::Disabled;
            }
            if !state.in_flight.insert(key.clone()) {
                debug!(key = %key, "summary already pending");
                return SummaryOutcome::InFlight;
            }
            PendingKey {
                state: &self.state,
                key,
            }
        };

        match self.provider.summarize(request).await {
            Ok(line) => {
                info!(key = %pending.key, "summary generated");
                self.lock().cache.insert(pending.key.clone(), line.clone());
                SummaryOutcome::Generated(line)
            }
            Err(err) => {
                warn!(key = %pending.key, error = %err, "summary request failed");
                SummaryOutcome::Failed(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn request() -> SummaryRequest {
        SummaryRequest {
            scope: SummaryScope::Cell,
            model_name: "GPT-4".to_string(),
            homework: Some("HW3".to_string()),
            post_count: 4,
            strengths: (1..=7).map(|i| format!("strength {i}")).collect(),
            weaknesses: Vec::new(),
        }
    }

    /// Fails the first `failures` calls, then answers.
    struct ScriptedProvider {
        calls: AtomicUsize,
        failures: usize,
    }

    impl ScriptedProvider {
        fn new(failures: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures,
            }
        }
    }

    impl SummaryProvider for ScriptedProvider {
        async fn summarize(&self, _request: &SummaryRequest) -> Result<OneLiner, SummaryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if call < self.failures {
                return Err(SummaryError::EmptyResponse);
            }
            Ok(OneLiner {
                pro: "good".to_string(),
                con: "bad".to_string(),
            })
        }
    }

    /// Never answers its first call.
    struct StalledProvider {
        calls: AtomicUsize,
    }

    impl SummaryProvider for StalledProvider {
        async fn summarize(&self, _request: &SummaryRequest) -> Result<OneLiner, SummaryError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                std::future::pending::<()>().await;
            }
            Ok(OneLiner {
                pro: "late".to_string(),
                con: "answer".to_string(),
            })
        }
    }

    #[test]
    fn cache_key_uses_all_without_homework() {
        assert_eq!(request().cache_key(), "cell::HW3::GPT-4");
        let record = ModelEvidenceAggregate {
            model: "Claude".to_string(),
            ..ModelEvidenceAggregate::default()
        };
        assert_eq!(
            SummaryRequest::from_aggregate(&record).cache_key(),
            "modelCard::ALL::Claude"
        );
    }

    #[test]
    fn prompt_limits_evidence() {
        let prompt = request().prompt();
        assert!(prompt.contains("Evidence for GPT-4 on HW3:"));
        assert!(prompt.contains("strength 1 | strength 2 | strength 3 | strength 4 | strength 5\n"));
        assert!(!prompt.contains("strength 6"));
        assert!(prompt.contains("Weaknesses found: None mentioned"));
    }

    #[test]
    fn parses_plain_and_fenced_json() {
        let plain = parse_one_liner(r#"{"pro":"Fast proofs","con":"Sloppy units"}"#).unwrap();
        assert_eq!(plain.pro, "Fast proofs");

        let fenced = "Sure!\n```json\n{\"pro\": \"Clear\", \"con\": \"Slow\"}\n```";
        let parsed = parse_one_liner(fenced).unwrap();
        assert_eq!(parsed, OneLiner { pro: "Clear".into(), con: "Slow".into() });

        let inline = parse_one_liner("Here: {\"pro\":\"a\",\"con\":\"b\"} done").unwrap();
        assert_eq!(inline.con, "b");
    }

    #[test]
    fn parses_object_with_braces_inside_values() {
        let reply = r#"Summary {draft} follows: {"pro": "Handles {x | x > 0} sets", "con": "Drops }"} thanks"#;
        let parsed = parse_one_liner(reply).unwrap();
        assert_eq!(parsed.pro, "Handles {x | x > 0} sets");
        assert_eq!(parsed.con, "Drops }");

        let fenced = "```json\n{\"pro\": \"Uses {} maps\", \"con\": \"None\"}\n```";
        assert_eq!(parse_one_liner(fenced).unwrap().pro, "Uses {} maps");
    }

    #[test]
    fn rejects_missing_or_blank_fields() {
        assert!(matches!(
            parse_one_liner(r#"{"pro":"only pro"}"#),
            Err(SummaryError::InvalidResponse(_))
        ));
        assert!(parse_one_liner(r#"{"pro":"x","con":"  "}"#).is_err());
        assert!(parse_one_liner("no json here").is_err());
    }

    #[test]
    fn short_api_keys_are_rejected() {
        assert!(matches!(
            ChatCompletionsProvider::new(DEFAULT_ENDPOINT, "  short  ", DEFAULT_CHAT_MODEL),
            Err(SummaryError::MissingApiKey)
        ));
        assert!(ChatCompletionsProvider::new(DEFAULT_ENDPOINT, "sk-abcdefghijkl", DEFAULT_CHAT_MODEL).is_ok());
    }

    #[tokio::test]
    async fn offline_provider_falls_back_on_empty_evidence() {
        let line = OfflineProvider.summarize(&request()).await.unwrap();
        assert_eq!(line.pro, "Students credit GPT-4: strength 1");
        assert_eq!(line.con, "Few posts mention weaknesses for GPT-4.");
    }

    #[tokio::test]
    async fn duplicate_trigger_while_pending_is_noop() {
        let session = SummarySession::new(true, ScriptedProvider::new(0));
        let req = request();
        let (first, second) = tokio::join!(session.request(&req), session.request(&req));

        assert!(matches!(first, SummaryOutcome::Generated(_)));
        assert!(matches!(second, SummaryOutcome::InFlight));
        assert_eq!(session.provider.calls.load(Ordering::SeqCst), 1);
        assert!(session.lock().in_flight.is_empty());
    }

    #[tokio::test]
    async fn successes_are_memoized() {
        let session = SummarySession::new(true, ScriptedProvider::new(0));
        let req = request();
        assert!(matches!(session.request(&req).await, SummaryOutcome::Generated(_)));
        assert!(matches!(session.request(&req).await, SummaryOutcome::Cached(_)));
        assert_eq!(session.provider.calls.load(Ordering::SeqCst), 1);
        assert!(session.lock().cache.contains_key(&req.cache_key()));
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let session = SummarySession::new(true, ScriptedProvider::new(1));
        let req = request();
        assert!(matches!(session.request(&req).await, SummaryOutcome::Failed(_)));
        assert!(session.lock().cache.is_empty());
        assert!(matches!(session.request(&req).await, SummaryOutcome::Generated(_)));
        assert_eq!(session.provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disabled_session_never_calls_provider() {
        let session = SummarySession::new(false, ScriptedProvider::new(0));
        assert!(matches!(session.request(&request()).await, SummaryOutcome::Disabled));
        assert_eq!(session.provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn abandoned_request_can_be_retried() {
        let session = SummarySession::new(
            true,
            StalledProvider {
                calls: AtomicUsize::new(0),
            },
        );
        let req = request();

        let abandoned = tokio::time::timeout(Duration::from_millis(10), session.request(&req)).await;
        assert!(abandoned.is_err());
        assert!(session.lock().in_flight.is_empty());

        assert!(matches!(session.request(&req).await, SummaryOutcome::Generated(_)));
        assert_eq!(session.provider.calls.load(Ordering::SeqCst), 2);
    }
}
