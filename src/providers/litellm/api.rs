use reqwest::{Client, IntoUrl};
use serde::{Deserialize, Serialize};

use crate::providers::apireq::{self, Url};
use crate::providers::InferenceOptions;

#[derive(thiserror::Error, Debug)]
pub(super) enum Error {
    /// The API Base is not a URL that can be used in a network request
    #[error("invalid api base")]
    InvalidApiBase(#[source] reqwest::Error),

    /// The HTTP client could not be set up
    #[error("failed to build the http client")]
    ClientBuild(#[source] reqwest::Error),

    /// Endpoint URL is invalid
    #[error("invalid endpoint")]
    InvalidEndpoint(
        #[from]
        #[source]
        url::ParseError,
    ),

    /// Some issue with the request
    #[error("{}", .0)]
    RequestFailed(
        #[from]
        #[source]
        apireq::ReqwestError,
    ),

    /// The request was malformed or named a model the gateway does not route.
    #[error("{}", .0.message)]
    BadRequest(ApiErrorPayload),

    /// The key is missing, invalid or expired.
    #[error("{}", .0.message)]
    Authentication(ApiErrorPayload),

    /// The key is valid but may not use the requested resource.
    #[error("{}", .0.message)]
    PermissionDenied(ApiErrorPayload),

    /// Requested resource does not exist.
    #[error("{}", .0.message)]
    NotFound(ApiErrorPayload),

    /// Unable to process the request despite the format being correct.
    #[error("{}", .0.message)]
    UnprocessableEntity(ApiErrorPayload),

    /// The gateway or the upstream provider is rate limiting the key.
    #[error("{}", .0.message)]
    RateLimit(ApiErrorPayload),

    /// The gateway or upstream provider failed
    #[error("{}", .0.message)]
    InternalError(ApiErrorPayload),

    /// The upstream provider is overloaded
    #[error("{}", .0.message)]
    ApiOverloaded(ApiErrorPayload),

    /// Some unknown error was returned by the API
    #[error("{}", .0.message)]
    UnknownStatus(ApiErrorPayload),

    #[error("the gateway returned no choices")]
    EmptyResponse,
}

impl Error {
    fn from_status(status: u16, payload: ApiErrorPayload) -> Error {
        match status {
            400 => Error::BadRequest(payload),
            401 => Error::Authentication(payload),
            403 => Error::PermissionDenied(payload),
            404 => Error::NotFound(payload),
            422 => Error::UnprocessableEntity(payload),
            429 => Error::RateLimit(payload),
            500 => Error::InternalError(payload),
            502 | 503 => Error::ApiOverloaded(payload),
            _ => Error::UnknownStatus(payload),
        }
    }
}

// Prompts are sent as a single user turn
#[derive(Serialize, Debug, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub(super) enum Role {
    User,
}

#[derive(Serialize, Debug)]
pub(super) struct ChatMessage<'m> {
    pub content: &'m str,
    pub role: Role,
}

/* Structures to serialize /v1/chat/completions */

#[derive(Serialize, Debug)]
struct ChatCompletionOptions<'o> {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'o [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f64>,
    #[serde(flatten)]
    extra: &'o serde_json::Map<String, serde_json::Value>,
}

impl<'o> From<&'o InferenceOptions> for ChatCompletionOptions<'o> {
    fn from(value: &'o InferenceOptions) -> Self {
        ChatCompletionOptions {
            temperature: value.temperature,
            top_p: value.top_p,
            n: value.n,
            stop: value.stop.as_deref(),
            max_tokens: value.max_tokens,
            seed: value.seed,
            presence_penalty: value.presence_penalty,
            frequency_penalty: value.frequency_penalty,
            extra: &value.extra,
        }
    }
}

#[derive(Serialize, Debug)]
struct ChatCompletionRequest<'o> {
    model: &'o str,
    messages: &'o [ChatMessage<'o>],
    #[serde(flatten)]
    options: ChatCompletionOptions<'o>,
    stream: bool,
}

/* Structures to deseralize /v1/chat/completions */

#[derive(Deserialize, Debug, Default)]
pub(super) struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Deserialize, Debug)]
pub(super) struct TokenLogprob {
    pub logprob: f64,
}

#[derive(Deserialize, Debug, Default)]
pub(super) struct ChoiceLogprobs {
    #[serde(default)]
    pub content: Option<Vec<TokenLogprob>>,
}

#[derive(Deserialize, Debug, Default)]
pub(super) struct Choice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub logprobs: Option<ChoiceLogprobs>,
}

impl Choice {
    /// The geometric mean of the token probabilities, when the gateway
    /// returned logprobs. Otherwise 1.0.
    pub(super) fn score(&self) -> f64 {
        let tokens = match self.logprobs.as_ref().and_then(|l| l.content.as_ref()) {
            Some(tokens) if !tokens.is_empty() => tokens,
            _ => return 1.0,
        };

        let total: f64 = tokens.iter().map(|t| t.logprob).sum();

        (total / tokens.len() as f64).exp()
    }
}

#[derive(Deserialize, Debug)]
pub(super) struct Usage {
    pub completion_tokens: usize,
    pub prompt_tokens: usize,
}

#[derive(Deserialize, Debug)]
pub(super) struct ChatCompletion {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: Option<String>,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

/* API Errors */

#[derive(Deserialize, Debug, Default)]
pub(super) struct ApiErrorPayload {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    typ: Option<String>,
    #[serde(default)]
    param: Option<String>,
    // LiteLLM sends the status code here, sometimes as a string
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl ApiErrorPayload {
    pub(super) fn from_body(body: &str) -> ApiErrorPayload {
        match serde_json::from_str::<ApiErrorResponse>(body) {
            Ok(res) => res.error,
            Err(_) => ApiErrorPayload {
                message: body.trim().to_string(),
                ..Default::default()
            },
        }
    }

    /// Whether the gateway is complaining about the requested model rather
    /// than about the request in general.
    pub(super) fn names_model(&self) -> bool {
        if self.param.as_deref() == Some("model") {
            return true;
        }

        let code_names_model = match &self.code {
            Some(serde_json::Value::String(code)) => code == "model_not_found",
            _ => false,
        };

        let message = self.message.to_lowercase();

        code_names_model
            || self.typ.as_deref() == Some("model_not_found")
            || message.contains("invalid model")
            || message.contains("model not found")
            || message.contains("llm provider not provided")
    }
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    error: ApiErrorPayload,
}

/// The LiteLLM proxy default listen address
pub(super) const DEFAULT_API_BASE: &str = "http://localhost:4000";

/// Joins the chat completions route onto the API base. The base may carry a
/// path prefix, with or without the `/v1` segment.
fn endpoint(api_base: &Url) -> Result<Url, url::ParseError> {
    let mut base = api_base.clone();

    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    if base.path().ends_with("/v1/") {
        base.join("chat/completions")
    } else {
        base.join("v1/chat/completions")
    }
}

pub(super) struct LiteLLMApi {
    api_base: Url,
    client: Client,
}

impl LiteLLMApi {
    pub(super) fn new<U: IntoUrl>(api_base: U) -> Result<LiteLLMApi, Error> {
        let api_base = api_base.into_url().map_err(Error::InvalidApiBase)?;

        let client = Client::builder().build().map_err(Error::ClientBuild)?;

        Ok(LiteLLMApi { api_base, client })
    }

    /// Sends a single-turn, non-streaming chat completion.
    ///
    /// `options.api_base` takes precedence over the base this client was
    /// created with.
    pub(super) async fn chat_completion(
        &self,
        model: &str,
        prompt: &str,
        api_key: Option<&str>,
        options: &InferenceOptions,
    ) -> Result<ChatCompletion, Error> {
        let url = match &options.api_base {
            Some(api_base) => endpoint(&Url::parse(api_base)?)?,
            None => endpoint(&self.api_base)?,
        };

        let messages = [ChatMessage {
            content: prompt,
            role: Role::User,
        }];

        let mut req = self.client.post(url).json(&ChatCompletionRequest {
            model,
            messages: &messages,
            options: options.into(),
            stream: false,
        });

        if let Some(api_key) = api_key {
            req = req.bearer_auth(api_key);
        }

        if let Some(timeout) = options.timeout_duration() {
            req = req.timeout(timeout);
        }

        let res = req
            .send()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        let status = res.status();

        if status.is_success() {
            let completion: ChatCompletion = res
                .json()
                .await
                .map_err(|e| Error::RequestFailed(e.into()))?;

            Ok(completion)
        } else {
            let body = res
                .text()
                .await
                .map_err(|e| Error::RequestFailed(e.into()))?;

            let mut payload = ApiErrorPayload::from_body(&body);

            if payload.message.is_empty() {
                payload.message = status.to_string();
            }

            Err(Error::from_status(status.as_u16(), payload))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion_body(contents: &[&str]) -> serde_json::Value {
        let choices: Vec<serde_json::Value> = contents
            .iter()
            .enumerate()
            .map(|(i, c)| {
                json!({
                    "index": i,
                    "message": {"role": "assistant", "content": c},
                    "finish_reason": "stop"
                })
            })
            .collect();

        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 0,
            "model": "gpt-4o-mini",
            "choices": choices,
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
        })
    }

    #[test]
    fn test_endpoint_join() {
        let cases = [
            ("http://localhost:4000", "http://localhost:4000/v1/chat/completions"),
            ("http://localhost:4000/", "http://localhost:4000/v1/chat/completions"),
            ("http://proxy/litellm", "http://proxy/litellm/v1/chat/completions"),
            ("http://proxy/litellm/v1", "http://proxy/litellm/v1/chat/completions"),
        ];

        for (base, expected) in cases {
            let url = endpoint(&Url::parse(base).unwrap()).unwrap();
            assert_eq!(url.as_str(), expected);
        }
    }

    #[test]
    fn test_request_serialization_skips_unset_options() {
        let mut options = InferenceOptions {
            temperature: Some(0.5),
            api_base: Some("http://ignored".to_string()),
            timeout: Some(3.0),
            ..Default::default()
        };
        options.extra.insert("user".to_string(), json!("bot"));

        let messages = [ChatMessage {
            content: "Hello",
            role: Role::User,
        }];

        let body = serde_json::to_value(ChatCompletionRequest {
            model: "gpt-4",
            messages: &messages,
            options: (&options).into(),
            stream: false,
        })
        .unwrap();

        assert_eq!(
            body,
            json!({
                "model": "gpt-4",
                "messages": [{"content": "Hello", "role": "user"}],
                "temperature": 0.5,
                "user": "bot",
                "stream": false
            })
        );
    }

    #[test]
    fn test_choice_score() {
        let choice: Choice = serde_json::from_value(json!({
            "index": 0,
            "message": {"content": "x"},
            "logprobs": {"content": [{"token": "a", "logprob": -0.5}, {"token": "b", "logprob": -1.5}]}
        }))
        .unwrap();

        assert!((choice.score() - (-1.0f64).exp()).abs() < 1e-12);

        let choice = Choice::default();
        assert_eq!(choice.score(), 1.0);
    }

    #[test]
    fn test_payload_names_model() {
        let payload = ApiErrorPayload::from_body(
            r#"{"error": {"message": "Invalid model name passed in model=foo", "type": "invalid_request_error", "param": null, "code": "400"}}"#,
        );
        assert!(payload.names_model());

        let payload = ApiErrorPayload::from_body(
            r#"{"error": {"message": "bad", "type": "invalid_request_error", "param": "model", "code": 400}}"#,
        );
        assert!(payload.names_model());

        let payload = ApiErrorPayload::from_body(
            r#"{"error": {"message": "messages must not be empty", "type": "invalid_request_error"}}"#,
        );
        assert!(!payload.names_model());

        let payload = ApiErrorPayload::from_body("upstream exploded");
        assert_eq!(payload.message, "upstream exploded");
        assert!(!payload.names_model());
    }

    #[tokio::test]
    async fn test_chat_completion() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "max_tokens": 16,
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(&["Hi!"])))
            .expect(1)
            .mount(&server)
            .await;

        let api = LiteLLMApi::new(server.uri()).unwrap();
        let options = InferenceOptions {
            max_tokens: Some(16),
            ..Default::default()
        };

        let completion = api
            .chat_completion("gpt-4o-mini", "Hello", Some("sk-test"), &options)
            .await
            .expect("completion should succeed");

        assert_eq!(completion.choices.len(), 1);
        assert_eq!(completion.choices[0].message.content.as_deref(), Some("Hi!"));
        assert_eq!(completion.usage.unwrap().prompt_tokens, 3);
    }

    #[tokio::test]
    async fn test_per_call_api_base_wins() {
        let unused = MockServer::start().await;
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(&["ok"])))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&unused)
            .await;

        let api = LiteLLMApi::new(unused.uri()).unwrap();
        let options = InferenceOptions {
            api_base: Some(server.uri()),
            ..Default::default()
        };

        let completion = api
            .chat_completion("gpt-4", "Hello", None, &options)
            .await
            .expect("completion should succeed");

        assert_eq!(completion.choices[0].message.content.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let cases: [(u16, fn(&Error) -> bool); 5] = [
            (401, |e| matches!(e, Error::Authentication(_))),
            (403, |e| matches!(e, Error::PermissionDenied(_))),
            (404, |e| matches!(e, Error::NotFound(_))),
            (429, |e| matches!(e, Error::RateLimit(_))),
            (500, |e| matches!(e, Error::InternalError(_))),
        ];

        for (status, check) in cases {
            let server = MockServer::start().await;

            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                    "error": {"message": "nope", "type": "error", "code": status.to_string()}
                })))
                .mount(&server)
                .await;

            let api = LiteLLMApi::new(server.uri()).unwrap();

            let err = api
                .chat_completion("gpt-4", "Hello", None, &InferenceOptions::default())
                .await
                .expect_err("should fail");

            assert!(check(&err), "unexpected error for {}: {:?}", status, err);
            assert_eq!(err.to_string(), "nope");
        }
    }

    #[tokio::test]
    async fn test_undecodable_success_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let api = LiteLLMApi::new(server.uri()).unwrap();

        let err = api
            .chat_completion("gpt-4", "Hello", None, &InferenceOptions::default())
            .await
            .expect_err("should fail");

        assert!(matches!(err, Error::RequestFailed(_)));
    }

    #[tokio::test]
    async fn test_invalid_per_call_api_base() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(&["ok"])))
            .expect(0)
            .mount(&server)
            .await;

        let api = LiteLLMApi::new(server.uri()).unwrap();
        let options = InferenceOptions {
            api_base: Some("not a url".to_string()),
            ..Default::default()
        };

        let err = api
            .chat_completion("gpt-4", "Hello", None, &options)
            .await
            .expect_err("should fail");

        assert!(matches!(err, Error::InvalidEndpoint(_)));
    }

    #[test]
    fn test_invalid_api_base() {
        assert!(matches!(
            LiteLLMApi::new("not a url"),
            Err(Error::InvalidApiBase(_))
        ));
    }
}
