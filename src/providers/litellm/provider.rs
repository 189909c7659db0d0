use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use super::api;
use super::credentials::{env_var, resolve_api_base, resolve_credential};
use super::gateway::{CompletionRequest, EchoGateway, Gateway, GatewayKind, HttpGateway};
use crate::providers::{
    providers::ProviderIdentifier, Error, ErrorKind, InferenceOptions, LanguageModel,
    ScoredOutput, ScoredOutputStream,
};

impl From<api::Error> for Error {
    fn from(value: api::Error) -> Self {
        match value {
            api::Error::RequestFailed(err) => err.into(),
            api::Error::Authentication(_) | api::Error::PermissionDenied(_) => {
                Error::from_source(ErrorKind::Authentication, Box::new(value))
            }
            api::Error::InvalidApiBase(_)
            | api::Error::ClientBuild(_)
            | api::Error::InvalidEndpoint(_) => {
                Error::from_source(ErrorKind::Configuration, Box::new(value))
            }
            api::Error::RateLimit(_) => Error::from_source(ErrorKind::RateLimit, Box::new(value)),
            api::Error::NotFound(_) => {
                Error::from_source(ErrorKind::UnsupportedModel, Box::new(value))
            }
            api::Error::BadRequest(ref payload) | api::Error::UnprocessableEntity(ref payload)
                if payload.names_model() =>
            {
                Error::from_source(ErrorKind::UnsupportedModel, Box::new(value))
            }
            api::Error::BadRequest(_)
            | api::Error::UnprocessableEntity(_)
            | api::Error::InternalError(_)
            | api::Error::ApiOverloaded(_)
            | api::Error::UnknownStatus(_)
            | api::Error::EmptyResponse => Error::from_source(ErrorKind::Delegate, Box::new(value)),
        }
    }
}

/// Prefixes which route an identifier to this provider. They are not part of
/// the model name the gateway expects.
const ROUTING_PREFIXES: [&str; 2] = ["litellm-", "litellm/"];

/// Strips the routing prefix: `litellm-gpt-4` and `litellm/gpt-4` both
/// become `gpt-4`. Other identifiers are returned unchanged.
pub fn gateway_model(model_id: &str) -> &str {
    ROUTING_PREFIXES
        .iter()
        .find_map(|prefix| model_id.strip_prefix(prefix))
        .filter(|model| !model.is_empty())
        .unwrap_or(model_id)
}

/// Construction parameters for [`LiteLLMProvider`].
#[derive(Default, Clone)]
pub struct ProviderConfig {
    /// An explicit key. When unset, the key is read from the environment.
    pub api_key: Option<String>,
    /// Defaults for every call. Per-call options take precedence.
    pub options: InferenceOptions,
    pub gateway: GatewayKind,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("options", &self.options)
            .field("gateway", &self.gateway)
            .finish()
    }
}

pub struct LiteLLMProvider {
    model_id: String,
    gateway_model: String,
    credential: Option<String>,
    options: InferenceOptions,
    gateway: Arc<dyn Gateway>,
}

impl LiteLLMProvider {
    /// Builds a provider, reading missing values from the process environment.
    pub fn new(model_id: &str, config: ProviderConfig) -> Result<LiteLLMProvider, Error> {
        Self::with_env(model_id, config, env_var)
    }

    /// Builds a provider, reading missing values through `lookup`.
    pub fn with_env<F>(
        model_id: &str,
        config: ProviderConfig,
        lookup: F,
    ) -> Result<LiteLLMProvider, Error>
    where
        F: Fn(&str) -> Result<Option<String>, Error>,
    {
        let model = gateway_model(model_id);

        let credential = resolve_credential(config.api_key.as_deref(), model, &lookup)
            .map_err(|e| e.with_context(model_id, None))?;

        let gateway: Arc<dyn Gateway> = match config.gateway {
            GatewayKind::Http => {
                let api_base = resolve_api_base(&config.options, &lookup)
                    .map_err(|e| e.with_context(model_id, None))?;

                let gateway =
                    HttpGateway::new(api_base.as_str()).map_err(|e| e.with_context(model_id, None))?;

                Arc::new(gateway)
            }
            GatewayKind::Echo => Arc::new(EchoGateway),
        };

        tracing::debug!(
            model_id,
            gateway_model = model,
            gateway = %config.gateway,
            has_credential = credential.is_some(),
            "constructed litellm provider"
        );

        Ok(Self::with_gateway(model_id, credential, config.options, gateway))
    }

    /// Builds a provider around an existing gateway. No environment lookups
    /// are performed.
    pub fn with_gateway(
        model_id: &str,
        credential: Option<String>,
        options: InferenceOptions,
        gateway: Arc<dyn Gateway>,
    ) -> LiteLLMProvider {
        LiteLLMProvider {
            model_id: model_id.to_string(),
            gateway_model: gateway_model(model_id).to_string(),
            credential,
            options,
            gateway,
        }
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn gateway_model(&self) -> &str {
        &self.gateway_model
    }

    pub fn options(&self) -> &InferenceOptions {
        &self.options
    }
}

/// Sends one prompt per call to `next`.
struct LiteLLMStream {
    model_id: String,
    gateway_model: String,
    credential: Option<String>,
    options: InferenceOptions,
    gateway: Arc<dyn Gateway>,
    prompts: std::vec::IntoIter<String>,
    index: usize,
}

#[async_trait]
impl ScoredOutputStream for LiteLLMStream {
    async fn next(&mut self) -> Option<Result<Vec<ScoredOutput>, Error>> {
        let prompt = self.prompts.next()?;

        let index = self.index;
        self.index += 1;

        tracing::debug!(model_id = %self.model_id, index, "dispatching prompt");

        let request = CompletionRequest {
            model: &self.gateway_model,
            prompt: &prompt,
            credential: self.credential.as_deref(),
            options: &self.options,
        };

        let result = self.gateway.complete(request).await;

        match result {
            Ok(outputs) => Some(Ok(outputs)),
            Err(err) => {
                let abandoned = self.prompts.len();

                // Fail fast: nothing after a failed prompt is sent
                self.prompts = Vec::new().into_iter();

                tracing::warn!(
                    model_id = %self.model_id,
                    index,
                    abandoned,
                    error = %err,
                    "gateway call failed"
                );

                Some(Err(err.with_context(&self.model_id, Some(index))))
            }
        }
    }

    fn remaining(&self) -> usize {
        self.prompts.len()
    }
}

impl LanguageModel for LiteLLMProvider {
    fn id(&self) -> ProviderIdentifier {
        ProviderIdentifier::LiteLLM
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn infer(
        &self,
        batch_prompts: Vec<String>,
        options: InferenceOptions,
    ) -> Box<dyn ScoredOutputStream> {
        Box::new(LiteLLMStream {
            model_id: self.model_id.clone(),
            gateway_model: self.gateway_model.clone(),
            credential: self.credential.clone(),
            options: self.options.merged(&options),
            gateway: Arc::clone(&self.gateway),
            prompts: batch_prompts.into_iter(),
            index: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::collect_stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records every request and answers from a script.
    struct MockGateway {
        calls: AtomicUsize,
        seen: Mutex<Vec<(String, String, Option<String>, InferenceOptions)>>,
        fail_at: Option<(usize, ErrorKind)>,
        reply: Option<&'static str>,
    }

    impl MockGateway {
        fn echoing() -> MockGateway {
            MockGateway {
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                fail_at: None,
                reply: None,
            }
        }

        fn replying(reply: &'static str) -> MockGateway {
            MockGateway {
                reply: Some(reply),
                ..Self::echoing()
            }
        }

        fn failing_at(index: usize, kind: ErrorKind) -> MockGateway {
            MockGateway {
                fail_at: Some((index, kind)),
                ..Self::echoing()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Gateway for MockGateway {
        async fn complete(
            &self,
            request: CompletionRequest<'_>,
        ) -> Result<Vec<ScoredOutput>, Error> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);

            self.seen.lock().unwrap().push((
                request.model.to_string(),
                request.prompt.to_string(),
                request.credential.map(|c| c.to_string()),
                request.options.clone(),
            ));

            if let Some((index, kind)) = self.fail_at {
                if index == call {
                    return Err(Error::from_kind(kind));
                }
            }

            let output = match self.reply {
                Some(reply) => reply.to_string(),
                None => request.prompt.to_string(),
            };

            Ok(vec![ScoredOutput::new(1.0, output)])
        }
    }

    fn provider(gateway: Arc<MockGateway>) -> LiteLLMProvider {
        LiteLLMProvider::with_gateway(
            "litellm-gpt-3.5-turbo",
            Some("sk-test".to_string()),
            InferenceOptions::default(),
            gateway,
        )
    }

    fn prompts(prompts: &[&str]) -> Vec<String> {
        prompts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_api_error_kinds() {
        let builder_error = reqwest::Client::new()
            .get("not a url")
            .build()
            .expect_err("request should not build");

        let model_payload = || {
            api::ApiErrorPayload::from_body(
                r#"{"error": {"message": "bad", "type": "invalid_request_error", "param": "model"}}"#,
            )
        };
        let plain_payload = || api::ApiErrorPayload::from_body("bad request");

        let cases = [
            (api::Error::ClientBuild(builder_error), ErrorKind::Configuration),
            (
                api::Error::InvalidEndpoint(url::ParseError::EmptyHost),
                ErrorKind::Configuration,
            ),
            (api::Error::PermissionDenied(plain_payload()), ErrorKind::Authentication),
            (api::Error::RateLimit(plain_payload()), ErrorKind::RateLimit),
            (api::Error::NotFound(plain_payload()), ErrorKind::UnsupportedModel),
            (api::Error::BadRequest(model_payload()), ErrorKind::UnsupportedModel),
            (api::Error::UnprocessableEntity(model_payload()), ErrorKind::UnsupportedModel),
            (api::Error::BadRequest(plain_payload()), ErrorKind::Delegate),
            (api::Error::ApiOverloaded(plain_payload()), ErrorKind::Delegate),
            (api::Error::EmptyResponse, ErrorKind::Delegate),
        ];

        for (err, kind) in cases {
            let described = err.to_string();

            assert_eq!(Error::from(err).kind(), kind, "for {}", described);
        }
    }

    #[test]
    fn test_gateway_model() {
        assert_eq!(gateway_model("litellm-gpt-3.5-turbo"), "gpt-3.5-turbo");
        assert_eq!(gateway_model("litellm/claude-3-opus"), "claude-3-opus");
        assert_eq!(gateway_model("gpt-4"), "gpt-4");
        assert_eq!(gateway_model("litellm"), "litellm");
        assert_eq!(gateway_model("litellm-"), "litellm-");
    }

    #[tokio::test]
    async fn test_single_prompt_with_mock_reply() {
        let gateway = Arc::new(MockGateway::replying("mock"));
        let provider = provider(gateway.clone());

        let groups = collect_stream(provider.infer(prompts(&["Hello"]), InferenceOptions::default()))
            .await
            .unwrap();

        assert_eq!(groups, vec![vec![ScoredOutput::new(1.0, "mock".to_string())]]);
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn test_outputs_follow_input_order() {
        let gateway = Arc::new(MockGateway::echoing());
        let provider = provider(gateway.clone());

        let groups = collect_stream(provider.infer(prompts(&["a", "b", "c"]), InferenceOptions::default()))
            .await
            .unwrap();

        let outputs: Vec<&str> = groups.iter().map(|g| g[0].output.as_str()).collect();

        assert_eq!(groups.len(), 3);
        assert_eq!(outputs, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_calls() {
        let gateway = Arc::new(MockGateway::echoing());
        let provider = provider(gateway.clone());

        let mut stream = provider.infer(Vec::new(), InferenceOptions::default());

        assert_eq!(stream.remaining(), 0);
        assert!(stream.next().await.is_none());
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_stream_is_lazy() {
        let gateway = Arc::new(MockGateway::echoing());
        let provider = provider(gateway.clone());

        let mut stream = provider.infer(prompts(&["a", "b"]), InferenceOptions::default());
        assert_eq!(gateway.calls(), 0);

        stream.next().await.unwrap().unwrap();
        assert_eq!(gateway.calls(), 1);
        assert_eq!(stream.remaining(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_fails_fast() {
        let gateway = Arc::new(MockGateway::failing_at(1, ErrorKind::RateLimit));
        let provider = provider(gateway.clone());

        let mut stream = provider.infer(prompts(&["a", "b", "c"]), InferenceOptions::default());

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first[0].output, "a");

        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimit);

        let ctx = err.context().unwrap();
        assert_eq!(ctx.model_id, "litellm-gpt-3.5-turbo");
        assert_eq!(ctx.prompt_index, Some(1));

        assert!(stream.next().await.is_none());
        assert_eq!(stream.remaining(), 0);
        assert_eq!(gateway.calls(), 2);
    }

    #[tokio::test]
    async fn test_collect_surfaces_error() {
        let gateway = Arc::new(MockGateway::failing_at(0, ErrorKind::Authentication));
        let provider = provider(gateway.clone());

        let err = collect_stream(provider.infer(prompts(&["a", "b"]), InferenceOptions::default()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn test_request_carries_gateway_model_credential_and_merged_options() {
        let gateway = Arc::new(MockGateway::echoing());

        let provider = LiteLLMProvider::with_gateway(
            "litellm-gpt-4",
            Some("sk-test".to_string()),
            InferenceOptions {
                temperature: Some(0.1),
                max_tokens: Some(100),
                ..Default::default()
            },
            gateway.clone(),
        );

        let call_options = InferenceOptions {
            temperature: Some(0.7),
            ..Default::default()
        };

        collect_stream(provider.infer(prompts(&["x"]), call_options))
            .await
            .unwrap();

        let seen = gateway.seen.lock().unwrap();
        let (model, prompt, credential, options) = &seen[0];

        assert_eq!(model, "gpt-4");
        assert_eq!(prompt, "x");
        assert_eq!(credential.as_deref(), Some("sk-test"));
        assert_eq!(options.temperature, Some(0.7));
        assert_eq!(options.max_tokens, Some(100));

        // Construction-time options are untouched by the call
        assert_eq!(provider.options().temperature, Some(0.1));
    }

    #[test]
    fn test_new_without_credential_defers_failure() {
        let provider = LiteLLMProvider::with_env(
            "litellm-gpt-3.5-turbo",
            ProviderConfig::default(),
            |_| Ok(None),
        )
        .expect("construction should not require a credential");

        assert_eq!(provider.credential(), None);
        assert_eq!(provider.gateway_model(), "gpt-3.5-turbo");
    }

    #[test]
    fn test_new_reads_environment_fallbacks() {
        let provider = LiteLLMProvider::with_env(
            "litellm-claude-3-opus",
            ProviderConfig::default(),
            |name| Ok((name == "ANTHROPIC_API_KEY").then(|| "sk-ant".to_string())),
        )
        .unwrap();

        assert_eq!(provider.credential(), Some("sk-ant"));
    }

    #[test]
    fn test_new_with_invalid_api_base() {
        let config = ProviderConfig {
            options: InferenceOptions {
                api_base: Some("not a url".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let err = LiteLLMProvider::with_env("litellm-gpt-4", config, |_| Ok(None))
            .err()
            .unwrap();

        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.context().unwrap().model_id, "litellm-gpt-4");
    }

    #[tokio::test]
    async fn test_echo_gateway_provider() {
        let config = ProviderConfig {
            gateway: GatewayKind::Echo,
            ..Default::default()
        };

        let provider = LiteLLMProvider::with_env("litellm-gpt-4", config, |_| Ok(None)).unwrap();

        let groups = collect_stream(provider.infer(prompts(&["Hello"]), InferenceOptions::default()))
            .await
            .unwrap();

        assert_eq!(
            groups,
            vec![vec![ScoredOutput::new(
                1.0,
                "Mock response for: Hello...".to_string()
            )]]
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = ProviderConfig {
            api_key: Some("sk-secret".to_string()),
            ..Default::default()
        };

        let debug = format!("{:?}", config);

        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
