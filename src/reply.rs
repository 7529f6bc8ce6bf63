//! Reply text generation through a chat completion service

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use std::time::Duration;
use tracing::debug;

use crate::config::CompletionSettings;
use crate::error::{ReplyError, Result};

/// Instruction appended after the quoted message
pub const REPLY_INSTRUCTION: &str = "Generate a polite reply email.";

/// Produces reply text for one message
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, subject: &str, sender: &str, body: &str) -> Result<String>;
}

/// Prompt embedding the message verbatim, followed by the reply instruction
pub fn build_prompt(subject: &str, sender: &str, body: &str) -> String {
    format!(
        "Subject: {}\nFrom: {}\nBody: {}\n\n{}",
        subject, sender, body, REPLY_INSTRUCTION
    )
}

/// Reply generator backed by an OpenAI-compatible chat completion endpoint
pub struct OpenAiReplyGenerator {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiReplyGenerator {
    pub fn new(settings: &CompletionSettings) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(settings.api_key.clone());
        if let Some(base) = &settings.api_base {
            config = config.with_api_base(base.clone());
        }

        // One attempt only: the first failure ends the backoff
        let no_retry = ExponentialBackoff {
            max_elapsed_time: Some(Duration::ZERO),
            ..Default::default()
        };

        Self {
            client: Client::with_config(config).with_backoff(no_retry),
            model: settings.model.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ReplyGenerator for OpenAiReplyGenerator {
    async fn generate(&self, subject: &str, sender: &str, body: &str) -> Result<String> {
        let prompt = build_prompt(subject, sender, body);

        let message: ChatCompletionRequestMessage = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()?
            .into();

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages(vec![message])
            .build()?;

        debug!("Requesting completion from model {}", self.model);
        let response = self.client.chat().create(request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                ReplyError::CompletionService("Completion returned no text".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(server: &MockServer) -> CompletionSettings {
        CompletionSettings {
            api_key: "sk-test".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            api_base: Some(server.uri()),
        }
    }

    fn completion_body(choices: serde_json::Value) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "gpt-3.5-turbo",
            "choices": choices,
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        })
    }

    #[test]
    fn test_build_prompt_verbatim() {
        let prompt = build_prompt("Lunch?", "Bob <bob@x.com>", "Are you free Friday?");
        assert_eq!(
            prompt,
            "Subject: Lunch?\nFrom: Bob <bob@x.com>\nBody: Are you free Friday?\n\nGenerate a polite reply email."
        );
    }

    #[test]
    fn test_build_prompt_no_escaping() {
        let prompt = build_prompt("{braces}", "\"Q\" <q@x>", "line1\nline2\n\nBody: fake");
        assert!(prompt.contains("Body: line1\nline2\n\nBody: fake\n\n"));
        assert!(prompt.starts_with("Subject: {braces}\n"));
    }

    #[tokio::test]
    async fn test_generate_returns_first_choice() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-3.5-turbo",
                "messages": [{
                    "role": "user",
                    "content": build_prompt("Lunch?", "Bob <bob@x.com>", "Are you free Friday?")
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(json!([
                {
                    "index": 0,
                    "message": {"role": "assistant", "content": "Sure, Friday works!"},
                    "finish_reason": "stop"
                },
                {
                    "index": 1,
                    "message": {"role": "assistant", "content": "Second choice"},
                    "finish_reason": "stop"
                }
            ]))))
            .expect(1)
            .mount(&server)
            .await;

        let generator = OpenAiReplyGenerator::new(&settings(&server));
        let reply = generator
            .generate("Lunch?", "Bob <bob@x.com>", "Are you free Friday?")
            .await
            .unwrap();

        assert_eq!(reply, "Sure, Friday works!");
    }

    #[tokio::test]
    async fn test_generate_empty_choices_is_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(json!([]))))
            .mount(&server)
            .await;

        let generator = OpenAiReplyGenerator::new(&settings(&server));
        let result = generator.generate("s", "f", "b").await;

        assert!(matches!(result, Err(ReplyError::CompletionService(_))));
    }

    #[tokio::test]
    async fn test_generate_server_error_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": {
                    "message": "The server had an error",
                    "type": "server_error",
                    "param": null,
                    "code": null
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let generator = OpenAiReplyGenerator::new(&settings(&server));
        let result = generator.generate("s", "f", "b").await;

        assert!(matches!(result, Err(ReplyError::CompletionService(_))));
    }

    #[tokio::test]
    async fn test_generate_unreachable_endpoint() {
        let generator = OpenAiReplyGenerator::new(&CompletionSettings {
            api_key: "sk-test".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            api_base: Some("http://127.0.0.1:9".to_string()),
        });

        let result = generator.generate("s", "f", "b").await;
        assert!(matches!(result, Err(ReplyError::CompletionService(_))));
    }
}
