//! Chat-completions executor backed by `async-openai`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs, ResponseFormat,
        ResponseFormatJsonSchema,
    },
    Client,
};
use serde_json::Value;
use tower::{BoxError, Service};
use tracing::{debug, instrument};

use super::{ExecuteRequest, ExecutionResult};
use crate::config::AgoraConfig;
use crate::conversation::{AgentOutput, Speaker};
use crate::error::AgoraError;
use crate::identity::{AgentIdentity, OutputSchema};

/// Executor calling the OpenAI chat completions API once per invocation.
#[derive(Clone)]
pub struct OpenAIExecutor {
    client: Arc<Client<OpenAIConfig>>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl OpenAIExecutor {
    pub fn new(client: Arc<Client<OpenAIConfig>>) -> Self {
        Self {
            client,
            model: "gpt-4o".to_string(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Build from configuration using a client that reads `OPENAI_API_KEY`.
    pub fn from_config(config: &AgoraConfig) -> Self {
        let mut exec = Self::new(Arc::new(Client::new())).model(config.model.clone());
        exec.temperature = config.temperature;
        exec.max_tokens = config.max_tokens;
        exec
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    pub fn max_tokens(mut self, mt: u32) -> Self {
        self.max_tokens = Some(mt);
        self
    }

    /// Translate an invocation into a chat completion request.
    pub fn build_request(
        &self,
        req: &ExecuteRequest,
    ) -> Result<CreateChatCompletionRequest, AgoraError> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();
        let sys = ChatCompletionRequestSystemMessageArgs::default()
            .content(req.identity.instructions.clone())
            .build()?;
        messages.push(sys.into());

        for turn in req.input.to_conversation().turns() {
            let msg: ChatCompletionRequestMessage = match &turn.speaker {
                Speaker::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.content.clone())
                    .build()?
                    .into(),
                Speaker::Agent(name) => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.content.clone())
                    .name(name.clone())
                    .build()?
                    .into(),
            };
            messages.push(msg);
        }

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&self.model).messages(messages);
        if let Some(t) = self.temperature {
            builder.temperature(t);
        }
        if let Some(mt) = self.max_tokens {
            builder.max_completion_tokens(mt);
        }
        if let Some(schema) = &req.identity.output_schema {
            builder.response_format(response_format(schema));
        }
        Ok(builder.build()?)
    }
}

fn response_format(schema: &OutputSchema) -> ResponseFormat {
    let mut body = schema.schema.clone();
    if let Value::Object(map) = &mut body {
        map.remove("$schema");
        map.insert("additionalProperties".to_string(), Value::Bool(false));
    }
    ResponseFormat::JsonSchema {
        json_schema: ResponseFormatJsonSchema {
            description: None,
            name: schema.name.clone(),
            schema: Some(body),
            strict: Some(true),
        },
    }
}

fn read_output(identity: &AgentIdentity, content: String) -> Result<AgentOutput, AgoraError> {
    if !identity.is_structured() {
        return Ok(AgentOutput::Text(content));
    }
    serde_json::from_str::<Value>(&content)
        .map(AgentOutput::Structured)
        .map_err(|e| AgoraError::SchemaMismatch {
            agent: identity.name.clone(),
            message: format!("reply is not JSON: {}", e),
        })
}

impl Service<ExecuteRequest> for OpenAIExecutor {
    type Response = ExecutionResult;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ExecuteRequest) -> Self::Future {
        let this = self.clone();
        Box::pin(async move { this.complete(req).await.map_err(BoxError::from) })
    }
}

impl OpenAIExecutor {
    #[instrument(skip_all, fields(agent = %req.identity.name, model = %self.model))]
    async fn complete(&self, req: ExecuteRequest) -> Result<ExecutionResult, AgoraError> {
        let request = self.build_request(&req)?;
        let response = self.client.chat().create(request).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgoraError::SchemaMismatch {
                agent: req.identity.name.clone(),
                message: "no choices in response".to_string(),
            })?;
        if let Some(usage) = &response.usage {
            debug!(
                prompt = usage.prompt_tokens,
                completion = usage.completion_tokens,
                "completion usage"
            );
        }
        let content = choice.message.content.unwrap_or_default();
        let output = read_output(&req.identity, content)?;
        Ok(ExecutionResult::reply(&req, output))
    }
}
