//! OpenAI-compatible chat-completions payloads and conversion helpers.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    Choice, ContentPart, FinishReason, GatewayError, MessageContent, ModelRequest, ModelResponse,
    TokenUsage, ToolInvocation,
};

/// Encodes a request into the JSON body sent to `/v1/chat/completions`.
///
/// ```rust
/// use rgateway::{ContentPart, Message, MessageContent, ModelRequest, encode_request};
///
/// let request = ModelRequest::new(
///     "openai/gpt-4o-mini",
///     vec![Message::user(MessageContent::Multimodal(vec![
///         ContentPart::text("look"),
///         ContentPart::image(b"png".to_vec(), "image/png"),
///     ]))],
/// );
/// let body = encode_request(&request, true).unwrap();
///
/// assert_eq!(body["stream"], true);
/// assert_eq!(body["messages"][0]["content"][1]["image_url"]["url"], "data:image/png;base64,cG5n");
/// ```
pub fn encode_request(request: &ModelRequest, stream: bool) -> Result<Value, GatewayError> {
    serde_json::to_value(ApiRequest::from_request(request, stream)).map_err(|error| {
        GatewayError::protocol(format!("failed to encode request body: {error}"))
    })
}

pub(crate) fn decode_response(body: &[u8]) -> Result<ModelResponse, GatewayError> {
    let parsed: ApiResponse = serde_json::from_slice(body)
        .map_err(|error| GatewayError::protocol(format!("failed to decode response: {error}")))?;
    Ok(parsed.into_model_response())
}

/// Builds the error for a non-2xx upstream response. Bodies that do not match the
/// `{"error": {...}}` envelope yield a status-only error.
pub(crate) fn decode_error(status: u16, body: &[u8]) -> GatewayError {
    match serde_json::from_slice::<ApiErrorEnvelope>(body) {
        Ok(envelope) => {
            let mut error = GatewayError::from_status(status, envelope.error.message);
            if let Some(error_type) = envelope.error.r#type.filter(|value| !value.is_empty()) {
                error = error.with_error_type(error_type);
            }
            if let Some(code) = envelope.error.code.and_then(value_as_label) {
                error = error.with_code(code);
            }
            error
        }
        Err(_) => GatewayError::from_status(status, format!("API error (status {status})")),
    }
}

#[cfg(feature = "gateway-http")]
pub(crate) fn decode_model_list(body: &[u8]) -> Result<Vec<String>, GatewayError> {
    let parsed: ApiModelList = serde_json::from_slice(body)
        .map_err(|error| GatewayError::protocol(format!("failed to decode models: {error}")))?;
    Ok(parsed.data.into_iter().map(|model| model.id).collect())
}

fn value_as_label(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

impl ApiRequest {
    fn from_request(request: &ModelRequest, stream: bool) -> Self {
        let tools = request
            .tools
            .iter()
            .map(|tool| ApiTool {
                r#type: "function",
                function: ApiFunction {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.parameters.clone(),
                },
            })
            .collect::<Vec<_>>();
        let tool_choice = (!tools.is_empty()).then(|| request.tool_choice.as_str());

        Self {
            model: request.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|message| ApiMessage {
                    role: message.role.as_str(),
                    content: ApiContent::from(&message.content),
                })
                .collect(),
            stream,
            temperature: request.options.temperature,
            max_tokens: request.options.max_tokens,
            top_p: request.options.top_p,
            frequency_penalty: request.options.frequency_penalty,
            presence_penalty: request.options.presence_penalty,
            stop: request.options.stop.clone(),
            tools,
            tool_choice,
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: ApiContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ApiContent {
    Text(String),
    Parts(Vec<ApiContentPart>),
}

impl From<&MessageContent> for ApiContent {
    fn from(value: &MessageContent) -> Self {
        match value {
            MessageContent::Text(text) => Self::Text(text.clone()),
            MessageContent::Multimodal(parts) => {
                Self::Parts(parts.iter().map(ApiContentPart::from).collect())
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentPart {
    Text { text: String },
    ImageUrl { image_url: ApiImageUrl },
    File { file: ApiFile },
}

impl From<&ContentPart> for ApiContentPart {
    fn from(value: &ContentPart) -> Self {
        match value {
            ContentPart::Text(text) => Self::Text { text: text.clone() },
            ContentPart::InlineImage { data, mime } => Self::ImageUrl {
                image_url: ApiImageUrl {
                    url: format!("data:{mime};base64,{}", STANDARD.encode(data)),
                    detail: "auto",
                },
            },
            ContentPart::InlineFile {
                data,
                mime,
                filename,
            } => Self::File {
                file: ApiFile {
                    data: STANDARD.encode(data),
                    media_type: mime.clone(),
                    filename: filename.clone(),
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Debug, Serialize)]
struct ApiFile {
    data: String,
    media_type: String,
    filename: String,
}

#[derive(Debug, Serialize)]
struct ApiTool {
    r#type: &'static str,
    function: ApiFunction,
}

#[derive(Debug, Serialize)]
struct ApiFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
    #[serde(default)]
    r#type: Option<String>,
    #[serde(default)]
    code: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

impl ApiResponse {
    fn into_model_response(self) -> ModelResponse {
        ModelResponse {
            id: self.id,
            model: self.model,
            choices: self
                .choices
                .into_iter()
                .map(ApiChoice::into_choice)
                .collect(),
            usage: self.usage.map(TokenUsage::from),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    message: Option<ApiAssistantMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
    /// Some gateways place tool calls on the choice rather than the message.
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

impl ApiChoice {
    fn into_choice(self) -> Choice {
        let (text, message_calls) = match self.message {
            Some(message) => (
                message
                    .content
                    .as_ref()
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .unwrap_or_default(),
                message.tool_calls.unwrap_or_default(),
            ),
            None => (String::new(), Vec::new()),
        };

        let tool_invocations = message_calls
            .into_iter()
            .chain(self.tool_calls.unwrap_or_default())
            .map(ApiToolCall::into_invocation)
            .collect();

        Choice {
            index: self.index,
            text,
            tool_invocations,
            finish_reason: FinishReason::parse(self.finish_reason.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiAssistantMessage {
    /// Only string content is read; array-form content decodes as empty text.
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: String,
    function: ApiToolFunction,
}

impl ApiToolCall {
    fn into_invocation(self) -> ToolInvocation {
        ToolInvocation::new(self.id, self.function.name, self.function.arguments)
    }
}

#[derive(Debug, Deserialize)]
struct ApiToolFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl From<ApiUsage> for TokenUsage {
    fn from(value: ApiUsage) -> Self {
        Self {
            prompt_tokens: value.prompt_tokens,
            completion_tokens: value.completion_tokens,
            total_tokens: value.total_tokens,
        }
    }
}

/// One `data:` payload of the SSE stream.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiStreamChunk {
    #[serde(default)]
    pub choices: Vec<ApiStreamChoice>,
    #[serde(default)]
    pub usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiStreamChoice {
    #[serde(default)]
    pub delta: Option<ApiStreamDelta>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiStreamDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ApiDeltaToolCall>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiDeltaToolCall {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<ApiDeltaToolFunction>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiDeltaToolFunction {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

#[cfg(feature = "gateway-http")]
#[derive(Debug, Deserialize)]
struct ApiModelList {
    #[serde(default)]
    data: Vec<ApiModel>,
}

#[cfg(feature = "gateway-http")]
#[derive(Debug, Deserialize)]
struct ApiModel {
    id: String,
}

#[cfg(test)]
mod tests {
    use rcommon::GenerationOptions;
    use serde_json::json;

    use super::*;
    use crate::{GatewayErrorKind, Message, ToolDeclaration};

    #[test]
    fn request_body_carries_sampling_tools_and_choice() {
        let request = ModelRequest::new("m", vec![Message::system("sys"), Message::user("hi")])
            .with_options(
                GenerationOptions::default()
                    .with_temperature(0.5)
                    .with_max_tokens(64)
                    .with_top_p(1.0)
                    .with_frequency_penalty(0.0)
                    .with_presence_penalty(0.25)
                    .with_stop(["END"]),
            )
            .with_tools(vec![ToolDeclaration {
                name: "calculate".to_string(),
                description: "math".to_string(),
                parameters: json!({"type": "object"}),
            }]);

        let body = encode_request(&request, false).expect("body should encode");

        assert!(body.get("stream").is_none());
        assert_eq!(body["messages"][0], json!({"role": "system", "content": "sys"}));
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["presence_penalty"], 0.25);
        assert_eq!(body["stop"], json!(["END"]));
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "calculate");
        assert_eq!(body["tool_choice"], "auto");
    }

    #[test]
    fn request_body_omits_tool_choice_without_tools() {
        let request = ModelRequest::new("m", vec![Message::user("hi")]);
        let body = encode_request(&request, true).expect("body should encode");

        assert_eq!(body["stream"], true);
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
        assert!(body.get("stop").is_none());
    }

    #[test]
    fn file_parts_encode_data_media_type_and_filename() {
        let request = ModelRequest::new(
            "m",
            vec![Message::user(MessageContent::Multimodal(vec![
                ContentPart::text("summarize"),
                ContentPart::file(b"%PDF-1.7".to_vec(), "application/pdf", "a.pdf"),
            ]))],
        );
        let body = encode_request(&request, false).expect("body should encode");
        let part = &body["messages"][0]["content"][1];

        assert_eq!(part["type"], "file");
        assert_eq!(part["file"]["media_type"], "application/pdf");
        assert_eq!(part["file"]["filename"], "a.pdf");
        let decoded = STANDARD
            .decode(part["file"]["data"].as_str().expect("data is a string"))
            .expect("data is base64");
        assert_eq!(decoded, b"%PDF-1.7");
    }

    #[test]
    fn response_collects_tool_calls_from_message_and_choice() {
        let body = json!({
            "id": "chatcmpl-1",
            "model": "m",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{"id": "a", "type": "function", "function": {"name": "calculate", "arguments": "{\"expression\":\"1+1\"}"}}]
                },
                "tool_calls": [{"id": "b", "type": "function", "function": {"name": "get_current_time", "arguments": "{}"}}],
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 3, "completion_tokens": 4, "total_tokens": 7}
        });

        let response = decode_response(body.to_string().as_bytes()).expect("decodes");
        let choice = response.first_choice().expect("one choice");

        assert_eq!(response.id, "chatcmpl-1");
        assert_eq!(choice.text, "");
        assert_eq!(choice.finish_reason, FinishReason::ToolCalls);
        assert_eq!(
            choice
                .tool_invocations
                .iter()
                .map(|call| call.id.as_str())
                .collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_eq!(response.total_tokens(), Some(7));
    }

    #[test]
    fn non_string_content_reads_as_empty_text() {
        let body = json!({
            "id": "chatcmpl-2",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": [{"type": "text", "text": "hello"}],
                    "tool_calls": [{"id": "a", "type": "function", "function": {"name": "calculate", "arguments": "{\"expression\":\"2+2\"}"}}]
                },
                "finish_reason": "tool_calls"
            }]
        });

        let response = decode_response(body.to_string().as_bytes()).expect("decodes");
        let choice = response.first_choice().expect("one choice");

        assert_eq!(choice.text, "");
        assert_eq!(choice.tool_invocations.len(), 1);
    }

    #[test]
    fn error_bodies_map_to_typed_errors() {
        let body = br#"{"error":{"message":"quota exceeded","type":"insufficient_quota","code":"billing"}}"#;
        let error = decode_error(429, body);
        assert_eq!(error.kind, GatewayErrorKind::RateLimited);
        assert_eq!(error.message, "quota exceeded");
        assert_eq!(error.error_type.as_deref(), Some("insufficient_quota"));
        assert_eq!(error.code.as_deref(), Some("billing"));

        let opaque = decode_error(500, b"<html>oops</html>");
        assert_eq!(opaque.message, "API error (status 500)");
        assert_eq!(opaque.status, Some(500));
        assert_eq!(opaque.error_type, None);
    }
}
