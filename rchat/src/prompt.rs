//! Assembles upstream messages from configuration, history and the new user turn.

use rgateway::{ContentPart, Message, MessageContent, Role};

use crate::{Attachment, AttachmentSource, ChatError, Turn};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Give clear, accurate and \
concise answers, and use the available tools when they help answer the question.";

pub const SEARCH_SYSTEM_PROMPT: &str =
    "You are a helpful search assistant. Provide comprehensive and accurate search results.";

/// Prompt sent for a search query.
pub fn search_prompt(query: &str) -> String {
    format!(
        "Please search for information about: \"{query}\"\n\n\
         Provide comprehensive search results including:\n\
         1. Relevant information and facts\n\
         2. Multiple perspectives if applicable\n\
         3. Recent developments or updates\n\
         4. Reliable sources when possible\n\n\
         Format the response as structured search results."
    )
}

/// Reads every attachment. Fails on the first unreadable one, naming it.
pub async fn load_attachments(attachments: &[Attachment]) -> Result<Vec<ContentPart>, ChatError> {
    let mut parts = Vec::with_capacity(attachments.len());

    for attachment in attachments {
        let data = match &attachment.source {
            AttachmentSource::Bytes(bytes) => bytes.clone(),
            AttachmentSource::Path(path) => tokio::fs::read(path)
                .await
                .map_err(|error| ChatError::attachment_read(&attachment.filename, error))?,
        };

        parts.push(if attachment.is_image() {
            ContentPart::image(data, attachment.mime.clone())
        } else {
            ContentPart::file(data, attachment.mime.clone(), attachment.filename.clone())
        });
    }

    Ok(parts)
}

/// Plain text without attachments; otherwise the text part followed by the attachments
/// in request order.
pub fn user_content(text: &str, attachments: Vec<ContentPart>) -> MessageContent {
    if attachments.is_empty() {
        return MessageContent::Text(text.to_string());
    }

    let mut parts = Vec::with_capacity(attachments.len() + 1);
    parts.push(ContentPart::text(text));
    parts.extend(attachments);
    MessageContent::Multimodal(parts)
}

/// System message first, then history flattened to text, then the new user message.
/// Stored system turns are skipped; the system prompt is configuration.
pub fn assemble_messages(
    system_prompt: Option<&str>,
    history: &[Turn],
    user: MessageContent,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(
        system_prompt
            .filter(|prompt| !prompt.trim().is_empty())
            .unwrap_or(DEFAULT_SYSTEM_PROMPT),
    ));

    messages.extend(
        history
            .iter()
            .filter(|turn| turn.role != Role::System)
            .map(|turn| Message::new(turn.role, turn.content.flatten_text())),
    );
    messages.push(Message::user(user));
    messages
}

#[cfg(test)]
mod tests {
    use rcommon::SessionId;

    use super::*;
    use crate::ChatErrorKind;

    #[tokio::test]
    async fn attachments_are_routed_by_media_type() {
        let parts = load_attachments(&[
            Attachment::from_bytes("chart.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47]),
            Attachment::from_bytes("brief.pdf", "application/pdf", b"%PDF-1.7".to_vec()),
        ])
        .await
        .expect("bytes are readable");

        assert_eq!(
            parts,
            vec![
                ContentPart::image(vec![0x89, 0x50, 0x4e, 0x47], "image/png"),
                ContentPart::file(b"%PDF-1.7".to_vec(), "application/pdf", "brief.pdf"),
            ]
        );
    }

    #[tokio::test]
    async fn unreadable_attachment_fails_the_whole_build() {
        let error = load_attachments(&[
            Attachment::from_bytes("ok.txt", "text/plain", b"fine".to_vec()),
            Attachment::from_path("/definitely/not/here/missing.pdf", "application/pdf"),
        ])
        .await
        .expect_err("missing file");

        assert_eq!(error.kind, ChatErrorKind::AttachmentRead);
        assert!(error.message.contains("'missing.pdf'"));
    }

    #[test]
    fn user_content_is_plain_text_without_attachments() {
        assert_eq!(
            user_content("hi", Vec::new()),
            MessageContent::Text("hi".to_string())
        );

        let content = user_content("look", vec![ContentPart::image(vec![1], "image/gif")]);
        assert_eq!(
            content,
            MessageContent::Multimodal(vec![
                ContentPart::text("look"),
                ContentPart::image(vec![1], "image/gif"),
            ])
        );
    }

    #[test]
    fn history_is_flattened_and_system_prompt_defaults() {
        let session = SessionId::from("s1");
        let history = vec![
            Turn::new(
                session.clone(),
                Role::User,
                MessageContent::Multimodal(vec![
                    ContentPart::text("what is this"),
                    ContentPart::image(vec![1, 2], "image/png"),
                ]),
                0,
            ),
            Turn::new(session.clone(), Role::System, "stale config", 0),
            Turn::new(session, Role::Assistant, "a cat", 12),
        ];

        let messages = assemble_messages(None, &history, "and now?".into());

        assert_eq!(
            messages,
            vec![
                Message::system(DEFAULT_SYSTEM_PROMPT),
                Message::user("what is this"),
                Message::assistant("a cat"),
                Message::user("and now?"),
            ]
        );

        let configured = assemble_messages(Some("be terse"), &[], "q".into());
        assert_eq!(configured[0], Message::system("be terse"));
    }

    #[test]
    fn search_prompt_embeds_query() {
        let prompt = search_prompt("rust async");
        assert!(prompt.starts_with("Please search for information about: \"rust async\"\n\n"));
        assert!(prompt.ends_with("Format the response as structured search results."));
    }
}
