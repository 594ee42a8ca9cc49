//! JSON column encoding for turn content.
//!
//! ```rust
//! use rgateway::{ContentPart, MessageContent};
//! use rmemory::{decode_content, encode_content};
//!
//! let content = MessageContent::Multimodal(vec![
//!     ContentPart::text("see attached"),
//!     ContentPart::image(b"png".to_vec(), "image/png"),
//! ]);
//! let column = encode_content(&content).expect("encodes");
//! assert!(column.contains("\"data\":\"cG5n\""));
//! assert_eq!(decode_content(&column).expect("decodes"), content);
//! ```

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rgateway::{ContentPart, MessageContent};
use serde::{Deserialize, Serialize};

use crate::MemoryError;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StoredContent {
    Text { text: String },
    Multimodal { parts: Vec<StoredPart> },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StoredPart {
    Text {
        text: String,
    },
    Image {
        data: String,
        mime: String,
    },
    File {
        data: String,
        mime: String,
        filename: String,
    },
}

pub fn encode_content(content: &MessageContent) -> Result<String, MemoryError> {
    let stored = match content {
        MessageContent::Text(text) => StoredContent::Text { text: text.clone() },
        MessageContent::Multimodal(parts) => StoredContent::Multimodal {
            parts: parts.iter().map(encode_part).collect(),
        },
    };

    serde_json::to_string(&stored)
        .map_err(|error| MemoryError::codec(format!("failed to encode turn content: {error}")))
}

pub fn decode_content(value: &str) -> Result<MessageContent, MemoryError> {
    let stored = serde_json::from_str::<StoredContent>(value)
        .map_err(|error| MemoryError::codec(format!("failed to decode turn content: {error}")))?;

    Ok(match stored {
        StoredContent::Text { text } => MessageContent::Text(text),
        StoredContent::Multimodal { parts } => MessageContent::Multimodal(
            parts
                .into_iter()
                .map(decode_part)
                .collect::<Result<Vec<_>, _>>()?,
        ),
    })
}

fn encode_part(part: &ContentPart) -> StoredPart {
    match part {
        ContentPart::Text(text) => StoredPart::Text { text: text.clone() },
        ContentPart::InlineImage { data, mime } => StoredPart::Image {
            data: STANDARD.encode(data),
            mime: mime.clone(),
        },
        ContentPart::InlineFile {
            data,
            mime,
            filename,
        } => StoredPart::File {
            data: STANDARD.encode(data),
            mime: mime.clone(),
            filename: filename.clone(),
        },
    }
}

fn decode_part(part: StoredPart) -> Result<ContentPart, MemoryError> {
    Ok(match part {
        StoredPart::Text { text } => ContentPart::Text(text),
        StoredPart::Image { data, mime } => ContentPart::InlineImage {
            data: decode_bytes(&data)?,
            mime,
        },
        StoredPart::File {
            data,
            mime,
            filename,
        } => ContentPart::InlineFile {
            data: decode_bytes(&data)?,
            mime,
            filename,
        },
    })
}

fn decode_bytes(data: &str) -> Result<Vec<u8>, MemoryError> {
    STANDARD
        .decode(data)
        .map_err(|error| MemoryError::codec(format!("invalid attachment bytes: {error}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryErrorKind;

    #[test]
    fn plain_text_is_stored_as_tagged_object() {
        let column = encode_content(&MessageContent::Text("hi".to_string())).expect("encodes");
        assert_eq!(column, r#"{"type":"text","text":"hi"}"#);
    }

    #[test]
    fn file_parts_keep_name_and_bytes() {
        let content = MessageContent::Multimodal(vec![ContentPart::file(
            vec![0, 159, 146, 150],
            "application/pdf",
            "brief.pdf",
        )]);

        let decoded = decode_content(&encode_content(&content).expect("encodes")).expect("decodes");
        assert_eq!(decoded, content);
    }

    #[test]
    fn corrupt_columns_are_codec_errors() {
        let error = decode_content("not json").expect_err("invalid json");
        assert_eq!(error.kind, MemoryErrorKind::Codec);

        let error = decode_content(
            r#"{"type":"multimodal","parts":[{"type":"image","data":"***","mime":"image/png"}]}"#,
        )
        .expect_err("invalid base64");
        assert_eq!(error.kind, MemoryErrorKind::Codec);
    }
}
