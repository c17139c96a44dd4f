//! Multimodal chat messages
//!
//! The seed of every analysis is a message carrying the screenshot; the
//! reasoning backends receive it as an inline base64 data URL.

use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::USER_SOURCE;

/// An encoded screenshot (PNG, JPEG, WebP...) ready for a vision call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInput {
    /// MIME type, e.g. `image/png`
    pub media_type: String,
    /// Raw encoded bytes
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl ImageInput {
    pub fn new(media_type: &str, data: Vec<u8>) -> Self {
        Self {
            media_type: media_type.to_string(),
            data,
        }
    }

    /// Base64 payload without the data URL prefix
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    /// `data:<mime>;base64,<payload>` form accepted by OpenAI-compatible APIs
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.to_base64())
    }

    /// Short content hash used to correlate log lines for one screenshot
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.data);
        format!("{:x}", hasher.finalize())[..16].to_string()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

/// One piece of a multimodal message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { image: ImageInput },
}

/// A message submitted to the team from outside the agent list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who submitted the message
    pub source: String,
    /// Ordered content parts
    pub parts: Vec<ContentPart>,
}

impl ChatMessage {
    /// A user message carrying only a screenshot
    pub fn image(image: ImageInput) -> Self {
        Self {
            source: USER_SOURCE.to_string(),
            parts: vec![ContentPart::Image { image }],
        }
    }

    /// A user message carrying plain text
    pub fn text(text: &str) -> Self {
        Self {
            source: USER_SOURCE.to_string(),
            parts: vec![ContentPart::Text {
                text: text.to_string(),
            }],
        }
    }

    /// Concatenated text parts
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn images(&self) -> impl Iterator<Item = &ImageInput> {
        self.parts.iter().filter_map(|part| match part {
            ContentPart::Image { image } => Some(image),
            ContentPart::Text { .. } => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url() {
        let image = ImageInput::new("image/png", vec![0x89, 0x50, 0x4e, 0x47]);
        assert_eq!(image.to_data_url(), "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = ImageInput::new("image/png", b"same bytes".to_vec());
        let b = ImageInput::new("image/jpeg", b"same bytes".to_vec());
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);
    }

    #[test]
    fn test_image_message() {
        let msg = ChatMessage::image(ImageInput::new("image/png", vec![1, 2, 3]));
        assert_eq!(msg.source, "User");
        assert_eq!(msg.images().count(), 1);
        assert!(msg.text_content().is_empty());
    }

    #[test]
    fn test_image_serializes_as_base64() {
        let image = ImageInput::new("image/png", vec![1, 2, 3]);
        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json["data"], "AQID");
        let back: ImageInput = serde_json::from_value(json).unwrap();
        assert_eq!(back, image);
    }
}
