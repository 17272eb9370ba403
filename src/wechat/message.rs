use serde::Deserialize;

use super::MessageError;

/// Message kind as carried in `MsgType`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MsgKind {
    Text,
    Image,
    Voice,
    Video,
    ShortVideo,
    Location,
    Link,
    Event,
    Other(String),
}

impl From<&str> for MsgKind {
    fn from(value: &str) -> Self {
        match value {
            "text" => MsgKind::Text,
            "image" => MsgKind::Image,
            "voice" => MsgKind::Voice,
            "video" => MsgKind::Video,
            "shortvideo" => MsgKind::ShortVideo,
            "location" => MsgKind::Location,
            "link" => MsgKind::Link,
            "event" => MsgKind::Event,
            other => MsgKind::Other(other.to_string()),
        }
    }
}

/// One inbound platform callback.
///
/// Only `to_user`, `from_user` and `content` drive the pipeline; the
/// kind-specific fields are kept so handlers and logs can see them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "ToUserName", default)]
    pub to_user: String,
    #[serde(rename = "FromUserName", default)]
    pub from_user: String,
    #[serde(rename = "CreateTime", default)]
    pub create_time: i64,
    #[serde(rename = "MsgType", default)]
    pub msg_type: String,
    #[serde(rename = "Content", default)]
    pub content: String,
    #[serde(rename = "PicUrl")]
    pub pic_url: Option<String>,
    #[serde(rename = "MediaId")]
    pub media_id: Option<String>,
    #[serde(rename = "Format")]
    pub format: Option<String>,
    #[serde(rename = "Recognition")]
    pub recognition: Option<String>,
    #[serde(rename = "ThumbMediaId")]
    pub thumb_media_id: Option<String>,
    #[serde(rename = "Location_X")]
    pub location_x: Option<f64>,
    #[serde(rename = "Location_Y")]
    pub location_y: Option<f64>,
    #[serde(rename = "Scale")]
    pub scale: Option<i64>,
    #[serde(rename = "Label")]
    pub label: Option<String>,
    #[serde(rename = "MsgId")]
    pub msg_id: Option<i64>,
}

impl InboundMessage {
    pub fn kind(&self) -> MsgKind {
        MsgKind::from(self.msg_type.as_str())
    }

    /// Content with surrounding whitespace removed
    pub fn trimmed_content(&self) -> &str {
        self.content.trim()
    }
}

/// Parse an inbound XML envelope
pub fn parse_inbound(body: &[u8]) -> Result<InboundMessage, MessageError> {
    let text = std::str::from_utf8(body).map_err(|e| MessageError::Malformed(e.to_string()))?;
    quick_xml::de::from_str(text).map_err(|e| MessageError::Malformed(e.to_string()))
}
