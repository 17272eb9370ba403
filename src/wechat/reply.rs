use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};

use super::MessageError;

/// Passive text reply sent back as the HTTP response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextReply {
    pub to_user: String,
    pub from_user: String,
    pub create_time: i64,
    pub content: String,
}

impl TextReply {
    pub const MSG_TYPE: &'static str = "text";

    pub fn to_xml(&self) -> Result<String, MessageError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        let create_time = self.create_time.to_string();

        write_event(&mut writer, Event::Start(BytesStart::new("xml")))?;
        write_cdata(&mut writer, "ToUserName", &self.to_user)?;
        write_cdata(&mut writer, "FromUserName", &self.from_user)?;
        write_event(&mut writer, Event::Start(BytesStart::new("CreateTime")))?;
        write_event(&mut writer, Event::Text(BytesText::new(&create_time)))?;
        write_event(&mut writer, Event::End(BytesEnd::new("CreateTime")))?;
        write_cdata(&mut writer, "MsgType", Self::MSG_TYPE)?;
        write_cdata(&mut writer, "Content", &self.content)?;
        write_event(&mut writer, Event::End(BytesEnd::new("xml")))?;

        String::from_utf8(writer.into_inner().into_inner())
            .map_err(|e| MessageError::Serialize(e.to_string()))
    }
}

fn write_event(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> Result<(), MessageError> {
    writer
        .write_event(event)
        .map_err(|e| MessageError::Serialize(e.to_string()))
}

fn write_cdata(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    name: &str,
    value: &str,
) -> Result<(), MessageError> {
    if value.contains("]]>") {
        return Err(MessageError::Serialize(format!(
            "{name} contains a CDATA terminator"
        )));
    }

    write_event(writer, Event::Start(BytesStart::new(name)))?;
    write_event(writer, Event::CData(BytesCData::new(value)))?;
    write_event(writer, Event::End(BytesEnd::new(name)))
}

/// Build the reply to a message from `sender` addressed to `recipient`.
///
/// Roles are swapped: the reply goes from `recipient` back to `sender`.
pub fn compose_text_reply(sender: &str, recipient: &str, content: &str) -> TextReply {
    TextReply {
        to_user: sender.to_string(),
        from_user: recipient.to_string(),
        create_time: chrono::Utc::now().timestamp(),
        content: content.to_string(),
    }
}
