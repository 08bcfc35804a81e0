use crate::error::ClientError;
use crate::message_id::MessageId;
use bytes;
use std::collections::HashMap;
use std::vec::Vec;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    /// In the publisher-subscriber model, a topic is an addresses where messages are delivered to and subscribed from.
    pub topic: String,

    pub tag: String,

    pub keys: Vec<String>,

    /// User defined attributes in form of key-value paris.
    /// Attributes are indexed by backend broker servers, thus, may be utilized to query.
    pub attributes: HashMap<String, String>,

    /// System properties
    ///
    /// System properties include key-value pairs to modify how messages are delivered to subscribers. For example, a
    /// request message carries the correlation id its reply must echo back.
    pub(crate) properties: HashMap<String, String>,

    pub body: bytes::Bytes,

    /// Assigned once a broker has stored the message.
    pub(crate) msg_id: Option<MessageId>,
}

impl Message {
    pub fn new(topic: &str, body: impl Into<bytes::Bytes>) -> Self {
        Self {
            topic: topic.to_owned(),
            body: body.into(),
            ..Default::default()
        }
    }

    /// Build a message as it is handed back from a broker, carrying its stored identity.
    ///
    /// # Errors
    /// Raise ClientError::InvalidMessage if the topic is empty.
    pub fn stored(
        topic: &str,
        body: impl Into<bytes::Bytes>,
        msg_id: MessageId,
    ) -> Result<Self, ClientError> {
        if topic.is_empty() {
            return Err(ClientError::InvalidMessage(
                "Stored message has no topic".to_owned(),
            ));
        }
        let mut message = Message::new(topic, body);
        message.msg_id = Some(msg_id);
        Ok(message)
    }

    pub fn msg_id(&self) -> Option<&MessageId> {
        self.msg_id.as_ref()
    }

    pub fn set_msg_id(&mut self, msg_id: MessageId) {
        self.msg_id = Some(msg_id);
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn put_property(&mut self, key: &str, value: &str) {
        self.properties.insert(key.to_owned(), value.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    #[test]
    fn test_new() {
        let message = Message::new("T1", "Test Body");
        assert_eq!(message.topic, "T1");
        assert_eq!(message.body, bytes::Bytes::from("Test Body"));
        assert_eq!(message.msg_id(), None);
        assert!(message.keys.is_empty());
    }

    #[test]
    fn test_stored() -> Result<(), Box<dyn std::error::Error>> {
        let addr: SocketAddr = "192.0.2.1:10911".parse()?;
        let message = Message::stored("T1", "Test Body", MessageId::new(Some(addr), 42))?;
        assert_eq!(message.msg_id().map(MessageId::offset), Some(42));

        let result = Message::stored("", "Test Body", MessageId::default());
        assert!(matches!(result, Err(ClientError::InvalidMessage(_))));
        Ok(())
    }

    #[test]
    fn test_property() {
        let mut message = Message::new("T1", "");
        message.put_property("CORRELATION_ID", "abc");
        assert_eq!(message.property("CORRELATION_ID"), Some("abc"));
        assert_eq!(message.property("missing"), None);
    }
}
