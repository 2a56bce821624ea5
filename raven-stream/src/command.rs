//! Encoded commands as the session sees them
//!
//! The session does not know the command catalogue. Callers hand it a
//! [`CommandRequest`]: a name for logging, the bytes to write, and the
//! fragment roots that may answer it.

use bytes::Bytes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    name: String,
    payload: Bytes,
    reply_roots: Vec<String>,
}

impl CommandRequest {
    /// A command that expects one reply whose root is in `reply_roots`
    pub fn new<I, S>(name: impl Into<String>, payload: impl Into<Bytes>, reply_roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            payload: payload.into(),
            reply_roots: reply_roots.into_iter().map(Into::into).collect(),
        }
    }

    /// A command the gateway does not answer
    pub fn without_reply(name: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
            reply_roots: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn reply_roots(&self) -> &[String] {
        &self.reply_roots
    }

    pub fn expects_reply(&self) -> bool {
        !self.reply_roots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_bearing_request() {
        let request = CommandRequest::new(
            "get_time",
            "<Command><Name>get_time</Name></Command>",
            ["TimeCluster"],
        );
        assert_eq!(request.name(), "get_time");
        assert_eq!(request.reply_roots(), ["TimeCluster".to_string()]);
        assert!(request.expects_reply());
        assert!(request.payload().starts_with(b"<Command>"));
    }

    #[test]
    fn test_fire_and_forget_request() {
        let request = CommandRequest::without_reply("restart", Bytes::from_static(b"<Command/>"));
        assert!(!request.expects_reply());
        assert!(request.reply_roots().is_empty());
    }
}
