//! Protocol messages for peerfs.
//!
//! Each message is one JSON object whose `type` field selects the variant.
//! Requests and replies share the same enum; which ones expect a reply is
//! answered by [`MessageType::expects_reply`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{FileRecord, PeerId, SyncError};

/// Message type discriminator, as written in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Request the full listing
    GetFiles,
    /// Listing reply
    FilesList,
    /// Request one file's bytes
    GetFile,
    /// File bytes reply
    FileContent,
    /// Push one file or an empty directory
    SendFile,
    /// Delete one file
    DeleteFile,
    /// Delete a directory tree
    DeleteDir,
    /// Delete acknowledgement
    DeleteAck,
    /// Gossip of completed actions
    SyncLogs,
    /// Failure reply
    Error,
}

impl MessageType {
    const ALL: [MessageType; 10] = [
        MessageType::GetFiles,
        MessageType::FilesList,
        MessageType::GetFile,
        MessageType::FileContent,
        MessageType::SendFile,
        MessageType::DeleteFile,
        MessageType::DeleteDir,
        MessageType::DeleteAck,
        MessageType::SyncLogs,
        MessageType::Error,
    ];

    /// Wire name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::GetFiles => "GET_FILES",
            MessageType::FilesList => "FILES_LIST",
            MessageType::GetFile => "GET_FILE",
            MessageType::FileContent => "FILE_CONTENT",
            MessageType::SendFile => "SEND_FILE",
            MessageType::DeleteFile => "DELETE_FILE",
            MessageType::DeleteDir => "DELETE_DIR",
            MessageType::DeleteAck => "DELETE_ACK",
            MessageType::SyncLogs => "SYNC_LOGS",
            MessageType::Error => "ERROR",
        }
    }

    /// Look up a type by its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Whether a request of this type is answered on the same connection.
    pub fn expects_reply(&self) -> bool {
        matches!(
            self,
            MessageType::GetFiles
                | MessageType::GetFile
                | MessageType::DeleteFile
                | MessageType::DeleteDir
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All possible protocol messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Request the sender's full listing
    GetFiles,
    /// Listing reply
    FilesList(FilesList),
    /// Request one file
    GetFile(GetFile),
    /// File bytes reply
    FileContent(FileContent),
    /// Push a file (fire-and-forget)
    SendFile(SendFile),
    /// Delete a single file
    DeleteFile(DeleteRequest),
    /// Delete a directory tree
    DeleteDir(DeleteRequest),
    /// Reply to DELETE_FILE / DELETE_DIR
    DeleteAck(DeleteAck),
    /// Completed-action gossip (fire-and-forget)
    SyncLogs(SyncLogs),
    /// Failure reply
    Error(ErrorReply),
}

impl Message {
    /// The discriminator of this message.
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::GetFiles => MessageType::GetFiles,
            Message::FilesList(_) => MessageType::FilesList,
            Message::GetFile(_) => MessageType::GetFile,
            Message::FileContent(_) => MessageType::FileContent,
            Message::SendFile(_) => MessageType::SendFile,
            Message::DeleteFile(_) => MessageType::DeleteFile,
            Message::DeleteDir(_) => MessageType::DeleteDir,
            Message::DeleteAck(_) => MessageType::DeleteAck,
            Message::SyncLogs(_) => MessageType::SyncLogs,
            Message::Error(_) => MessageType::Error,
        }
    }

    /// Serialize to one newline-terminated JSON line.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SyncError> {
        let mut bytes = serde_json::to_vec(self).map_err(SyncError::Serialization)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Deserialize one JSON value.
    ///
    /// An object whose `type` is not a known message yields
    /// [`SyncError::UnknownMessageType`] so callers can tell it apart from
    /// malformed input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SyncError> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(SyncError::Deserialization)?;

        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or(SyncError::MissingMessageType)?;

        if MessageType::from_name(kind).is_none() {
            return Err(SyncError::UnknownMessageType(kind.to_string()));
        }

        serde_json::from_value(value).map_err(SyncError::Deserialization)
    }
}

/// Listing reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesList {
    /// Every entry below the shared root.
    #[serde(default)]
    pub files: Vec<FileRecord>,
}

/// Request for a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetFile {
    /// Relative name of the file.
    pub name: String,
}

/// File bytes reply.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    /// Relative name of the file.
    pub name: String,
    /// Raw bytes, base64 on the wire.
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
}

impl fmt::Debug for FileContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileContent")
            .field("name", &self.name)
            .field("content", &format!("[{} bytes]", self.content.len()))
            .finish()
    }
}

/// Push of a file, or of an empty directory when `is_dir` is set.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendFile {
    /// Relative name; bare names land at the receiver's root.
    pub name: String,
    /// Raw bytes, base64 on the wire; empty for directories.
    #[serde(default, with = "base64_bytes")]
    pub content: Vec<u8>,
    /// Create a directory instead of writing a file.
    #[serde(default)]
    pub is_dir: bool,
}

impl SendFile {
    /// Push of a regular file.
    pub fn file(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content,
            is_dir: false,
        }
    }

    /// Announcement of a directory ahead of its files.
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: Vec::new(),
            is_dir: true,
        }
    }
}

impl fmt::Debug for SendFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendFile")
            .field("name", &self.name)
            .field("content", &format!("[{} bytes]", self.content.len()))
            .field("is_dir", &self.is_dir)
            .finish()
    }
}

/// Body of DELETE_FILE and DELETE_DIR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    /// Relative name to remove.
    pub name: String,
}

/// Outcome carried by DELETE_ACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteStatus {
    /// The path existed and was removed.
    Ok,
    /// The path was missing or could not be removed.
    Error,
}

/// Delete acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAck {
    /// Whether the delete took effect.
    pub status: DeleteStatus,
}

/// Completed action kinds carried by SYNC_LOGS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogAction {
    /// A file appeared locally
    Create,
    /// A path was removed on the target
    Delete,
    /// A file was delivered to the target
    Transfer,
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogAction::Create => "CREATE",
            LogAction::Delete => "DELETE",
            LogAction::Transfer => "TRANSFER",
        };
        f.write_str(name)
    }
}

/// One gossiped action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogEntry {
    /// What happened.
    pub action: LogAction,
    /// Relative name affected.
    pub file_name: String,
    /// Peer that holds the data.
    #[serde(alias = "originID")]
    pub origin_id: PeerId,
    /// Peer that received the effect.
    #[serde(alias = "targetID")]
    pub target_id: PeerId,
}

/// Gossip broadcast of completed actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLogs {
    /// The actions, oldest first.
    #[serde(default)]
    pub logs: Vec<SyncLogEntry>,
}

/// Failure reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    /// Human-readable reason.
    pub error: String,
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn get_files_is_a_bare_type() {
        let bytes = Message::GetFiles.to_bytes().unwrap();
        assert_eq!(bytes, b"{\"type\":\"GET_FILES\"}\n");
    }

    #[test]
    fn send_file_wire_shape() {
        let msg = Message::SendFile(SendFile::file("docs/a.txt", b"hello".to_vec()));
        let json: serde_json::Value = serde_json::from_slice(&msg.to_bytes().unwrap()).unwrap();

        assert_eq!(json["type"], "SEND_FILE");
        assert_eq!(json["name"], "docs/a.txt");
        assert_eq!(json["content"], "aGVsbG8=");
        assert_eq!(json["isDir"], false);
    }

    #[test]
    fn send_file_directory_without_content_decodes() {
        let msg = Message::from_bytes(br#"{"type":"SEND_FILE","name":"docs","isDir":true}"#).unwrap();
        match msg {
            Message::SendFile(send) => {
                assert!(send.is_dir);
                assert!(send.content.is_empty());
            }
            other => panic!("expected SendFile, got {:?}", other),
        }
    }

    #[test]
    fn files_list_carries_records() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let msg = Message::FilesList(FilesList {
            files: vec![
                FileRecord::directory("docs", at),
                FileRecord::file("docs/x.txt", at),
            ],
        });

        let restored = Message::from_bytes(&msg.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, msg);
    }

    #[test]
    fn delete_ack_status_is_lowercase() {
        let msg = Message::DeleteAck(DeleteAck {
            status: DeleteStatus::Error,
        });
        let json: serde_json::Value = serde_json::from_slice(&msg.to_bytes().unwrap()).unwrap();
        assert_eq!(json["type"], "DELETE_ACK");
        assert_eq!(json["status"], "error");
    }

    #[test]
    fn sync_logs_accept_legacy_id_spelling() {
        let raw = br#"{"type":"SYNC_LOGS","logs":[{"action":"DELETE","fileName":"a.txt","originID":1,"targetID":2}]}"#;
        let msg = Message::from_bytes(raw).unwrap();
        match msg {
            Message::SyncLogs(logs) => {
                assert_eq!(logs.logs.len(), 1);
                assert_eq!(logs.logs[0].action, LogAction::Delete);
                assert_eq!(logs.logs[0].origin_id, PeerId::new(1));
                assert_eq!(logs.logs[0].target_id, PeerId::new(2));
            }
            other => panic!("expected SyncLogs, got {:?}", other),
        }
    }

    #[test]
    fn unknown_type_is_distinguished() {
        let err = Message::from_bytes(br#"{"type":"PING"}"#).unwrap_err();
        assert!(matches!(err, SyncError::UnknownMessageType(t) if t == "PING"));

        let err = Message::from_bytes(br#"{"name":"x"}"#).unwrap_err();
        assert!(matches!(err, SyncError::MissingMessageType));

        let err = Message::from_bytes(b"not json").unwrap_err();
        assert!(matches!(err, SyncError::Deserialization(_)));
    }

    #[test]
    fn bad_base64_is_rejected() {
        let err = Message::from_bytes(br#"{"type":"FILE_CONTENT","name":"a","content":"@@@"}"#)
            .unwrap_err();
        assert!(matches!(err, SyncError::Deserialization(_)));
    }

    #[test]
    fn message_type_names_round_trip() {
        for t in MessageType::ALL {
            assert_eq!(MessageType::from_name(t.as_str()), Some(t));
        }
        assert!(MessageType::GetFile.expects_reply());
        assert!(!MessageType::SendFile.expects_reply());
        assert!(!MessageType::SyncLogs.expects_reply());
    }

    #[test]
    fn message_type_matches_variant() {
        let msg = Message::DeleteDir(DeleteRequest {
            name: "docs".into(),
        });
        let json: serde_json::Value = serde_json::from_slice(&msg.to_bytes().unwrap()).unwrap();
        assert_eq!(json["type"], msg.message_type().as_str());
    }

    #[test]
    fn content_debug_hides_bytes() {
        let content = FileContent {
            name: "secret.txt".into(),
            content: vec![0xAB; 16],
        };
        let debug = format!("{:?}", content);
        assert!(debug.contains("[16 bytes]"));
        assert!(!debug.contains("171"));
    }
}
