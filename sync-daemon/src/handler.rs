//! Inbound request dispatch.
//!
//! Maps one decoded request to at most one reply. Requests that never get a
//! reply (SEND_FILE, SYNC_LOGS) return `None`; so does anything the
//! connection should simply be closed on.

use crate::error::NodeError;
use crate::node::Node;
use std::sync::Arc;
use sync_types::{
    DeleteAck, DeleteRequest, DeleteStatus, ErrorReply, FileContent, FilesList, GetFile,
    LogAction, Message, SendFile,
};

/// Handle one request on behalf of the local node.
pub async fn dispatch(node: &Arc<Node>, message: Message) -> Option<Message> {
    let kind = message.message_type();
    tracing::debug!("Handling {}", kind);

    match message {
        Message::GetFiles => Some(handle_get_files(node).await),
        Message::GetFile(req) => Some(handle_get_file(node, req).await),
        Message::SendFile(req) => {
            handle_send_file(node, req).await;
            None
        }
        Message::DeleteFile(req) => Some(handle_delete(node, req, false).await),
        Message::DeleteDir(req) => Some(handle_delete(node, req, true).await),
        Message::SyncLogs(logs) => {
            for entry in logs.logs {
                node.apply_sync_log(entry).await;
            }
            None
        }
        Message::FilesList(_)
        | Message::FileContent(_)
        | Message::DeleteAck(_)
        | Message::Error(_) => {
            tracing::warn!("Unexpected {} received as a request", kind);
            Some(error_reply(format!("{} is not a request", kind)))
        }
    }
}

fn error_reply(error: impl Into<String>) -> Message {
    Message::Error(ErrorReply {
        error: error.into(),
    })
}

async fn handle_get_files(node: &Node) -> Message {
    match node.shared().list().await {
        Ok(files) => {
            node.snapshots()
                .replace(&node.local().address, files.clone());
            Message::FilesList(FilesList { files })
        }
        Err(e) => {
            tracing::error!("Listing shared root failed: {}", e);
            error_reply(e.to_string())
        }
    }
}

async fn handle_get_file(node: &Node, req: GetFile) -> Message {
    match node.shared().read(&req.name).await {
        Ok(content) => {
            tracing::debug!("Serving {} ({} bytes)", req.name, content.len());
            Message::FileContent(FileContent {
                name: req.name,
                content,
            })
        }
        Err(e) => {
            tracing::warn!("GET_FILE {} refused: {}", req.name, e);
            error_reply(e.to_string())
        }
    }
}

async fn handle_send_file(node: &Node, req: SendFile) {
    let stored = if req.is_dir {
        node.shared().create_dir(&req.name).await
    } else {
        node.shared().write(&req.name, &req.content).await
    };

    match stored {
        Ok(record) => {
            tracing::info!(
                "Received {} {}",
                if record.is_directory { "directory" } else { "file" },
                record.name
            );
            let name = record.name.clone();
            node.snapshots().append(&node.local().address, record);
            let local = node.local().id;
            node.record(LogAction::Create, &name, local, local).await;
        }
        Err(e) => tracing::warn!("SEND_FILE {} not stored: {}", req.name, e),
    }
}

async fn handle_delete(node: &Node, req: DeleteRequest, recursive: bool) -> Message {
    let removed = if recursive {
        node.shared().remove(&req.name).await.map(|_| ())
    } else {
        node.shared().remove_entry(&req.name).await
    };

    let status = match removed {
        Ok(()) => {
            node.snapshots()
                .remove_under(&node.local().address, &req.name);
            tracing::info!("Deleted {} on request", req.name);
            DeleteStatus::Ok
        }
        Err(NodeError::NotFound(name)) => {
            tracing::debug!("Delete of missing {}", name);
            DeleteStatus::Error
        }
        Err(e) => {
            tracing::warn!("Delete of {} failed: {}", req.name, e);
            DeleteStatus::Error
        }
    };
    Message::DeleteAck(DeleteAck { status })
}
