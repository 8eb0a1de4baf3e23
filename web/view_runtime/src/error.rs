use crate::node::NodeId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("attribute '{name}' is not allowed on <{tag}>: {reason}")]
    InvalidAttribute {
        tag: String,
        name: String,
        reason: &'static str,
    },

    #[error("select {select} has no option with value '{value}'")]
    UnknownOptionValue { select: NodeId, value: String },

    #[error("unknown node id {0}")]
    UnknownNodeId(NodeId),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("patch sequence gap: expected seq={expected}, got seq={got}")]
    PatchSequenceGap { expected: u64, got: u64 },

    #[error("patch received before initial render: seq={seq}")]
    MissingInitialRender { seq: u64 },

    #[error("invalid event for node {node}: {reason}")]
    InvalidEvent { node: NodeId, reason: String },

    #[error("invalid tree operation: {0}")]
    InvalidTree(String),

    #[error("view thread panicked")]
    ViewPanicked,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::InvalidAttribute { .. } => "invalid_attribute",
            SyncError::UnknownOptionValue { .. } => "unknown_option_value",
            SyncError::UnknownNodeId(_) => "unknown_node_id",
            SyncError::ConnectionClosed => "connection_closed",
            SyncError::PatchSequenceGap { .. } => "patch_sequence_gap",
            SyncError::MissingInitialRender { .. } => "missing_initial_render",
            SyncError::InvalidEvent { .. } => "invalid_event",
            SyncError::InvalidTree(_) => "invalid_tree",
            SyncError::ViewPanicked => "view_panicked",
            SyncError::Io(_) => "io_error",
            SyncError::Json(_) => "decode_error",
        }
    }
}
