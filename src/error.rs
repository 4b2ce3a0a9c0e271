use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::node::NodeId;

pub type Result<T, E = ParseError> = std::result::Result<T, E>;

/// Markup the streaming reader refused, even after root-wrapping.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed markup at byte {position}: {message}")]
    MalformedMarkup { message: String, position: usize },
}

#[derive(Debug, Error)]
pub enum StyleError {
    #[error("failed to read style sheet {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid style sheet: {0}")]
    Toml(#[from] toml::de::Error),
}

/// A broken structural invariant. Parser-produced trees never carry one;
/// seeing it means a defect in this crate, not bad input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invariant violated at node {node}: {reason}")]
pub struct InvariantViolation {
    pub node: NodeId,
    pub reason: &'static str,
}

impl InvariantViolation {
    pub(crate) fn new(node: NodeId, reason: &'static str) -> Self {
        Self { node, reason }
    }
}
