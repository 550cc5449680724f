//! Ошибки симуляции и результаты игровых действий.
//!
//! `SimError`: операционные сбои (конфиг, неизвестный observer, сломанная система).
//! Игровые отказы ("не готово", "нет цели") ошибками не являются: это `ActionResult`.

use std::path::PathBuf;

use thiserror::Error;

use crate::ObserverId;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("unknown observer {0}")]
    UnknownObserver(ObserverId),
    #[error("observer {0} is already joined")]
    ObserverExists(ObserverId),
    #[error("entity {0} does not exist or is inactive")]
    UnknownEntity(u64),
    #[error("unknown content id '{0}'")]
    UnknownContent(String),
    #[error("tick system '{name}' failed: {reason}")]
    SystemFailed { name: String, reason: String },
    #[error("player snapshot version {found} is not supported (expected {expected})")]
    SnapshotVersion { found: u32, expected: u32 },
    #[error("failed to parse player snapshot: {0}")]
    SnapshotParse(#[source] serde_json::Error),
    #[error("failed to encode outbound message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Результат игрового действия (атака, скилл, респавн).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub success: bool,
    pub message: Option<String>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn ok_with(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    pub fn not_ready() -> Self {
        Self::rejected("Not ready")
    }

    pub fn no_target() -> Self {
        Self::rejected("No target in range")
    }
}
