//! Errors - エラー型と分類
//!
//! - ValidationError: ADD の入力不正（状態は変更しない）
//! - PersistError: スナップショットの読み書き失敗
//! - LeaseqError: 上記をまとめたドメインエラー
//!
//! Not-found（空キューへの GET、未知 id への ACK/IN）はエラーではなく
//! `Option` / `bool` で表現します。

use std::path::PathBuf;

use thiserror::Error;

/// ADD was rejected before touching the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("declared length {declared} does not match payload length {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("declared length {declared} exceeds the limit of {max}")]
    TooLarge { declared: usize, max: usize },
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("snapshot io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("snapshot is inconsistent: {0}")]
    Corrupt(String),
}

impl PersistError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum LeaseqError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}
