//! Ошибки генерации карты
//!
//! Три класса ошибок:
//! - неверная конфигурация — отклоняется до начала генерации;
//! - нарушение глобального инварианта — генерация прерывается целиком, частично
//!   построенный граф выбрасывается (вызывающий может повторить с другим сидом);
//! - ошибки ввода-вывода при загрузке конфигурации и экспорте.
//!
//! Локальные несогласованности (неудачный сплит или слияние полигонов) сюда не попадают:
//! они откатываются через журнал графа.

use thiserror::Error;

use crate::graph::{FaceId, NodeId};

#[derive(Debug, Error)]
pub enum MapGenError {
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("face extraction could not close a loop starting at {node}")]
    FaceExtraction { node: NodeId },

    #[error("no bridge point between clusters containing {from} and {to}")]
    NoBridge { from: FaceId, to: FaceId },

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, MapGenError>;
