// src/error.rs
//! Error types for the GPX player

use crate::export::ExportError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlayerError>;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Export failed: {0}")]
    Export(#[from] ExportError),
    #[error("Error: {0}")]
    Other(String),
}

impl From<anyhow::Error> for PlayerError {
    fn from(error: anyhow::Error) -> Self {
        PlayerError::Other(error.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for PlayerError {
    fn from(error: quick_xml::events::attributes::AttrError) -> Self {
        PlayerError::Xml(quick_xml::Error::InvalidAttr(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = PlayerError::Parse("no <gpx> root".to_string());
        assert_eq!(err.to_string(), "Parse error: no <gpx> root");
    }

    #[test]
    fn test_from_anyhow() {
        let err: PlayerError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, PlayerError::Other(ref msg) if msg == "boom"));
    }

    #[test]
    fn test_export_error_wraps() {
        let err: PlayerError = ExportError::NoFrames.into();
        assert!(err.to_string().starts_with("Export failed"));
    }
}
