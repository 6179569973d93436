use crate::config::ConfigError;
use crate::datasource::{DataSourceError, TransactionStreamError};
use crate::engine::ProcessError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Fatal failure of the indexing pipeline. The consumer stops on the first one.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error(transparent)]
    Stream(#[from] TransactionStreamError),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("persistence failed: {0}")]
    Persistence(#[from] sqlx::Error),
    #[error("indexer task failed: {0}")]
    Task(String),
}

impl IndexerError {
    /// Short failure class used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            IndexerError::Stream(_) => "transport",
            IndexerError::Process(_) => "decode",
            IndexerError::Persistence(_) => "persistence",
            IndexerError::Task(_) => "internal",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Ledger source error: {0}")]
    DataSource(#[from] DataSourceError),
    #[error("Indexer error: {0}")]
    Indexer(#[from] IndexerError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Unavailable(_) | AppError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Address;

    #[test]
    fn test_indexer_error_kind() {
        let err = IndexerError::from(TransactionStreamError::Fetch {
            version: 7,
            source: DataSourceError::NetworkError("reset".to_string()),
        });
        assert_eq!(err.kind(), "transport");
        assert!(err.to_string().contains("version 7"));

        let err = IndexerError::from(ProcessError::OwnerNotFound {
            version: 3,
            address: Address::parse("0xa").unwrap(),
        });
        assert_eq!(err.kind(), "decode");

        let err = IndexerError::from(sqlx::Error::PoolClosed);
        assert_eq!(err.kind(), "persistence");
    }

    #[test]
    fn test_unavailable_maps_to_503() {
        let response = AppError::Unavailable("db down".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = AppError::Config(ConfigError::MissingEnv("X".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
