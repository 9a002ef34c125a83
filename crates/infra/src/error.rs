//! Errors surfaced by the infrastructure services.

use pricebook_core::DomainError;

use crate::exporter::ExportError;
use crate::row_source::RowSourceError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    RowSource(#[from] RowSourceError),

    #[error(transparent)]
    Export(#[from] ExportError),

    /// A concurrent aggregation task panicked or was cancelled.
    #[error("aggregation task failed: {0}")]
    Task(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    /// The domain error, if this is one.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            _ => None,
        }
    }
}
