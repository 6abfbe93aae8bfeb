//! Crate-level error aggregation.
//!
//! Each module defines its own error enum; this type folds them together for
//! callers composing the whole system (see [`crate::system`]).

use crate::bootstrap::BootstrapError;
use crate::config::ConfigurationError;
use crate::correlator::CorrelationError;
use crate::execution::ImportError;
use crate::messaging::IngressError;
use crate::registry::RegistryError;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Ingress(#[from] IngressError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
