use crate::api::ApiError;
use std::future::Future;
use tracing::{debug, warn};

/// Outcome of a call whose failure must not alter the flow.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum BestEffort<T> {
    Delivered(T),
    Dropped,
}

impl<T> BestEffort<T> {
    /// Awaits `call`, logging and swallowing any failure.
    pub async fn run<F>(action: &'static str, call: F) -> Self
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        match call.await {
            Ok(value) => {
                debug!("{} delivered", action);
                Self::Delivered(value)
            }
            Err(err) => {
                warn!("{} failed (ignored): {}", action, err);
                Self::Dropped
            }
        }
    }

    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}
