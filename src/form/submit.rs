use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::controller::FieldValues;

/// Outcome of a submission, as reported to the caller of `handle_submit`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmitResult {
    pub fn success(data: Option<Value>) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Submit futures are not required to be `Send`; browser HTTP clients are not.
pub type BoxedSubmitFuture = Pin<Box<dyn Future<Output = anyhow::Result<SubmitResult>> + 'static>>;

pub trait SubmitHandler: Send + Sync + 'static {
    fn submit(&self, values: FieldValues) -> BoxedSubmitFuture;
}

impl<F, Fut> SubmitHandler for F
where
    F: Fn(FieldValues) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<SubmitResult>> + 'static,
{
    fn submit(&self, values: FieldValues) -> BoxedSubmitFuture {
        Box::pin((self)(values))
    }
}

pub(super) type SubmitHandlerFn = Arc<dyn SubmitHandler>;

pub(super) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "submit handler panicked".to_owned()
    }
}
