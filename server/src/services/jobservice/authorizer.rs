use crate::error::{ApiError, ApiResult};
use std::sync::Arc;

/// Checks the shared token every request has to present.
///
/// The token is loaded once at startup and never changes afterwards.
#[derive(Clone)]
pub struct Authorizer {
    token: Arc<str>,
}

impl Authorizer {
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn check(&self, presented: Option<&str>) -> ApiResult<()> {
        match presented {
            None | Some("") => Err(ApiError::MissingParam("token")),
            Some(token) if token == &*self.token => Ok(()),
            Some(_) => Err(ApiError::BadToken),
        }
    }
}
