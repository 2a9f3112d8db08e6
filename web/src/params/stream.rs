use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct ChatIndexParams {
    /// Page size, 1 to 200. Anything else falls back to 50.
    pub(crate) limit: Option<String>,
}

impl ChatIndexParams {
    pub(crate) fn limit(&self) -> Option<i64> {
        self.limit.as_deref().and_then(|limit| limit.trim().parse().ok())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct ChatParams {
    pub(crate) message: String,
    #[serde(default)]
    pub(crate) username: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct SessionTokenParams {
    pub(crate) token: String,
}
