use serde::Deserialize;
use utoipa::IntoParams;

/// Query parameters accepted when opening a push connection.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct ConnectParams {
    /// Requested clearance. It can lower, but never raise, the caller's own level.
    pub(crate) access: Option<String>,
    /// Bearer token, for clients that cannot set an `Authorization` header.
    #[allow(dead_code)]
    pub(crate) token: Option<String>,
}
