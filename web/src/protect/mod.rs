//! Authorization layers applied in the router with `from_fn_with_state`.
//!
//! Each submodule guards one resource: the layer resolves the caller, looks the
//! resource up and either rejects the request or hands it to the controller.

pub(crate) mod streams;
