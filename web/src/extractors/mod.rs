pub(crate) mod caller;
