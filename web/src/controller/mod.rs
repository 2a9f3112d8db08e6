pub(crate) mod health_check_controller;
pub(crate) mod realtime_controller;
pub(crate) mod stream_chat_controller;
pub(crate) mod stream_session_controller;
