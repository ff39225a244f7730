pub mod enforcement;
pub mod event_handler;
