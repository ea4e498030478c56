//! External delivery channels for alert notifications.

pub mod email;
pub mod log;
pub mod webhook;
