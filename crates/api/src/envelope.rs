//! The `{status, message, data}` response envelope shared by success and error bodies.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: &'static str,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "Success",
            message: message.into(),
            data,
        }
    }
}

impl Envelope<Option<()>> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "Error",
            message: message.into(),
            data: None,
        }
    }
}
