//! Validation of inbound action requests.
//!
//! The data section of a `cnc_request` message must be a JSON object with
//! string `module` and `action` fields and an optional `params` object.
//! Unknown fields are ignored.

use courier_modules::{Payload, Request};
use serde::Deserialize;
use serde_json::Value;

use super::errors::DispatchError;
use crate::transport::{MessageData, ParsedChunks};

#[derive(Debug, Deserialize)]
struct RequestData {
    module: String,
    action: String,
    #[serde(default)]
    params: Option<Payload>,
}

/// Builds a [`Request`] from an inbound message.
///
/// Module and action names are trimmed. Debug entries are carried over
/// unchanged.
///
/// # Errors
///
/// Returns [`DispatchError::NoData`] or [`DispatchError::DataNotJson`] when
/// the data section is missing or opaque, [`DispatchError::InvalidStructure`]
/// when it does not match the schema, and [`DispatchError::EmptyField`] when
/// `module` or `action` is blank.
pub fn parse_request(chunks: &ParsedChunks) -> Result<Request, DispatchError> {
    let value = match chunks.data() {
        None => return Err(DispatchError::NoData),
        Some(MessageData::Text(_)) => return Err(DispatchError::DataNotJson),
        Some(MessageData::Json(value)) => value,
    };
    if !value.is_object() {
        return Err(DispatchError::invalid_structure("data is not a JSON object"));
    }
    if value.get("params").is_some_and(Value::is_null) {
        return Err(DispatchError::invalid_structure("'params' must be an object"));
    }

    let data = RequestData::deserialize(value)
        .map_err(|error| DispatchError::invalid_structure(error.to_string()))?;

    let module = data.module.trim();
    if module.is_empty() {
        return Err(DispatchError::EmptyField { field: "module" });
    }
    let action = data.action.trim();
    if action.is_empty() {
        return Err(DispatchError::EmptyField { field: "action" });
    }

    Ok(
        Request::new(chunks.id(), chunks.sender(), module, action)
            .with_params(data.params.unwrap_or_default())
            .with_debug(chunks.debug().to_vec()),
    )
}
