//! Decoding of the webhook proxy's reply to a trigger.

use serde::Deserialize;
use thiserror::Error;

/// First status code treated as a failed trigger.
pub const FIRST_REJECTED_STATUS: u16 = 202;

#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("webhook rejected trigger for {job}: status {status}, body: {body}")]
    Rejected {
        job: String,
        status: u16,
        body: String,
    },
    #[error("could not parse json response: {body}")]
    Parse {
        body: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("response has no string metadata.name: {body}")]
    Shape {
        body: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct CreatedBuild {
    metadata: CreatedMetadata,
}

#[derive(Deserialize)]
struct CreatedMetadata {
    name: String,
}

/// Extracts the created build's name from a webhook reply.
///
/// Statuses from 202 up fail with the body verbatim. Only the first line of
/// the body is decoded: it must be a JSON object (`Parse`) carrying a string
/// `metadata.name` (`Shape`).
pub fn parse_trigger_response(job: &str, status: u16, body: &str) -> Result<String, ResponseError> {
    if status >= FIRST_REJECTED_STATUS {
        return Err(ResponseError::Rejected {
            job: job.to_string(),
            status,
            body: body.to_string(),
        });
    }

    let first_line = body.split('\n').next().unwrap_or_default();
    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(first_line)
        .map_err(|source| ResponseError::Parse {
            body: body.to_string(),
            source,
        })?;

    let created: CreatedBuild = serde_json::from_value(serde_json::Value::Object(object))
        .map_err(|source| ResponseError::Shape {
            body: body.to_string(),
            source,
        })?;
    Ok(created.metadata.name)
}
