//! JSON Lines framing for requests and results

use govstage_core::{
    round_confidence, ClassificationRequest, ClassificationResult, Error, Result, StageId,
};
use serde::Serialize;

/// Decode one raw input line (trailing newline optional).
///
/// Whitespace-only lines decode to `Ok(None)`. Lines that are not a JSON
/// object with string `id` / `text` fields are framing errors.
pub fn decode_line(line: &[u8]) -> Result<Option<ClassificationRequest>> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let value: serde_json::Value = serde_json::from_slice(line)
        .map_err(|e| Error::framing(format!("invalid JSON: {}", e)))?;

    if !value.is_object() {
        return Err(Error::framing("expected a JSON object"));
    }

    serde_json::from_value::<ClassificationRequest>(value)
        .map(Some)
        .map_err(|e| Error::framing(format!("invalid request: {}", e)))
}

/// Encode a result as one output line
pub fn encode_result(result: &ClassificationResult) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(result)?;
    line.push(b'\n');
    Ok(line)
}

#[derive(Serialize)]
struct StageOnly {
    stage: StageId,
    confidence: f64,
}

/// Encode a single-message answer (no id)
pub fn encode_stage_only(stage: StageId, confidence: f32) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(&StageOnly {
        stage,
        confidence: round_confidence(confidence),
    })?;
    line.push(b'\n');
    Ok(line)
}
