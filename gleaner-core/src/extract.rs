//! The in-page extraction step and the decoding of its result.
//!
//! [`EXTRACTION_SCRIPT`] runs inside the rendered document. It prefers the
//! first `<pre>` element (print views of text guides) and falls back to the
//! body's visible text. The value crosses the evaluation boundary as a JSON
//! string literal, which [`normalize_extraction`] decodes.
use serde_json::Value;
use tracing::warn;

/// JavaScript expression evaluated against the current document.
///
/// Evaluates to `JSON.stringify(text)`, so the surface hands back a string
/// holding one JSON string literal.
pub const EXTRACTION_SCRIPT: &str = r#"JSON.stringify((function () {
  var pre = document.querySelector('pre');
  if (pre && pre.innerText && pre.innerText.trim().length) { return pre.innerText; }
  if (document.body && document.body.innerText) { return document.body.innerText; }
  return '';
})())"#;

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("expected an encoded string, got {0}")]
    NotEncoded(&'static str),

    #[error("malformed string literal: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Decode the value returned by evaluating [`EXTRACTION_SCRIPT`].
pub fn decode_extraction(value: &Value) -> Result<String, DecodeError> {
    let encoded = match value {
        Value::String(s) => s,
        Value::Null => return Err(DecodeError::NotEncoded("null")),
        Value::Bool(_) => return Err(DecodeError::NotEncoded("bool")),
        Value::Number(_) => return Err(DecodeError::NotEncoded("number")),
        Value::Array(_) => return Err(DecodeError::NotEncoded("array")),
        Value::Object(_) => return Err(DecodeError::NotEncoded("object")),
    };
    Ok(serde_json::from_str::<String>(encoded)?)
}

// FIXME(policy): masked decode failures can hide script errors; confirm with
// product whether they should end the session as `Failed` instead.
/// Decode an extraction result, falling back to an empty string.
///
/// A decode failure is logged and masked: the import still completes, with
/// no text.
pub fn normalize_extraction(value: &Value) -> String {
    match decode_extraction(value) {
        Ok(text) => text,
        Err(error) => {
            warn!(target: "gleaner.extract", %error, "extraction result undecodable; using empty text");
            String::new()
        }
    }
}
