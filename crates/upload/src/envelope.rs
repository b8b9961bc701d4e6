use serde_json::Value;
use snafu::{OptionExt, ResultExt};
use url::Url;

use crate::error::{
    InvalidUrlSnafu, MalformedResponseSnafu, RejectedSnafu, UploadError, UploadResult,
};
use crate::types::UploadedImage;

/// Upload service answer as received, before any validation.
///
/// Fields are read leniently from arbitrary JSON: a field with the wrong type
/// is treated as absent rather than failing the whole parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadEnvelope {
    pub success: Option<bool>,
    pub url: Option<String>,
    pub message: Option<String>,
}

impl UploadEnvelope {
    pub fn from_slice(body: &[u8]) -> UploadResult<Self> {
        let value: Value = serde_json::from_slice(body).map_err(|error| {
            UploadError::MalformedResponse {
                stage: "parse-upload-envelope",
                details: error.to_string(),
                message: None,
            }
        })?;

        Ok(Self::from_value(&value))
    }

    pub fn from_value(value: &Value) -> Self {
        Self {
            success: value.get("success").and_then(Value::as_bool),
            url: value
                .get("data")
                .and_then(|data| data.get("url"))
                .and_then(Value::as_str)
                .map(str::to_string),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    /// Adopts the returned URL only when the service explicitly reported
    /// success and supplied a non-empty, absolute URL.
    pub fn into_uploaded_image(self) -> UploadResult<UploadedImage> {
        if self.success != Some(true) {
            return RejectedSnafu {
                stage: "check-upload-success",
                message: self.message,
            }
            .fail();
        }

        let raw = self
            .url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .context(MalformedResponseSnafu {
                stage: "check-upload-url",
                details: "response has no data.url".to_string(),
                message: self.message.clone(),
            })?;

        let url = Url::parse(&raw).context(InvalidUrlSnafu {
            stage: "parse-upload-url",
            raw: raw.clone(),
        })?;

        Ok(UploadedImage { url })
    }
}

/// Extracts a human readable explanation from an error response body.
///
/// Accepts `{"message": ".."}`, `{"error": ".."}` and
/// `{"error": {"message": ".."}}`.
pub fn service_message_from_body(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;

    let message = value
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| value.get("error").and_then(Value::as_str))
        .or_else(|| {
            value
                .get("error")
                .and_then(|error| error.get("message"))
                .and_then(Value::as_str)
        })?;

    let message = message.trim();
    if message.is_empty() {
        None
    } else {
        Some(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn interpret(body: &str) -> UploadResult<UploadedImage> {
        UploadEnvelope::from_slice(body.as_bytes())?.into_uploaded_image()
    }

    #[test]
    fn well_formed_success_yields_url() {
        let image = interpret(r#"{"success":true,"data":{"url":"http://x/y.png"}}"#)
            .expect("upload should be accepted");

        assert_eq!(image.url.as_str(), "http://x/y.png");
    }

    #[test]
    fn missing_success_flag_is_a_rejection() {
        let error = interpret(r#"{"data":{"url":"http://x/y.png"}}"#).unwrap_err();

        assert!(matches!(error, UploadError::Rejected { message: None, .. }));
    }

    #[test]
    fn explicit_failure_carries_service_message() {
        let error = interpret(r#"{"success":false,"message":"Quota exceeded"}"#).unwrap_err();

        assert!(matches!(error, UploadError::Rejected { .. }));
        assert_eq!(error.user_message(), "Quota exceeded");
    }

    #[test]
    fn success_without_url_is_malformed() {
        for body in [
            r#"{"success":true}"#,
            r#"{"success":true,"data":{}}"#,
            r#"{"success":true,"data":{"url":"   "}}"#,
            r#"{"success":true,"data":{"url":42}}"#,
            r#"{"success":true,"data":"http://x/y.png"}"#,
        ] {
            let error = interpret(body).unwrap_err();
            assert!(
                matches!(error, UploadError::MalformedResponse { .. }),
                "unexpected error for {body}: {error:?}"
            );
        }
    }

    #[test]
    fn relative_url_is_rejected() {
        let error = interpret(r#"{"success":true,"data":{"url":"/uploads/y.png"}}"#).unwrap_err();

        assert!(matches!(error, UploadError::InvalidUrl { .. }));
    }

    #[test]
    fn non_json_body_is_malformed() {
        let error = interpret("<html>bad gateway</html>").unwrap_err();

        assert!(matches!(error, UploadError::MalformedResponse { .. }));
        assert_eq!(error.service_message(), None);
    }

    #[test]
    fn string_flag_is_not_treated_as_success() {
        let envelope = UploadEnvelope::from_slice(
            br#"{"success":"true","data":{"url":"http://x/y.png"},"message":"ok"}"#,
        )
        .expect("json parses");

        assert_eq!(
            envelope,
            UploadEnvelope {
                success: None,
                url: Some("http://x/y.png".to_string()),
                message: Some("ok".to_string()),
            }
        );
    }

    #[test]
    fn error_body_message_shapes() {
        assert_eq!(
            service_message_from_body(br#"{"message":"File too large"}"#),
            Some("File too large".to_string())
        );
        assert_eq!(
            service_message_from_body(br#"{"error":"Unsupported format"}"#),
            Some("Unsupported format".to_string())
        );
        assert_eq!(
            service_message_from_body(br#"{"error":{"message":"Storage offline"}}"#),
            Some("Storage offline".to_string())
        );
        assert_eq!(service_message_from_body(br#"{"message":""}"#), None);
        assert_eq!(service_message_from_body(b"Internal Server Error"), None);
    }
}
