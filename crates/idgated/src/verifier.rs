//! External verification collaborator client.
//!
//! The collaborator's reply has two known shapes: a transactional envelope
//! carrying a `responseCode`, and a bare result object carrying
//! `data.verified`. Classification is structural — the HTTP status is not
//! consulted when deriving the stored verification status.

use serde_json::Value;
use thiserror::Error;

use crate::config::Config;
use crate::store::VerificationStatus;

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("verification service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("verification service unreachable: {0}")]
    Unreachable(String),
}

/// Raw outcome of one collaborator call.
#[derive(Debug, Clone)]
pub struct VerifierResult {
    pub http_status: u16,
    pub body: Value,
    pub raw: String,
}

impl VerifierResult {
    pub fn shape(&self) -> ReplyShape {
        ReplyShape::classify(&self.body)
    }

    pub fn derived_status(&self) -> VerificationStatus {
        self.shape().derived_status()
    }
}

/// Structural classification of a collaborator reply body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyShape {
    /// Transactional envelope with a two-digit response code.
    ResponseCode(String),
    /// Bare result object with an explicit verified flag.
    Verified(bool),
    /// Neither shape matched.
    Unknown,
}

impl ReplyShape {
    /// Classify a reply body, checking the envelope shape first.
    pub fn classify(body: &Value) -> Self {
        if let Some(code) = body.get("responseCode") {
            if let Some(s) = code.as_str() {
                return ReplyShape::ResponseCode(s.to_string());
            }
            // Some deployments return the code as a bare number
            if let Some(n) = code.as_u64() {
                return ReplyShape::ResponseCode(format!("{n:02}"));
            }
        }

        if let Some(v) = body.pointer("/data/verified") {
            if let Some(b) = v.as_bool() {
                return ReplyShape::Verified(b);
            }
            if let Some(s) = v.as_str() {
                match s.to_ascii_lowercase().as_str() {
                    "true" => return ReplyShape::Verified(true),
                    "false" => return ReplyShape::Verified(false),
                    _ => {}
                }
            }
        }

        ReplyShape::Unknown
    }

    /// Map the reply shape onto a stored verification status.
    ///
    /// `00` approves; `01`/`02`/`03` are explicit rejections; any other
    /// code, and any unrecognized shape, leaves the record pending for
    /// manual review.
    pub fn derived_status(&self) -> VerificationStatus {
        match self {
            ReplyShape::ResponseCode(code) => match code.as_str() {
                "00" => VerificationStatus::Approved,
                "01" | "02" | "03" => VerificationStatus::Rejected,
                _ => VerificationStatus::Pending,
            },
            ReplyShape::Verified(true) => VerificationStatus::Approved,
            ReplyShape::Verified(false) => VerificationStatus::Rejected,
            ReplyShape::Unknown => VerificationStatus::Pending,
        }
    }
}

/// HTTP client for the remote collaborator.
pub struct RemoteVerifier {
    client: reqwest::Client,
    url: String,
    merchant_id: String,
    merchant_key: String,
}

impl RemoteVerifier {
    pub fn new(config: &Config) -> Result<Self, VerifierError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.verify_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.verifier_url.clone(),
            merchant_id: config.merchant_id.clone(),
            merchant_key: config.merchant_key.clone(),
        })
    }

    async fn verify(&self, pin_number: &str, image_b64: &str) -> Result<VerifierResult, VerifierError> {
        let payload = serde_json::json!({
            "merchantCode": self.merchant_id,
            "merchantKey": self.merchant_key,
            "pinNumber": pin_number,
            "image": image_b64,
        });

        let response = self.client.post(&self.url).json(&payload).send().await?;
        let http_status = response.status().as_u16();
        let raw = response.text().await?;
        let body: Value = serde_json::from_str(&raw).unwrap_or(Value::Null);

        tracing::info!(http_status, "collaborator replied");
        Ok(VerifierResult {
            http_status,
            body,
            raw,
        })
    }
}

/// Canned verifier for tests; replays a fixed reply.
pub struct FixedVerifier {
    pub result: Result<VerifierResult, String>,
}

/// Verifier dispatch. `Remote` in production, `Fixed` under test.
pub enum Verifier {
    Remote(RemoteVerifier),
    Fixed(FixedVerifier),
}

impl Verifier {
    pub async fn verify(
        &self,
        pin_number: &str,
        image_b64: &str,
    ) -> Result<VerifierResult, VerifierError> {
        match self {
            Verifier::Remote(remote) => remote.verify(pin_number, image_b64).await,
            Verifier::Fixed(fixed) => match &fixed.result {
                Ok(result) => Ok(result.clone()),
                Err(msg) => Err(VerifierError::Unreachable(msg.clone())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(json: &str) -> ReplyShape {
        ReplyShape::classify(&serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_response_code_string() {
        assert_eq!(classify(r#"{"responseCode":"00"}"#), ReplyShape::ResponseCode("00".into()));
        assert_eq!(classify(r#"{"responseCode":"01","msg":"no match"}"#), ReplyShape::ResponseCode("01".into()));
    }

    #[test]
    fn test_response_code_numeric_is_zero_padded() {
        assert_eq!(classify(r#"{"responseCode":0}"#), ReplyShape::ResponseCode("00".into()));
        assert_eq!(classify(r#"{"responseCode":42}"#), ReplyShape::ResponseCode("42".into()));
    }

    #[test]
    fn test_verified_flag() {
        assert_eq!(classify(r#"{"data":{"verified":true}}"#), ReplyShape::Verified(true));
        assert_eq!(classify(r#"{"data":{"verified":false}}"#), ReplyShape::Verified(false));
        assert_eq!(classify(r#"{"data":{"verified":"TRUE"}}"#), ReplyShape::Verified(true));
    }

    #[test]
    fn test_envelope_takes_precedence() {
        // Both shapes present: the envelope wins
        assert_eq!(
            classify(r#"{"responseCode":"01","data":{"verified":true}}"#),
            ReplyShape::ResponseCode("01".into())
        );
    }

    #[test]
    fn test_unknown_shapes() {
        assert_eq!(classify(r#"{}"#), ReplyShape::Unknown);
        assert_eq!(classify(r#"{"data":{}}"#), ReplyShape::Unknown);
        assert_eq!(classify(r#"{"data":{"verified":"maybe"}}"#), ReplyShape::Unknown);
        assert_eq!(ReplyShape::classify(&Value::Null), ReplyShape::Unknown);
    }

    #[test]
    fn test_derived_status() {
        assert_eq!(ReplyShape::ResponseCode("00".into()).derived_status(), VerificationStatus::Approved);
        assert_eq!(ReplyShape::ResponseCode("01".into()).derived_status(), VerificationStatus::Rejected);
        assert_eq!(ReplyShape::ResponseCode("02".into()).derived_status(), VerificationStatus::Rejected);
        assert_eq!(ReplyShape::ResponseCode("03".into()).derived_status(), VerificationStatus::Rejected);
        assert_eq!(ReplyShape::ResponseCode("99".into()).derived_status(), VerificationStatus::Pending);
        assert_eq!(ReplyShape::Verified(true).derived_status(), VerificationStatus::Approved);
        assert_eq!(ReplyShape::Verified(false).derived_status(), VerificationStatus::Rejected);
        assert_eq!(ReplyShape::Unknown.derived_status(), VerificationStatus::Pending);
    }
}
