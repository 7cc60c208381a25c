//! Response returned by a successful outbound call.

use serde::de::DeserializeOwned;

/// Status and body of a non-error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundResponse {
    pub status: u16,
    pub body: String,
}

impl OutboundResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Transcript {
        text: String,
    }

    #[test]
    fn test_json_body() {
        let response = OutboundResponse::new(200, r#"{"text":"hello"}"#);
        let transcript: Transcript = response.json().unwrap();
        assert_eq!(transcript.text, "hello");
        assert!(OutboundResponse::new(200, "plain").json::<Transcript>().is_err());
    }
}
