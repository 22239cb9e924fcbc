//! SAML 2.0 AuthnRequest for the HTTP-Redirect binding: raw DEFLATE, then
//! base64, then URL encoding.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use quick_xml::escape::escape;
use std::io::{Read, Write};
use url::{form_urlencoded, Url};
use uuid::Uuid;

use crate::error::{ErrorCode, PipelineError, Result};

/// Service provider side of the request
#[derive(Debug, Clone)]
pub struct AuthnRequest {
    pub id: String,
    pub issuer: String,
    pub acs_url: String,
    pub destination: String,
    pub issue_instant: DateTime<Utc>,
}

impl AuthnRequest {
    pub fn new(
        issuer: impl Into<String>,
        acs_url: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("SNC{}", Uuid::new_v4().simple()),
            issuer: issuer.into(),
            acs_url: acs_url.into(),
            destination: destination.into(),
            issue_instant: Utc::now(),
        }
    }

    pub fn to_xml(&self) -> String {
        let acs = escape(self.acs_url.as_str());
        format!(
            concat!(
                r#"<saml2p:AuthnRequest xmlns:saml2p="urn:oasis:names:tc:SAML:2.0:protocol""#,
                r#" AssertionConsumerServiceURL="{acs}" Destination="{destination}""#,
                r#" ForceAuthn="false" ID="{id}" IsPassive="false" IssueInstant="{instant}""#,
                r#" ProtocolBinding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST""#,
                r#" ProviderName="{acs}" Version="2.0">"#,
                r#"<saml2:Issuer xmlns:saml2="urn:oasis:names:tc:SAML:2.0:assertion">{issuer}</saml2:Issuer>"#,
                r#"<saml2p:NameIDPolicy AllowCreate="true" Format="urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified"/>"#,
                r#"</saml2p:AuthnRequest>"#
            ),
            acs = acs,
            destination = escape(self.destination.as_str()),
            id = escape(self.id.as_str()),
            instant = self.issue_instant.to_rfc3339_opts(SecondsFormat::Millis, true),
            issuer = escape(self.issuer.as_str()),
        )
    }

    /// Value for the `SAMLRequest` query parameter
    pub fn encode(&self) -> Result<String> {
        encode_xml(&self.to_xml())
    }
}

pub fn encode_xml(xml: &str) -> Result<String> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(xml.as_bytes())?;
    let deflated = encoder.finish()?;
    let encoded = STANDARD.encode(deflated);
    Ok(form_urlencoded::byte_serialize(encoded.as_bytes()).collect())
}

/// Decode a `SAMLRequest` value, or a whole URL carrying one, back to XML
pub fn decode(input: &str) -> Result<String> {
    let input = input.trim();
    let raw = match Url::parse(input) {
        Ok(url) => url
            .query_pairs()
            .find(|(k, _)| k == "SAMLRequest")
            .map(|(_, v)| v.into_owned())
            .ok_or_else(|| invalid("URL has no SAMLRequest parameter"))?,
        Err(_) => percent_decode(input),
    };

    let bytes = STANDARD
        .decode(raw.trim())
        .map_err(|e| invalid("SAMLRequest is not valid base64").with_source(e))?;
    let mut xml = String::new();
    DeflateDecoder::new(bytes.as_slice())
        .read_to_string(&mut xml)
        .map_err(|e| invalid("SAMLRequest is not DEFLATE-compressed XML").with_source(e))?;
    Ok(xml)
}

/// Percent-decode without turning `+` into a space; base64 uses `+`
fn percent_decode(value: &str) -> String {
    let protected = value.replace('+', "%2B");
    form_urlencoded::parse(format!("v={}", protected).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

fn invalid(message: &str) -> PipelineError {
    PipelineError::validation_with_code(
        ErrorCode::VALIDATION_INVALID_DATA,
        message,
        Some("SAMLRequest".to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request() -> AuthnRequest {
        AuthnRequest {
            id: "SNC0123456789abcdef".to_string(),
            issuer: "https://svc.example.com".to_string(),
            acs_url: "https://svc.example.com/navpage.do".to_string(),
            destination: "https://login.example.com/tenant/saml2".to_string(),
            issue_instant: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_xml_shape() {
        let xml = request().to_xml();
        assert!(xml.contains(r#"ID="SNC0123456789abcdef""#));
        assert!(xml.contains(r#"IssueInstant="2024-05-01T12:00:00.000Z""#));
        assert!(xml.contains(">https://svc.example.com</saml2:Issuer>"));
        assert!(xml.contains(r#"ProviderName="https://svc.example.com/navpage.do""#));
    }

    #[test]
    fn test_encoded_value_decodes_to_same_xml() {
        let req = request();
        let encoded = req.encode().unwrap();
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert_eq!(decode(&encoded).unwrap(), req.to_xml());
    }

    #[test]
    fn test_decode_from_redirect_url() {
        let req = request();
        let url = format!(
            "https://login.example.com/tenant/saml2?SAMLRequest={}&RelayState=x",
            req.encode().unwrap()
        );
        assert_eq!(decode(&url).unwrap(), req.to_xml());
    }

    #[test]
    fn test_new_ids_are_unique() {
        let a = AuthnRequest::new("i", "https://a", "https://d");
        let b = AuthnRequest::new("i", "https://a", "https://d");
        assert!(a.id.starts_with("SNC"));
        assert_eq!(a.id.len(), 35);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_garbage_is_a_validation_error() {
        let err = decode("not*base64").unwrap_err();
        assert_eq!(err.exit_code(), 5);
        let err = decode("aGVsbG8=").unwrap_err();
        assert_eq!(err.code(), ErrorCode::VALIDATION_INVALID_DATA);
    }
}
