//! Request bodies and headers the identity provider expects from a browser

use serde_json::{json, Value};
use url::Url;

use super::tokens::{names, LoginStep, TokenSet};
use super::Credential;
use crate::error::Result;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Milliseconds reported as time spent on the login page
pub fn page_dwell_ms(elapsed_ms: u128) -> u64 {
    u64::try_from(elapsed_ms).unwrap_or(u64::MAX).max(1000)
}

fn field(name: &str, value: impl ToString) -> (String, String) {
    (name.to_string(), value.to_string())
}

/// Fields shared by the credential submit and keep-me-signed-in posts
fn common_fields(tokens: &TokenSet, step: LoginStep, dwell_ms: u64) -> Result<Vec<(String, String)>> {
    Ok(vec![
        field("ctx", tokens.require(names::CTX, step)?),
        field("hpgrequestid", tokens.require(names::REQUEST_ID, step)?),
        field("flowToken", tokens.require(names::FLOW_TOKEN, step)?),
        field("canary", tokens.require(names::CANARY, step)?),
        field("i19", dwell_ms),
    ])
}

pub fn login_form(
    credential: &Credential,
    tokens: &TokenSet,
    dwell_ms: u64,
) -> Result<Vec<(String, String)>> {
    let mut fields = common_fields(tokens, LoginStep::CredentialSubmit, dwell_ms)?;
    fields.extend([
        field("i13", 0),
        field("login", credential.username()),
        field("loginfmt", credential.username()),
        field("type", 11),
        field("LoginOptions", 3),
        field("lrt", ""),
        field("lrtPartition", ""),
        field("hisRegion", ""),
        field("hisScaleUnit", ""),
        field("passwd", credential.password()),
        field("ps", 2),
        field("psRNGCDefaultType", ""),
        field("psRNGCEntropy", ""),
        field("psRNGCSLK", ""),
        field("PPSX", ""),
        field("NewUser", 1),
        field("FoundMSAs", ""),
        field("fspost", 0),
        field("i21", 0),
        field("CookieDisclosure", 0),
        field("IsFidoSupported", 1),
        field("isSignupPost", 0),
        field("DfpArtifact", ""),
    ]);
    Ok(fields)
}

pub fn kmsi_form(tokens: &TokenSet, dwell_ms: u64) -> Result<Vec<(String, String)>> {
    let mut fields = common_fields(tokens, LoginStep::KeepMeSignedIn, dwell_ms)?;
    fields.extend([field("LoginOptions", 3), field("type", 28)]);
    Ok(fields)
}

pub fn credential_type_body(username: &str, tokens: &TokenSet) -> Result<Value> {
    let step = LoginStep::CredentialTypeProbe;
    Ok(json!({
        "username": username,
        "isOtherIdpSupported": true,
        "checkPhones": false,
        "isRemoteNGCSupported": true,
        "isCookieBannerShown": false,
        "isFidoSupported": true,
        "originalRequest": tokens.require(names::CTX, step)?,
        "country": "US",
        "forceotclogin": false,
        "isExternalFederationDisallowed": false,
        "isRemoteConnectSupported": false,
        "federationFlags": 0,
        "isSignup": false,
        "flowToken": tokens.require(names::FLOW_TOKEN, step)?,
        "isAccessPassSupported": true,
    }))
}

pub fn status_probe_body(tokens: &TokenSet) -> Value {
    json!({
        "resetSession": false,
        "correlationId": tokens.get(names::CORRELATION_ID).unwrap_or_default(),
    })
}

/// Origin (`scheme://host[:port]`) of a URL
pub fn origin_of(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.origin().ascii_serialization())
        .unwrap_or_default()
}

/// Headers of a top-level form submission
pub fn navigate_headers(referer: &str, origin: &str, site: &str) -> Vec<(String, String)> {
    vec![
        field("Referer", referer),
        field("Origin", origin),
        field("Content-Type", FORM_CONTENT_TYPE),
        field("Sec-Fetch-Dest", "document"),
        field("Sec-Fetch-Mode", "navigate"),
        field("Sec-Fetch-Site", site),
        field("Sec-Fetch-User", "?1"),
        field("Priority", "u=0, i"),
    ]
}

/// Headers of a script-issued request
pub fn cors_headers(referer: &str, origin: &str, content_type: &str) -> Vec<(String, String)> {
    vec![
        field("Referer", referer),
        field("Origin", origin),
        field("Content-Type", content_type),
        field("Sec-Fetch-Dest", "empty"),
        field("Sec-Fetch-Mode", "cors"),
        field("Sec-Fetch-Site", "same-origin"),
        field("Priority", "u=1, i"),
    ]
}

/// Anti-forgery headers of the provider's JSON endpoints
pub fn api_headers(tokens: &TokenSet) -> Vec<(String, String)> {
    let mut headers = vec![field("Accept", JSON_CONTENT_TYPE)];
    if let Some(canary) = tokens.get(names::API_CANARY) {
        headers.push(field("canary", canary));
    }
    if let Some(request_id) = tokens.get(names::REQUEST_ID) {
        headers.push(field("hpgrequestid", request_id));
    }
    if let Some(correlation) = tokens.get(names::CORRELATION_ID) {
        headers.push(field("client-request-id", correlation));
    }
    headers
}

/// Headers of a redirect hop
pub fn redirect_headers(referer: &str, site: &str) -> Vec<(String, String)> {
    vec![field("Referer", referer), field("Sec-Fetch-Site", site)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_tokens() -> TokenSet {
        let mut tokens = TokenSet::new();
        tokens.record(names::FLOW_TOKEN, "ft", LoginStep::LoginPage);
        tokens.record(names::CANARY, "can", LoginStep::LoginPage);
        tokens.record(names::CTX, "ctx", LoginStep::LoginPage);
        tokens.record(names::REQUEST_ID, "sid", LoginStep::LoginPage);
        tokens
    }

    fn value<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
        fields.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_login_form_threads_tokens() {
        let credential = Credential::new("user@example.com", "pw");
        let fields = login_form(&credential, &page_tokens(), 1500).unwrap();

        assert_eq!(value(&fields, "flowToken"), Some("ft"));
        assert_eq!(value(&fields, "ctx"), Some("ctx"));
        assert_eq!(value(&fields, "hpgrequestid"), Some("sid"));
        assert_eq!(value(&fields, "loginfmt"), Some("user@example.com"));
        assert_eq!(value(&fields, "passwd"), Some("pw"));
        assert_eq!(value(&fields, "type"), Some("11"));
        assert_eq!(value(&fields, "i19"), Some("1500"));
    }

    #[test]
    fn test_kmsi_form() {
        let fields = kmsi_form(&page_tokens(), 2000).unwrap();
        assert_eq!(value(&fields, "type"), Some("28"));
        assert_eq!(value(&fields, "LoginOptions"), Some("3"));
        assert!(value(&fields, "passwd").is_none());
    }

    #[test]
    fn test_missing_token_fails_form() {
        let credential = Credential::new("u", "p");
        assert!(login_form(&credential, &TokenSet::new(), 1000).is_err());
    }

    #[test]
    fn test_dwell_has_floor() {
        assert_eq!(page_dwell_ms(0), 1000);
        assert_eq!(page_dwell_ms(2500), 2500);
    }

    #[test]
    fn test_origin_and_api_headers() {
        assert_eq!(
            origin_of("https://login.example.com/tenant/login?x=1"),
            "https://login.example.com"
        );
        let mut tokens = page_tokens();
        tokens.record(names::API_CANARY, "api", LoginStep::LoginPage);
        let headers = api_headers(&tokens);
        assert!(headers.contains(&("canary".to_string(), "api".to_string())));
        assert!(headers.contains(&("hpgrequestid".to_string(), "sid".to_string())));
    }
}
