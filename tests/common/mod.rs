//! Common test utilities and fixtures

#![allow(dead_code)]

use std::sync::Arc;

use snow_report::http::{HttpResponse, MockTransport, Session};
use snow_report::retry::{RecordingSleeper, RetryPolicy};
use snow_report::sso::{AcquirerSettings, Credential};

pub const HOMEPAGE: &str = "https://svc.example.com/navpage.do";
pub const IDP: &str = "https://login.example.com";
pub const SAML_ENDPOINT: &str = "https://login.example.com/tenant-1/saml2?SAMLRequest=abc";

pub fn settings(max_steps: u32) -> AcquirerSettings {
    AcquirerSettings {
        homepage_url: HOMEPAGE.to_string(),
        idp_base_url: IDP.to_string(),
        saml_acs_url: Some(HOMEPAGE.to_string()),
        max_steps,
    }
}

pub fn credential() -> Credential {
    Credential::new("user@example.com", "s3cret")
}

/// Session over the mock with a sleeper that records instead of waiting
pub fn session(mock: &MockTransport, retry: RetryPolicy) -> (Session, RecordingSleeper) {
    let sleeper = RecordingSleeper::new();
    let session =
        Session::new(Arc::new(mock.clone()), retry).with_sleeper(Arc::new(sleeper.clone()));
    (session, sleeper)
}

pub fn login_page() -> String {
    r#"<html><head><script type="text/javascript">
//<![CDATA[
$Config={"sessionId":"sid-1","sFT":"flow-1","canary":"can-1","sCtx":"ctx-1","apiCanary":"api-1","sTenantId":"tenant-1","correlationId":"corr-1"};
//]]>
</script></head><body></body></html>"#
        .to_string()
}

/// Page the provider shows after the password, before the assertion
pub fn kmsi_page(error_code: Option<&str>) -> String {
    let error = error_code
        .map(|c| format!(r#","sErrorCode":"{}""#, c))
        .unwrap_or_default();
    format!(
        r#"<html><script>$Config={{"sessionId":"sid-2","sFT":"flow-3","canary":"can-2","sCtx":"ctx-2"{}}};</script></html>"#,
        error
    )
}

pub fn assertion_form() -> String {
    format!(
        r#"<html><body onload="document.forms[0].submit()">
<form method="POST" name="hiddenform" action="{}">
<input type="hidden" name="SAMLResponse" value="PHNhbWxwOlJlc3BvbnNlPg==" />
<input type="hidden" name="RelayState" value="state-1" />
</form></body></html>"#,
        HOMEPAGE
    )
}

pub fn landing_page() -> String {
    r#"<html><script>var g_ck = 'user-token-1';</script><body>Welcome</body></html>"#.to_string()
}

/// Responses up to and including the status probe
pub fn push_until_submit(mock: &MockTransport) {
    mock.push_response(
        HttpResponse::new(302, "", "").with_header("Location", SAML_ENDPOINT),
    );
    mock.push_response(HttpResponse::new(200, "", login_page()));
    mock.push_response(HttpResponse::new(
        200,
        "",
        r#"{"IfExistsResult":0,"FlowToken":"flow-2","apiCanary":"api-2"}"#,
    ));
    mock.push_response(HttpResponse::new(
        200,
        "",
        r#"{"FlowToken":"flow-status","apiCanary":"api-status"}"#,
    ));
}

/// A complete successful login
pub fn push_happy_path(mock: &MockTransport) {
    push_until_submit(mock);
    mock.push_response(HttpResponse::new(200, "", kmsi_page(None)));
    mock.push_response(HttpResponse::new(200, "", assertion_form()));
    mock.push_response(
        HttpResponse::new(302, "", "").with_header("Location", "/navpage.do?landing=1"),
    );
    mock.push_response(HttpResponse::new(200, "", landing_page()));
}
