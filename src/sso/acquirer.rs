//! The scripted login exchange.
//!
//! Each request is one step against `max_steps`:
//!
//! 1. GET the protected resource and follow its redirects to the provider.
//! 2. Follow a script redirect if the page has one, then read the embedded
//!    `$Config` of the login page.
//! 3. Probe the credential type; its flow token supersedes the page's.
//! 4. Call the status endpoint. Anything it returns is informational.
//! 5. Submit the credential, then "keep me signed in" when asked to.
//! 6. Post the assertion back to the service and read its user token.

use std::time::Instant;
use tracing::{debug, info, warn};

use super::extractor::{assertion_in_url, RegexExtractor, SamlAssertion, TokenExtractor, TokenMap};
use super::payload;
use super::tokens::{names, LoginStep, TokenSet};
use super::Credential;
use crate::config::SsoConfig;
use crate::error::{common, ErrorCode, ErrorExt, PipelineError, Result};
use crate::http::{HttpRequest, HttpResponse, Session};

/// Provider error code for a wrong username or password
const INVALID_CREDENTIALS_CODE: &str = "50126";

/// Endpoints and limits of one login
#[derive(Debug, Clone)]
pub struct AcquirerSettings {
    pub homepage_url: String,
    pub idp_base_url: String,
    pub saml_acs_url: Option<String>,
    pub max_steps: u32,
}

impl AcquirerSettings {
    pub fn from_config(sso: &SsoConfig) -> Result<Self> {
        let homepage_url = sso
            .homepage_url
            .clone()
            .ok_or_else(|| common::missing_setting("sso.homepage_url", "set SNOW_HOMEPAGE_URL"))?;
        Ok(Self {
            homepage_url,
            idp_base_url: sso.idp_base_url.trim_end_matches('/').to_string(),
            saml_acs_url: sso.saml_acs_url.clone(),
            max_steps: sso.max_steps,
        })
    }
}

/// Where a chain of redirects ended
enum Landing {
    Assertion(SamlAssertion),
    Page(HttpResponse),
}

pub struct SessionAcquirer {
    settings: AcquirerSettings,
    extractor: Box<dyn TokenExtractor>,
}

impl SessionAcquirer {
    pub fn new(settings: AcquirerSettings) -> Self {
        Self {
            settings,
            extractor: Box::new(RegexExtractor),
        }
    }

    pub fn with_extractor(mut self, extractor: Box<dyn TokenExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Log in on `session` and hand it back authenticated
    pub async fn acquire(&self, mut session: Session, credential: &Credential) -> Result<Session> {
        info!("Starting SSO login for {}", credential.username());
        let mut run = LoginRun {
            settings: &self.settings,
            extractor: self.extractor.as_ref(),
            session: &session,
            tokens: TokenSet::new(),
            steps: 0,
        };

        let login_page = run.open_login_page().await?;
        let page_loaded = Instant::now();
        run.capture_page_tokens(&login_page)?;
        run.probe_credential_type(credential, &login_page.url).await?;
        run.probe_status(&login_page.url).await;

        let dwell = || payload::page_dwell_ms(page_loaded.elapsed().as_millis());
        let (assertion, referer) = run.submit_credential(credential, &login_page.url, dwell).await?;
        let user_token = run.post_assertion(assertion, &referer).await?;
        let steps = run.steps;

        session.mark_authenticated(user_token);
        info!("SSO login completed in {} requests", steps);
        Ok(session)
    }
}

struct LoginRun<'a> {
    settings: &'a AcquirerSettings,
    extractor: &'a dyn TokenExtractor,
    session: &'a Session,
    tokens: TokenSet,
    steps: u32,
}

impl LoginRun<'_> {
    async fn request(&mut self, step: LoginStep, request: HttpRequest) -> Result<HttpResponse> {
        self.steps += 1;
        if self.steps > self.settings.max_steps {
            return Err(PipelineError::authentication_with_code(
                ErrorCode::AUTH_STEP_LIMIT,
                format!(
                    "no authenticated session after {} requests",
                    self.settings.max_steps
                ),
                Some(step.to_string()),
            ));
        }
        let response = self
            .session
            .send(step.as_str(), request)
            .await
            .map_err(|e| e.with_context(format!("step '{}'", step)))?;
        debug!(
            "Step {} ({}): HTTP {} from {}",
            self.steps, step, response.status, response.url
        );
        Ok(response)
    }

    /// GET each Location until a page that is not a redirect
    async fn follow_redirects(&mut self, step: LoginStep, mut response: HttpResponse) -> Result<HttpResponse> {
        while response.is_redirect() {
            let location = redirect_target(&response, step)?;
            debug!("{}: following redirect to {}", step, location);
            let request = HttpRequest::get(location)
                .headers(payload::redirect_headers(&response.url, "same-site"));
            response = self.request(step, request).await?;
        }
        Ok(response)
    }

    /// Like `follow_redirects`, but stop as soon as an assertion shows up in
    /// a redirect URL or in a page
    async fn chase_assertion(&mut self, step: LoginStep, mut response: HttpResponse) -> Result<Landing> {
        loop {
            if response.is_redirect() {
                let location = redirect_target(&response, step)?;
                if let Some(assertion) = assertion_in_url(&location) {
                    debug!("{}: assertion found in redirect URL", step);
                    return Ok(Landing::Assertion(assertion));
                }
                let request = HttpRequest::get(location)
                    .headers(payload::redirect_headers(&response.url, "same-origin"));
                response = self.request(step, request).await?;
                continue;
            }
            if response.status == 200 {
                if let Some(assertion) = self.extractor.assertion(&response.body) {
                    return Ok(Landing::Assertion(assertion));
                }
            }
            return Ok(Landing::Page(response));
        }
    }

    async fn open_login_page(&mut self) -> Result<HttpResponse> {
        let step = LoginStep::ProtectedResource;
        let homepage = self.settings.homepage_url.clone();
        info!("Requesting protected resource {}", homepage);
        let first = self.request(step, HttpRequest::get(homepage)).await?;
        let page = self.follow_redirects(step, first).await?;
        if page.status != 200 {
            return Err(common::provider_status(page.status, step.as_str()));
        }

        let Some(target) = self.extractor.redirect_url(&page.body) else {
            debug!("No script redirect; treating {} as the login page", page.url);
            return Ok(page);
        };

        let step = LoginStep::LoginPage;
        let separator = if target.contains('?') { '&' } else { '?' };
        let url = format!("{}{}sso_reload=true", target, separator);
        info!("Following script redirect to login page");
        let request = HttpRequest::get(url).headers(payload::redirect_headers(&page.url, "cross-site"));
        let response = self.request(step, request).await?;
        let login_page = self.follow_redirects(step, response).await?;
        if login_page.status != 200 {
            return Err(common::provider_status(login_page.status, step.as_str()));
        }
        Ok(login_page)
    }

    fn capture_page_tokens(&mut self, page: &HttpResponse) -> Result<()> {
        let step = LoginStep::LoginPage;
        let config = self.extractor.login_config(&page.body).ok_or_else(|| {
            PipelineError::authentication_with_code(
                ErrorCode::AUTH_TOKEN_MISSING,
                "login page has no $Config block",
                Some(step.to_string()),
            )
        })?;

        for (key, name) in [
            ("sessionId", names::REQUEST_ID),
            ("sFT", names::FLOW_TOKEN),
            ("canary", names::CANARY),
            ("sCtx", names::CTX),
        ] {
            let value = non_empty(&config, key).ok_or_else(|| common::token_missing(key, step.as_str()))?;
            self.tokens.record(name, value, step);
        }
        if let Some(value) = non_empty(&config, "apiCanary") {
            self.tokens.record(names::API_CANARY, value, step);
        }
        if let Some(value) = non_empty(&config, "correlationId") {
            self.tokens.record(names::CORRELATION_ID, value, step);
        }

        let tenant = non_empty(&config, "sTenantId")
            .map(str::to_string)
            .or_else(|| tenant_from_url(&page.url))
            .ok_or_else(|| common::token_missing("sTenantId", step.as_str()))?;
        self.tokens.record(names::TENANT, tenant, step);

        debug!(
            "Login page tokens: {}",
            self.tokens.names().collect::<Vec<_>>().join(", ")
        );
        Ok(())
    }

    async fn probe_credential_type(&mut self, credential: &Credential, referer: &str) -> Result<()> {
        let step = LoginStep::CredentialTypeProbe;
        let url = format!("{}/common/GetCredentialType?mkt=en-US", self.settings.idp_base_url);
        let origin = payload::origin_of(&self.settings.idp_base_url);
        let request = HttpRequest::post(url)
            .headers(payload::cors_headers(referer, &origin, payload::JSON_CONTENT_TYPE))
            .headers(payload::api_headers(&self.tokens))
            .json(payload::credential_type_body(credential.username(), &self.tokens)?);

        let response = self.request(step, request).await?;
        if !response.is_success() {
            return Err(common::provider_status(response.status, step.as_str()));
        }
        let body: serde_json::Value = serde_json::from_str(&response.body)
            .to_auth_error("credential type response is not JSON")
            .map_err(|e| e.with_step(step.as_str()))?;

        if body.get("IfExistsResult").and_then(|v| v.as_i64()) == Some(1) {
            return Err(PipelineError::authentication_with_code(
                ErrorCode::AUTH_INVALID_CREDENTIALS,
                format!("account {} does not exist", credential.username()),
                Some(step.to_string()),
            ));
        }
        if let Some(flow) = body.get("FlowToken").and_then(|v| v.as_str()) {
            self.tokens.record(names::FLOW_TOKEN, flow, step);
        }
        if let Some(canary) = body.get("apiCanary").and_then(|v| v.as_str()) {
            self.tokens.record(names::API_CANARY, canary, step);
        }
        Ok(())
    }

    /// Issued because the browser issues it. Failures are logged only.
    async fn probe_status(&mut self, referer: &str) {
        let step = LoginStep::StatusProbe;
        let url = format!(
            "{}/common/instrumentation/dssostatus",
            self.settings.idp_base_url
        );
        let origin = payload::origin_of(&self.settings.idp_base_url);
        let request = HttpRequest::post(url)
            .headers(payload::cors_headers(referer, &origin, payload::JSON_CONTENT_TYPE))
            .headers(payload::api_headers(&self.tokens))
            .json(payload::status_probe_body(&self.tokens));

        match self.request(step, request).await {
            Ok(response) if response.is_success() => {
                if let Ok(body) = serde_json::from_str::<serde_json::Value>(&response.body) {
                    for key in ["FlowToken", "apiCanary", "canary", "sFT"] {
                        if body.get(key).is_some() {
                            self.tokens.observe(key, step);
                        }
                    }
                }
            }
            Ok(response) => warn!("Status probe answered HTTP {}; continuing", response.status),
            Err(e) => warn!("Status probe failed: {}; continuing", e),
        }
    }

    /// Submit the credential; returns the assertion and the URL of the page
    /// that carried it
    async fn submit_credential<F>(
        &mut self,
        credential: &Credential,
        login_page_url: &str,
        dwell: F,
    ) -> Result<(SamlAssertion, String)>
    where
        F: Fn() -> u64,
    {
        let step = LoginStep::CredentialSubmit;
        let tenant = self.tokens.require(names::TENANT, step)?.to_string();
        let url = format!("{}/{}/login", self.settings.idp_base_url, tenant);
        let origin = payload::origin_of(&self.settings.idp_base_url);
        let request = HttpRequest::post(url)
            .headers(payload::navigate_headers(login_page_url, &origin, "same-origin"))
            .form(payload::login_form(credential, &self.tokens, dwell())?);

        info!("Submitting credentials");
        let response = self.request(step, request).await?;

        if response.is_redirect() {
            return match self.chase_assertion(step, response).await? {
                Landing::Assertion(assertion) => Ok((assertion, login_page_url.to_string())),
                Landing::Page(page) => Err(no_assertion(&page, step)),
            };
        }
        if response.status != 200 {
            return Err(common::provider_status(response.status, step.as_str()));
        }
        if let Some(assertion) = self.extractor.assertion(&response.body) {
            debug!("Credential submit answered with the assertion form directly");
            return Ok((assertion, response.url));
        }

        let config = self.extractor.login_config(&response.body).ok_or_else(|| {
            PipelineError::authentication_with_code(
                ErrorCode::AUTH_UNEXPECTED_RESPONSE,
                "response has neither an assertion nor a $Config block",
                Some(step.to_string()),
            )
        })?;
        check_error_code(&config, step)?;

        for (key, name) in [
            ("sFT", names::FLOW_TOKEN),
            ("canary", names::CANARY),
            ("sCtx", names::CTX),
            ("sessionId", names::REQUEST_ID),
            ("apiCanary", names::API_CANARY),
        ] {
            if let Some(value) = non_empty(&config, key) {
                self.tokens.record(name, value, step);
            }
        }

        self.keep_me_signed_in(&response.url, dwell()).await
    }

    async fn keep_me_signed_in(&mut self, referer: &str, dwell_ms: u64) -> Result<(SamlAssertion, String)> {
        let step = LoginStep::KeepMeSignedIn;
        let url = format!("{}/kmsi", self.settings.idp_base_url);
        let origin = payload::origin_of(&self.settings.idp_base_url);
        let request = HttpRequest::post(url)
            .headers(payload::cors_headers(referer, &origin, payload::FORM_CONTENT_TYPE))
            .form(payload::kmsi_form(&self.tokens, dwell_ms)?);

        info!("Confirming keep-me-signed-in prompt");
        let response = self.request(step, request).await?;
        if !response.is_redirect() && response.status != 200 {
            return Err(common::provider_status(response.status, step.as_str()));
        }
        match self.chase_assertion(step, response).await? {
            Landing::Assertion(assertion) => Ok((assertion, referer.to_string())),
            Landing::Page(page) => {
                if let Some(config) = self.extractor.login_config(&page.body) {
                    check_error_code(&config, step)?;
                }
                Err(no_assertion(&page, step))
            }
        }
    }

    /// Post the assertion to the service; returns the landing page's user
    /// token
    async fn post_assertion(&mut self, assertion: SamlAssertion, referer: &str) -> Result<Option<String>> {
        let step = LoginStep::AssertionPost;
        let target = assertion
            .action
            .clone()
            .or_else(|| self.settings.saml_acs_url.clone())
            .ok_or_else(|| {
                common::missing_setting("sso.saml_acs_url", "the assertion form has no action")
            })?;

        let mut form = vec![("SAMLResponse".to_string(), assertion.value)];
        if let Some(relay) = assertion.relay_state {
            form.push(("RelayState".to_string(), relay));
        }
        let origin = payload::origin_of(referer);
        let request = HttpRequest::post(target.clone())
            .headers(payload::navigate_headers(referer, &origin, "cross-site"))
            .form(form);

        info!("Posting assertion to {}", target);
        let response = self.request(step, request).await?;
        let landing = if response.is_redirect() {
            let landing = self.follow_redirects(step, response).await?;
            if !landing.is_success() {
                return Err(common::provider_status(landing.status, step.as_str()));
            }
            landing
        } else if response.status == 200 {
            warn!("Assertion post answered 200 instead of a redirect");
            response
        } else {
            return Err(common::provider_status(response.status, step.as_str()));
        };

        if landing.body.contains("SSO Failed") || landing.body.contains("SAML Error") {
            return Err(PipelineError::authentication_with_code(
                ErrorCode::AUTH_ASSERTION_REJECTED,
                "service reported an SSO failure",
                Some(step.to_string()),
            ));
        }

        let user_token = self.extractor.user_token(&landing.body);
        if user_token.is_none() {
            warn!("Landing page has no user token; report requests may be rejected");
        }
        Ok(user_token)
    }
}

fn redirect_target(response: &HttpResponse, step: LoginStep) -> Result<String> {
    response.location().ok_or_else(|| {
        PipelineError::authentication_with_code(
            ErrorCode::AUTH_UNEXPECTED_RESPONSE,
            format!("HTTP {} without a Location header", response.status),
            Some(step.to_string()),
        )
    })
}

fn non_empty<'m>(config: &'m TokenMap, key: &str) -> Option<&'m str> {
    config
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}

fn check_error_code(config: &TokenMap, step: LoginStep) -> Result<()> {
    match non_empty(config, "sErrorCode") {
        None | Some("0") => Ok(()),
        Some(INVALID_CREDENTIALS_CODE) => Err(PipelineError::authentication_with_code(
            ErrorCode::AUTH_INVALID_CREDENTIALS,
            "invalid username or password",
            Some(step.to_string()),
        )),
        Some(code) => Err(PipelineError::authentication_with_code(
            ErrorCode::AUTH_PROVIDER_STATUS,
            format!("identity provider reported error code {}", code),
            Some(step.to_string()),
        )),
    }
}

fn no_assertion(page: &HttpResponse, step: LoginStep) -> PipelineError {
    if page.status != 200 {
        return common::provider_status(page.status, step.as_str());
    }
    PipelineError::authentication_with_code(
        ErrorCode::AUTH_UNEXPECTED_RESPONSE,
        format!("no assertion form in response from {}", page.url),
        Some(step.to_string()),
    )
}

/// Tenant from a provider URL of the form `https://host/<tenant>/...`
fn tenant_from_url(url: &str) -> Option<String> {
    let url = url::Url::parse(url).ok()?;
    let mut segments = url.path_segments()?;
    let first = segments.next()?.to_string();
    // A single segment is an endpoint name, not a tenant
    segments.next()?;
    (!first.is_empty()).then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_from_url() {
        assert_eq!(
            tenant_from_url("https://login.example.com/contoso-id/saml2?SAMLRequest=x").as_deref(),
            Some("contoso-id")
        );
        assert_eq!(tenant_from_url("https://login.example.com/login"), None);
    }

    #[test]
    fn test_error_codes() {
        let mut config = TokenMap::new();
        assert!(check_error_code(&config, LoginStep::CredentialSubmit).is_ok());

        config.insert("sErrorCode".to_string(), "50126".to_string());
        let err = check_error_code(&config, LoginStep::CredentialSubmit).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AUTH_INVALID_CREDENTIALS);
        assert!(err.user_message().contains("invalid username or password"));

        config.insert("sErrorCode".to_string(), "50053".to_string());
        let err = check_error_code(&config, LoginStep::CredentialSubmit).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AUTH_PROVIDER_STATUS);
    }
}
