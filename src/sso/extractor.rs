//! Pulling login tokens out of HTML and script text

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::collections::BTreeMap;
use url::Url;

/// Named values scraped from a page
pub type TokenMap = BTreeMap<String, String>;

/// An assertion form returned by the identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamlAssertion {
    pub value: String,
    /// Form action; `None` when the assertion arrived in a redirect URL or
    /// the form has no action
    pub action: Option<String>,
    pub relay_state: Option<String>,
}

/// Strategy for finding tokens in provider responses. `None` means the
/// value is not on the page.
pub trait TokenExtractor: Send + Sync {
    /// Top-level values of the embedded `$Config` object
    fn login_config(&self, page: &str) -> Option<TokenMap>;

    /// Target of a script redirect (`location.href = '...'`)
    fn redirect_url(&self, page: &str) -> Option<String>;

    fn assertion(&self, page: &str) -> Option<SamlAssertion>;

    /// Session token of the service's landing page (`g_ck`)
    fn user_token(&self, page: &str) -> Option<String>;
}

static CONFIG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\$Config\s*=\s*(\{.*?\});").expect("valid regex"));
static JS_REDIRECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:top|window|self)?\.location\.href\s*=\s*['"]([^'"]+)['"]"#)
        .expect("valid regex")
});
static USER_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bg_ck\s*=\s*['"]([^'"]+)['"]"#).expect("valid regex"));
static FORM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<form\b([^>]*)>(.*?)</form>").expect("valid regex"));
static INPUT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<input\b([^>]*)>").expect("valid regex"));
static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid regex")
});

/// Regex-based extraction matching the provider's current markup
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexExtractor;

impl TokenExtractor for RegexExtractor {
    fn login_config(&self, page: &str) -> Option<TokenMap> {
        let raw = CONFIG_RE.captures(page)?.get(1)?.as_str();
        let value: serde_json::Value = serde_json::from_str(raw).ok()?;
        let object = value.as_object()?;

        Some(
            object
                .iter()
                .filter_map(|(key, value)| {
                    let text = match value {
                        serde_json::Value::String(s) => s.clone(),
                        serde_json::Value::Number(n) => n.to_string(),
                        serde_json::Value::Bool(b) => b.to_string(),
                        _ => return None,
                    };
                    Some((key.clone(), text))
                })
                .collect(),
        )
    }

    fn redirect_url(&self, page: &str) -> Option<String> {
        JS_REDIRECT_RE
            .captures(page)
            .and_then(|c| c.get(1))
            .map(|m| unescape_js(m.as_str()))
    }

    fn assertion(&self, page: &str) -> Option<SamlAssertion> {
        for form in FORM_RE.captures_iter(page) {
            let form_attrs = attributes(form.get(1).map_or("", |m| m.as_str()));
            let inputs: Vec<BTreeMap<String, String>> = INPUT_RE
                .captures_iter(form.get(2).map_or("", |m| m.as_str()))
                .map(|c| attributes(c.get(1).map_or("", |m| m.as_str())))
                .collect();

            if let Some(value) = input_value(&inputs, "SAMLResponse") {
                return Some(SamlAssertion {
                    value,
                    action: form_attrs.get("action").filter(|a| !a.is_empty()).cloned(),
                    relay_state: input_value(&inputs, "RelayState"),
                });
            }
        }

        // Assertion input outside any form element
        let inputs: Vec<BTreeMap<String, String>> = INPUT_RE
            .captures_iter(page)
            .map(|c| attributes(c.get(1).map_or("", |m| m.as_str())))
            .collect();
        input_value(&inputs, "SAMLResponse").map(|value| SamlAssertion {
            value,
            action: None,
            relay_state: input_value(&inputs, "RelayState"),
        })
    }

    fn user_token(&self, page: &str) -> Option<String> {
        USER_TOKEN_RE
            .captures(page)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }
}

/// Assertion carried in the query of a redirect (HTTP-Redirect binding)
pub fn assertion_in_url(location: &str) -> Option<SamlAssertion> {
    let url = Url::parse(location).ok()?;
    let mut value = None;
    let mut relay_state = None;
    for (key, v) in url.query_pairs() {
        match key.as_ref() {
            "SAMLResponse" => value = Some(unescape_html(&v).into_owned()),
            "RelayState" => relay_state = Some(v.into_owned()),
            _ => {}
        }
    }
    value.map(|value| SamlAssertion {
        value,
        action: None,
        relay_state,
    })
}

fn attributes(tag: &str) -> BTreeMap<String, String> {
    ATTR_RE
        .captures_iter(tag)
        .filter_map(|c| {
            let name = c.get(1)?.as_str().to_ascii_lowercase();
            let raw = c.get(2).or_else(|| c.get(3)).map_or("", |m| m.as_str());
            Some((name, unescape_html(raw).into_owned()))
        })
        .collect()
}

fn input_value(inputs: &[BTreeMap<String, String>], name: &str) -> Option<String> {
    inputs
        .iter()
        .find(|attrs| attrs.get("name").map(String::as_str) == Some(name))
        .and_then(|attrs| attrs.get("value").cloned())
        .filter(|v| !v.is_empty())
}

fn unescape_html(raw: &str) -> Cow<'_, str> {
    quick_xml::escape::unescape(raw).unwrap_or(Cow::Borrowed(raw))
}

/// Script string literals escape slashes and ampersands
fn unescape_js(raw: &str) -> String {
    raw.replace("\\/", "/")
        .replace("\\u0026", "&")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_PAGE: &str = r#"<html><script>
//<![CDATA[
$Config={"sessionId":"sid-1","sFT":"flow-1","canary":"can-1","sCtx":"ctx-1","apiCanary":"api-1","sTenantId":"tenant-1","iMaxPollAttempts":3,"fIsOn":true};
//]]>
</script></html>"#;

    #[test]
    fn test_login_config_values() {
        let config = RegexExtractor.login_config(LOGIN_PAGE).unwrap();
        assert_eq!(config["sFT"], "flow-1");
        assert_eq!(config["sTenantId"], "tenant-1");
        assert_eq!(config["iMaxPollAttempts"], "3");
        assert_eq!(config["fIsOn"], "true");
    }

    #[test]
    fn test_login_config_absent_or_malformed() {
        assert!(RegexExtractor.login_config("<html>nothing</html>").is_none());
        assert!(RegexExtractor
            .login_config("<script>$Config={not json};</script>")
            .is_none());
    }

    #[test]
    fn test_script_redirect() {
        let page = r#"<script>window.location.href = 'https:\/\/idp.example.com\/t\/saml2?SAMLRequest=abc&RelayState=x';</script>"#;
        assert_eq!(
            RegexExtractor.redirect_url(page).as_deref(),
            Some("https://idp.example.com/t/saml2?SAMLRequest=abc&RelayState=x")
        );
        assert!(RegexExtractor.redirect_url("<p>plain</p>").is_none());
    }

    #[test]
    fn test_assertion_form_any_attribute_order() {
        let page = r#"<form method="POST" name="hiddenform" action="https://svc.example.com/navpage.do">
            <input type="hidden" name="SAMLResponse" value="PHNhbWw+&#x2b;" />
            <input value="https://svc.example.com/" name="RelayState" type="hidden"/>
        </form>"#;
        let assertion = RegexExtractor.assertion(page).unwrap();
        assert_eq!(assertion.value, "PHNhbWw++");
        assert_eq!(
            assertion.action.as_deref(),
            Some("https://svc.example.com/navpage.do")
        );
        assert_eq!(assertion.relay_state.as_deref(), Some("https://svc.example.com/"));
    }

    #[test]
    fn test_assertion_missing() {
        assert!(RegexExtractor
            .assertion(r#"<form action="/x"><input name="other" value="1"></form>"#)
            .is_none());
    }

    #[test]
    fn test_user_token() {
        let page = "<script>var g_ck = 'abc123';</script>";
        assert_eq!(RegexExtractor.user_token(page).as_deref(), Some("abc123"));
        assert!(RegexExtractor.user_token("<p></p>").is_none());
    }

    #[test]
    fn test_assertion_in_redirect_query() {
        let assertion =
            assertion_in_url("https://svc.example.com/acs?SAMLResponse=PHNh%2Bbw%3D%3D&RelayState=r")
                .unwrap();
        assert_eq!(assertion.value, "PHNh+bw==");
        assert_eq!(assertion.relay_state.as_deref(), Some("r"));
        assert!(assertion_in_url("https://svc.example.com/acs?x=1").is_none());
    }
}
