use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::{redirect, Client, Proxy};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use super::transport::{HttpRequest, HttpResponse, HttpTransport, Method, RequestBody};
use crate::config::PipelineConfig;
use crate::error::{ErrorCode, PipelineError, Result};

/// Cookie the identity provider expects from a browser without the SSO
/// extension installed
const EXTENSION_COOKIE: &str = "AADSSO=NA|NoExtension";

/// reqwest-backed transport with a persistent cookie jar and no automatic
/// redirects
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let network = &config.network;
        let jar = Arc::new(Jar::default());

        if let Ok(idp) = Url::parse(&config.sso.idp_base_url) {
            if let Some(host) = idp.host_str() {
                jar.add_cookie_str(
                    &format!("{}; Domain={}; Path=/", EXTENSION_COOKIE, host),
                    &idp,
                );
            }
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(
            HeaderName::from_static("upgrade-insecure-requests"),
            HeaderValue::from_static("1"),
        );

        let mut builder = Client::builder()
            .cookie_provider(jar)
            .default_headers(headers)
            .user_agent(config.sso.user_agent.clone())
            .redirect(redirect::Policy::none())
            .timeout(network.timeout);

        if let Some(proxy_url) = network.proxy_url() {
            let mut proxy = Proxy::all(&proxy_url).map_err(|e| {
                PipelineError::transport_with_code(
                    ErrorCode::TRANSPORT_CLIENT_BUILD,
                    "Invalid proxy URL",
                    Some(proxy_url.clone()),
                )
                .with_source(e)
            })?;
            if let (Some(user), Some(pass)) = (&network.proxy_user, &network.proxy_pass) {
                proxy = proxy.basic_auth(user, pass);
            }
            debug!("Routing requests through proxy {}", proxy_url);
            builder = builder.proxy(proxy);
        }

        if !network.ssl_verify {
            warn!("TLS certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|e| {
            PipelineError::transport_with_code(
                ErrorCode::TRANSPORT_CLIENT_BUILD,
                "Failed to create HTTP client",
                None,
            )
            .with_source(e)
        })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(fields) => builder.form(fields),
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Raw { content_type, body } => builder
                .header(CONTENT_TYPE, content_type.as_str())
                .body(body.clone()),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            url,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_from_defaults() {
        assert!(ReqwestTransport::from_config(&PipelineConfig::default()).is_ok());
    }

    #[test]
    fn test_client_builds_with_proxy_credentials() {
        let mut config = PipelineConfig::default();
        config.network.proxy_host = Some("proxy.corp".to_string());
        config.network.proxy_port = Some(8080);
        config.network.proxy_user = Some("svc".to_string());
        config.network.proxy_pass = Some("pw".to_string());
        config.network.ssl_verify = false;
        assert!(ReqwestTransport::from_config(&config).is_ok());
    }
}
