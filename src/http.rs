use reqwest::{header, Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;

use crate::error::BackupError;

const USER_AGENT: &str = concat!("vk-profile-backup/", env!("CARGO_PKG_VERSION"));

/// Thin wrapper over a `reqwest::Client` bound to one REST base address.
///
/// The two API facades differ only in base address, default headers and the
/// shape of their responses, so everything else lives here.
pub struct RestClient {
    base_address: String,
    client: Client,
}

impl RestClient {
    pub fn new(base_address: &str, headers: header::HeaderMap) -> Result<RestClient, BackupError> {
        let base_address = base_address.trim_end_matches('/').to_string();
        let client = Self::build_client(headers).map_err(|source| BackupError::Transport {
            op: "build_client",
            url: base_address.clone(),
            source,
        })?;

        Ok(RestClient {
            base_address,
            client,
        })
    }

    fn build_client(mut headers: header::HeaderMap) -> Result<Client, reqwest::Error> {
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(USER_AGENT),
        );

        reqwest::Client::builder().default_headers(headers).build()
    }

    pub fn url(&self, path: &str) -> String {
        if path.is_empty() {
            self.base_address.clone()
        } else {
            format!(
                "{base_address}/{path}",
                base_address = self.base_address,
                path = path.trim_start_matches('/')
            )
        }
    }

    /// Request against a path under the base address.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    /// Request against an absolute URL handed out by the API (upload links,
    /// CDN image URLs). Default headers still apply.
    pub fn request_url(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Sends the request and returns the response whatever its status.
    pub async fn dispatch(
        &self,
        op: &'static str,
        builder: RequestBuilder,
    ) -> Result<Response, BackupError> {
        let request = builder.build().map_err(|source| BackupError::Transport {
            op,
            url: String::new(),
            source: source.without_url(),
        })?;
        let url = redacted(request.url());

        self.client
            .execute(request)
            .await
            .map_err(|source| BackupError::Transport {
                op,
                url,
                source: source.without_url(),
            })
    }

    /// Sends the request and fails on any non-2xx status.
    pub async fn send(
        &self,
        op: &'static str,
        builder: RequestBuilder,
    ) -> Result<Response, BackupError> {
        let response = self.dispatch(op, builder).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackupError::Status {
                op,
                url: redacted(response.url()),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    pub async fn send_json<T: DeserializeOwned>(
        &self,
        op: &'static str,
        builder: RequestBuilder,
    ) -> Result<T, BackupError> {
        let response = self.send(op, builder).await?;
        let url = redacted(response.url());
        let body = response
            .bytes()
            .await
            .map_err(|source| BackupError::Transport {
                op,
                url,
                source: source.without_url(),
            })?;

        serde_json::from_slice(&body).map_err(|source| BackupError::Json { op, source })
    }
}

/// URL without its query string. VK carries the access token in the query,
/// so nothing past the path may reach the log.
pub fn redacted(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}
