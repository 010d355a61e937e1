use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::{header, Method, Url};
use serde::de::Error as _;

use crate::backup::PhotoSource;
use crate::error::BackupError;
use crate::http::{redacted, RestClient};
use crate::model::{Envelope, PhotoRecord};

const BASE_ADDRESS: &str = "https://api.vk.com/method";
const API_VERSION: &str = "5.131";
const PROFILE_ALBUM: &str = "profile";

const OP_LIST: &str = "photos.get";
const OP_DOWNLOAD: &str = "download_photo";

/// Read-only client for the VK API. The access token travels as a query
/// parameter, so no default headers are needed.
pub struct VkClient {
    token: String,
    api: RestClient,
}

impl VkClient {
    pub fn new(token: &str) -> Result<VkClient, BackupError> {
        Self::with_base_address(BASE_ADDRESS, token)
    }

    pub fn with_base_address(base_address: &str, token: &str) -> Result<VkClient, BackupError> {
        let client = VkClient {
            token: token.to_string(),
            api: RestClient::new(base_address, header::HeaderMap::new())?,
        };
        info!("VK client initialised for {base_address}");
        Ok(client)
    }

    fn profile_photos_query(&self, owner_id: i64, count: u32) -> Vec<(&'static str, String)> {
        vec![
            ("access_token", self.token.clone()),
            ("v", API_VERSION.to_string()),
            ("owner_id", owner_id.to_string()),
            ("album_id", PROFILE_ALBUM.to_string()),
            ("extended", "1".to_string()),
            ("photo_sizes", "1".to_string()),
            ("count", count.to_string()),
        ]
    }

    pub async fn get_profile_photos(
        &self,
        owner_id: i64,
        count: u32,
    ) -> Result<Vec<PhotoRecord>, BackupError> {
        let builder = self
            .api
            .request(Method::GET, OP_LIST)
            .query(&self.profile_photos_query(owner_id, count));
        let envelope: Envelope = self.api.send_json(OP_LIST, builder).await?;

        into_photos(envelope)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, BackupError> {
        let response = self
            .api
            .send(OP_DOWNLOAD, self.api.request_url(Method::GET, url))
            .await?;
        let response_url = redacted(response.url());
        let body = response
            .bytes()
            .await
            .map_err(|source| BackupError::Transport {
                op: OP_DOWNLOAD,
                url: response_url,
                source: source.without_url(),
            })?;

        Ok(body.to_vec())
    }
}

/// Unwraps a `photos.get` envelope. An embedded `error` object wins over
/// whatever else the body holds, whatever the HTTP status was.
fn into_photos(envelope: Envelope) -> Result<Vec<PhotoRecord>, BackupError> {
    if let Some(api_error) = envelope.error {
        return Err(BackupError::Api {
            op: OP_LIST,
            code: api_error.code,
            message: api_error.message,
        });
    }

    match envelope.response {
        Some(page) => {
            debug!("{OP_LIST}: {} of {} album photos in this page", page.items.len(), page.count);
            Ok(page.items.into_iter().map(PhotoRecord::from).collect())
        }
        None => Err(BackupError::Json {
            op: OP_LIST,
            source: serde_json::Error::custom("body has neither `response` nor `error`"),
        }),
    }
}

#[async_trait]
impl PhotoSource for VkClient {
    async fn list_profile_photos(
        &self,
        owner_id: i64,
        count: u32,
    ) -> Result<Vec<PhotoRecord>, BackupError> {
        self.get_profile_photos(owner_id, count)
            .await
            .inspect(|photos| {
                info!(
                    "{OP_LIST}: owner {owner_id} returned {} photos",
                    photos.len()
                )
            })
            .inspect_err(|e| warn!("{e}"))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, BackupError> {
        self.fetch_bytes(url)
            .await
            .inspect(|body| info!("{OP_DOWNLOAD}: fetched {} bytes", body.len()))
            .map_err(|e| BackupError::Download {
                url: Url::parse(url)
                    .map(|u| redacted(&u))
                    .unwrap_or_else(|_| url.to_string()),
                reason: e.to_string(),
            })
            .inspect_err(|e| error!("{e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubServer;

    fn stub_client(server: &StubServer) -> VkClient {
        VkClient::with_base_address(&format!("{}/method", server.base_address), "vk-secret").unwrap()
    }

    fn envelope(body: &str) -> Envelope {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn query_carries_all_photo_parameters() {
        let client = VkClient::new("vk-secret").unwrap();
        let query = client.profile_photos_query(552934290, 50);

        assert_eq!(
            query,
            vec![
                ("access_token", "vk-secret".to_string()),
                ("v", "5.131".to_string()),
                ("owner_id", "552934290".to_string()),
                ("album_id", "profile".to_string()),
                ("extended", "1".to_string()),
                ("photo_sizes", "1".to_string()),
                ("count", "50".to_string()),
            ]
        );
    }

    #[test]
    fn items_become_records_in_order() {
        let body = r#"
            {"response": {"count": 2, "items": [
                {"id": 1, "owner_id": 9, "likes": {"count": 10},
                 "sizes": [{"type": "s", "url": "https://cdn/1s", "width": 75, "height": 56}]},
                {"id": 2, "owner_id": 9, "likes": {"count": 3},
                 "sizes": [{"type": "z", "url": "https://cdn/2z", "width": 1280, "height": 960}]}
            ]}}
            "#;

        let photos = into_photos(envelope(body)).unwrap();

        assert_eq!(photos.len(), 2);
        assert_eq!(photos[0].like_count, 10);
        assert_eq!(photos[1].largest_variant().unwrap().url, "https://cdn/2z");
    }

    #[test]
    fn embedded_error_is_an_api_error() {
        let body = r#"{"error": {"error_code": 30, "error_msg": "This profile is private"}}"#;

        let err = into_photos(envelope(body)).unwrap_err();

        match err {
            BackupError::Api { op, code, message } => {
                assert_eq!(op, "photos.get");
                assert_eq!(code, 30);
                assert_eq!(message, "This profile is private");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_body_is_malformed() {
        let err = into_photos(envelope("{}")).unwrap_err();

        assert!(matches!(err, BackupError::Json { op: "photos.get", .. }));
    }

    #[tokio::test]
    async fn unreachable_cdn_is_a_download_error() {
        let client = VkClient::new("vk-secret").unwrap();

        let err = client
            .download("http://127.0.0.1:1/photo.jpg?sign=abc")
            .await
            .unwrap_err();

        match err {
            BackupError::Download { url, .. } => assert_eq!(url, "http://127.0.0.1:1/photo.jpg"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn error_body_with_http_200_fails() {
        let server = StubServer::start(&[(
            200,
            r#"{"error": {"error_code": 30, "error_msg": "This profile is private"}}"#,
        )])
        .await;
        let client = stub_client(&server);

        let err = client.get_profile_photos(552934290, 50).await.unwrap_err();

        assert!(matches!(err, BackupError::Api { op: "photos.get", code: 30, .. }));
        assert_eq!(
            server.request_lines(),
            vec![
                "GET /method/photos.get?access_token=vk-secret&v=5.131&owner_id=552934290\
                 &album_id=profile&extended=1&photo_sizes=1&count=50 HTTP/1.1"
            ]
        );
    }

    #[tokio::test]
    async fn server_error_is_a_status_error() {
        let server = StubServer::start(&[(500, "")]).await;
        let client = stub_client(&server);

        let err = client.get_profile_photos(552934290, 50).await.unwrap_err();

        match err {
            BackupError::Status { op, url, status } => {
                assert_eq!(op, "photos.get");
                assert_eq!(status, 500);
                assert!(!url.contains("vk-secret"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn listed_photos_come_back_as_records() {
        let server = StubServer::start(&[(
            200,
            r#"{"response": {"count": 1, "items": [
                {"id": 7, "owner_id": 552934290, "date": 1651363200, "likes": {"count": 12},
                 "sizes": [{"type": "z", "url": "https://cdn/7z", "width": 1280, "height": 960},
                           {"type": "s", "url": "https://cdn/7s", "width": 75, "height": 56}]}
            ]}}"#,
        )])
        .await;
        let client = stub_client(&server);

        let photos = client.get_profile_photos(552934290, 1).await.unwrap();

        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].like_count, 12);
        assert_eq!(photos[0].largest_variant().unwrap().tag, "z");
    }

    #[tokio::test]
    async fn download_returns_body_bytes() {
        let server = StubServer::start(&[(200, "jpeg-bytes"), (404, "")]).await;
        let client = stub_client(&server);
        let url = format!("{}/impg/7z.jpg?sign=abc", server.base_address);

        assert_eq!(client.download(&url).await.unwrap(), b"jpeg-bytes");

        let err = client.download(&url).await.unwrap_err();
        match err {
            BackupError::Download { url, reason } => {
                assert!(!url.contains("sign"));
                assert!(reason.contains("404"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
