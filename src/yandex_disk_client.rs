use async_trait::async_trait;
use log::{error, info, warn};
use reqwest::{header, multipart, Method, StatusCode};
use serde::{Deserialize, Serialize};

use crate::backup::ObjectStorage;
use crate::error::BackupError;
use crate::http::RestClient;

const BASE_ADDRESS: &str = "https://cloud-api.yandex.net/v1/disk/resources";

const OP_CREATE_FOLDER: &str = "create_folder";
const OP_UPLOAD_LINK: &str = "get_upload_link";
const OP_UPLOAD: &str = "upload";

/// Answer to `GET /resources/upload`: a one-time link the payload is sent to.
#[derive(Serialize, Deserialize)]
pub struct UploadLink {
    pub href: String,
}

pub struct YandexDiskClient {
    authorization: header::HeaderValue,
    api: RestClient,
}

impl YandexDiskClient {
    pub fn new(token: &str) -> Result<YandexDiskClient, BackupError> {
        Self::with_base_address(BASE_ADDRESS, token)
    }

    pub fn with_base_address(
        base_address: &str,
        token: &str,
    ) -> Result<YandexDiskClient, BackupError> {
        let mut authorization = header::HeaderValue::from_str(&format!("OAuth {token}"))?;
        authorization.set_sensitive(true);

        let client = YandexDiskClient {
            authorization,
            api: RestClient::new(base_address, header::HeaderMap::new())?,
        };
        info!("Yandex Disk client initialised for {base_address}");
        Ok(client)
    }

    /// Headers for the resource API calls. The upload link itself is
    /// pre-authorised and gets none of these.
    fn headers(&self) -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(header::AUTHORIZATION, self.authorization.clone());
        headers
    }

    /// Creates `path` on the disk. Any answer from the server is returned as
    /// its status code; a 409 means the folder is already there.
    pub async fn create_folder(&self, path: &str) -> Result<u16, BackupError> {
        let builder = self
            .api
            .request(Method::PUT, "")
            .headers(self.headers())
            .query(&[("path", path)]);

        let response = self
            .api
            .dispatch(OP_CREATE_FOLDER, builder)
            .await
            .inspect_err(|e| error!("{e}"))?;

        let status = response.status();
        match status {
            s if s.is_success() => info!("{OP_CREATE_FOLDER}: {path} created ({s})"),
            StatusCode::CONFLICT => info!("{OP_CREATE_FOLDER}: {path} already exists"),
            s => warn!("{OP_CREATE_FOLDER}: {path} answered {s}"),
        }

        Ok(status.as_u16())
    }

    pub async fn request_upload_link(
        &self,
        path: &str,
        overwrite: bool,
    ) -> Result<String, BackupError> {
        let builder = self
            .api
            .request(Method::GET, "upload")
            .headers(self.headers())
            .query(&[("path", path), ("overwrite", if overwrite { "true" } else { "false" })]);

        let link: UploadLink = self
            .api
            .send_json(OP_UPLOAD_LINK, builder)
            .await
            .inspect_err(|e| error!("{e}"))?;
        info!("{OP_UPLOAD_LINK}: link issued for {path}");

        Ok(link.href)
    }

    /// Uploads `content` to `path` without overwriting. Returns the status of
    /// the transfer; the caller decides whether it means a new object.
    pub async fn upload_bytes(&self, content: Vec<u8>, path: &str) -> Result<u16, BackupError> {
        let href = self.request_upload_link(path, false).await?;

        let file_name = path.rsplit('/').next().unwrap_or(path).to_string();
        let form = multipart::Form::new().part("file", multipart::Part::bytes(content).file_name(file_name));
        let builder = self.api.request_url(Method::POST, &href).multipart(form);

        let response = self
            .api
            .send(OP_UPLOAD, builder)
            .await
            .inspect_err(|e| error!("{e}"))?;
        let status = response.status().as_u16();
        info!("{OP_UPLOAD}: {path} answered {status}");

        Ok(status)
    }
}

#[async_trait]
impl ObjectStorage for YandexDiskClient {
    async fn create_folder(&self, path: &str) -> Result<u16, BackupError> {
        YandexDiskClient::create_folder(self, path).await
    }

    async fn upload(&self, content: Vec<u8>, path: &str) -> Result<u16, BackupError> {
        self.upload_bytes(content, path).await
    }
}
