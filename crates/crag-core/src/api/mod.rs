//! HTTP client for the catalog backend.
//!
//! The sync engine talks to the server through [`RemoteApi`] so it can be
//! driven by an in-memory server in tests; [`ApiClient`] is the reqwest-backed
//! implementation used by real clients.

mod snapshot;

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

pub use snapshot::{
    AreaNode, BlocksPayload, Envelope, LastUpdatePayload, SectorNode, SnapshotLevels,
    TreeSnapshot, ZoneNode,
};

use crate::error::{Error, Result};
use crate::models::{Blocking, EntityKind, FileId, PatchField, RemoteFileInfo};
use crate::util::{is_http_url, normalize_text_option};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("crag/", env!("CARGO_PKG_VERSION"));

/// Server operations needed by the sync engine.
#[allow(async_fn_in_trait)]
pub trait RemoteApi {
    /// `GET tree`
    async fn tree(&self) -> Result<TreeSnapshot>;

    /// `GET blocks`
    async fn blocks(&self) -> Result<Vec<Blocking>>;

    /// `GET last_update`
    async fn last_update(&self) -> Result<Option<i64>>;

    /// Whether pushes can be authenticated.
    fn has_credential(&self) -> bool;

    /// `POST {kind}/{id}` with only the changed fields.
    async fn patch(&self, kind: EntityKind, id: i64, fields: &[PatchField]) -> Result<()>;

    /// `DELETE {kind}/{id}`; an already-gone resource counts as deleted.
    async fn delete(&self, kind: EntityKind, id: i64) -> Result<()>;
}

/// reqwest-backed client for the catalog REST API.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Builds a client for an explicit API base URL.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let base_url = normalize_base_url(&base_url.into())?;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            base_url,
            api_key: normalize_text_option(api_key),
            client,
        })
    }

    /// Returns the base URL this client was configured with.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, route: &str) -> String {
        format!("{}/{}", self.base_url, route)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.api_key.as_deref() {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, route: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(route))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let response = ensure_success(response).await?;
        parse_envelope(response).await
    }

    /// `GET files/{uuid}`: the current remote descriptor of a file.
    pub async fn file_info(&self, file_id: &FileId) -> Result<RemoteFileInfo> {
        let response = self
            .client
            .get(self.url(&format!("files/{file_id}")))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("file {file_id}")));
        }
        let response = ensure_success(response).await?;
        parse_envelope(response).await
    }

    /// `GET download/{uuid}`: a streaming response for the file bytes,
    /// optionally resized server-side to `width` pixels.
    pub async fn download(&self, file_id: &FileId, width: Option<u32>) -> Result<Response> {
        let mut request = self.client.get(self.url(&format!("download/{file_id}")));
        if let Some(width) = width {
            request = request.query(&[("width", width)]);
        }
        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("file {file_id}")));
        }
        ensure_success(response).await
    }
}

impl RemoteApi for ApiClient {
    async fn tree(&self) -> Result<TreeSnapshot> {
        self.get_json("tree").await
    }

    async fn blocks(&self) -> Result<Vec<Blocking>> {
        let payload: BlocksPayload = self.get_json("blocks").await?;
        Ok(payload.blocks)
    }

    async fn last_update(&self) -> Result<Option<i64>> {
        let payload: LastUpdatePayload = self.get_json("last_update").await?;
        Ok(payload.last_update)
    }

    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn patch(&self, kind: EntityKind, id: i64, fields: &[PatchField]) -> Result<()> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(Error::MissingCredential);
        };

        let form = fields
            .iter()
            .fold(reqwest::multipart::Form::new(), |form, field| {
                form.text(field.name.clone(), field.value.clone())
            });

        let response = self
            .client
            .post(self.url(&format!("{kind}/{id}")))
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: i64) -> Result<()> {
        let request = self.client.delete(self.url(&format!("{kind}/{id}")));
        let response = self.authorized(request).send().await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::GONE {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::request_failed(status.as_u16(), &body))
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::request_failed(status.as_u16(), &body))
}

async fn parse_envelope<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.text().await?;
    serde_json::from_str::<Envelope<T>>(&body)
        .map(|envelope| envelope.data)
        .map_err(|error| Error::MalformedResponse(error.to_string()))
}

pub(crate) fn normalize_base_url(raw: &str) -> Result<String> {
    let base = raw.trim().trim_end_matches('/').to_string();
    if base.is_empty() {
        return Err(Error::InvalidInput(
            "API base URL must not be empty".to_string(),
        ));
    }
    if !is_http_url(&base) {
        return Err(Error::InvalidInput(
            "API base URL must include http:// or https://".to_string(),
        ));
    }
    Ok(base)
}
