//! HTTP client for the model viewer API.

use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::db::{Annotation, Component, NewAnnotation};
use crate::error::ClientError;
use crate::format::Document;
use crate::server::handlers::{
    ErrorResponse, HealthResponse, LoginRequest, LoginResponse, UploadResponse, UPLOAD_FIELD,
};

/// Typed wrapper over the REST API.
///
/// Holds the session token after a successful [`ApiClient::login`]; protected
/// calls made before that fail with [`ClientError::NotAuthenticated`]
/// without touching the network.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client for a server root such as `http://localhost:4000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let token = self.token.as_deref().ok_or(ClientError::NotAuthenticated)?;
        Ok(request.bearer_auth(token))
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let response = self.http.get(self.url("/health")).send().await?;
        parse(response).await
    }

    /// `POST /api/login`; stores the token on success.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), ClientError> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response = self
            .http
            .post(self.url("/api/login"))
            .json(&body)
            .send()
            .await?;
        let login: LoginResponse = parse(response).await?;
        debug!(username, "Logged in");
        self.token = Some(login.token);
        Ok(())
    }

    /// `POST /api/upload`; returns the converted model's URL.
    pub async fn upload_model(&self, file_name: &str, data: Vec<u8>) -> Result<String, ClientError> {
        let part = Part::bytes(data).file_name(file_name.to_string());
        let form = Form::new().part(UPLOAD_FIELD, part);
        let request = self.authorized(self.http.post(self.url("/api/upload")))?;
        let upload: UploadResponse = parse(request.multipart(form).send().await?).await?;
        Ok(upload.url)
    }

    /// Fetch a converted model. Model files are public.
    pub async fn fetch_model(&self, url: &str) -> Result<Document, ClientError> {
        let target = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            self.url(url)
        };
        parse(self.http.get(target).send().await?).await
    }

    /// `GET /api/metadata/{id}`; an unknown id yields an empty object.
    pub async fn metadata(&self, id: &str) -> Result<Component, ClientError> {
        let path = format!("/api/metadata/{}", urlencoding::encode(id));
        let request = self.authorized(self.http.get(self.url(&path)))?;
        parse(request.send().await?).await
    }

    /// `GET /api/search?type=..&pressureMin=..`
    pub async fn search(&self, kind: &str, pressure_min: f64) -> Result<Vec<String>, ClientError> {
        let request = self.authorized(self.http.get(self.url("/api/search")))?;
        let response = request
            .query(&[("type", kind.to_string()), ("pressureMin", pressure_min.to_string())])
            .send()
            .await?;
        parse(response).await
    }

    /// `GET /api/annotations`
    pub async fn list_annotations(&self) -> Result<Vec<Annotation>, ClientError> {
        let request = self.authorized(self.http.get(self.url("/api/annotations")))?;
        parse(request.send().await?).await
    }

    /// `POST /api/annotations`
    pub async fn create_annotation(
        &self,
        annotation: &NewAnnotation,
    ) -> Result<Annotation, ClientError> {
        let request = self.authorized(self.http.post(self.url("/api/annotations")))?;
        parse(request.json(annotation).send().await?).await
    }
}

/// Decode a success body, or turn an error body into [`ClientError::Status`].
async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if !status.is_success() {
        let (error, message) = match serde_json::from_slice::<ErrorResponse>(&bytes) {
            Ok(body) => (body.error, body.message),
            Err(_) => (
                "http_error".to_string(),
                String::from_utf8_lossy(&bytes).into_owned(),
            ),
        };
        return Err(ClientError::Status {
            status: status.as_u16(),
            error,
            message,
        });
    }

    serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
}
