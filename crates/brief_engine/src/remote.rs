use brief_core::{BriefMeta, GenerationRequest, JobOutcome};
use serde::{Deserialize, Serialize};

use crate::{ClientSettings, RemoteError, RemoteFailureKind};

const UNKNOWN_FAILURE: &str = "unknown error while creating the brief";

/// Capability that asks the backend to generate one brief.
///
/// Calls can take minutes. A transport error and a `success: false` answer
/// are both failures as far as the queue is concerned.
#[async_trait::async_trait]
pub trait RemoteCaller: Send + Sync {
    async fn create_brief(
        &self,
        request: &GenerationRequest,
    ) -> Result<CreateBriefResponse, RemoteError>;
}

/// JSON body of `POST /briefs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBriefBody {
    pub url: String,
    pub page_id: String,
    pub title: String,
    pub rest_base: String,
    pub wordpress_type: String,
    pub slug: String,
    pub source_type: String,
    pub status: String,
}

impl CreateBriefBody {
    pub fn from_request(request: &GenerationRequest) -> Self {
        let payload = &request.payload;
        let or_template = |value: &str| {
            if value.is_empty() {
                payload.template.clone()
            } else {
                value.to_string()
            }
        };
        Self {
            url: payload.url.clone(),
            page_id: request.item_id.to_string(),
            title: payload.title.clone(),
            rest_base: or_template(&payload.rest_base),
            wordpress_type: or_template(&payload.wordpress_type),
            slug: payload.slug.clone(),
            source_type: "wordpress".to_string(),
            status: "pending".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreateBriefResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<CreateBriefData>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreateBriefData {
    #[serde(default)]
    pub brief: Option<BriefMeta>,
}

/// Folds every way a call can go wrong into a single failed outcome.
pub fn interpret_response(result: Result<CreateBriefResponse, RemoteError>) -> JobOutcome {
    let response = match result {
        Ok(response) => response,
        Err(err) => return JobOutcome::failed(err.to_string()),
    };
    if !response.success {
        let message = response
            .error
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_FAILURE.to_string());
        return JobOutcome::failed(message);
    }
    match response.data.and_then(|data| data.brief) {
        Some(brief) => JobOutcome::Generated(brief),
        None => JobOutcome::failed("backend reported success without a brief"),
    }
}

/// `RemoteCaller` backed by the dashboard's REST backend.
#[derive(Debug, Clone)]
pub struct HttpBriefCaller {
    client: reqwest::Client,
    endpoint: url::Url,
}

impl HttpBriefCaller {
    pub fn new(settings: &ClientSettings) -> Result<Self, RemoteError> {
        let endpoint = briefs_endpoint(&settings.api_base_url)?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| RemoteError::new(RemoteFailureKind::Network, err.to_string()))?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }
}

fn briefs_endpoint(base: &str) -> Result<url::Url, RemoteError> {
    let mut base = url::Url::parse(base.trim())
        .map_err(|err| RemoteError::new(RemoteFailureKind::InvalidUrl, err.to_string()))?;
    // `join` replaces the last segment unless the base ends with a slash.
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("briefs")
        .map_err(|err| RemoteError::new(RemoteFailureKind::InvalidUrl, err.to_string()))
}

#[async_trait::async_trait]
impl RemoteCaller for HttpBriefCaller {
    async fn create_brief(
        &self,
        request: &GenerationRequest,
    ) -> Result<CreateBriefResponse, RemoteError> {
        let body = CreateBriefBody::from_request(request);
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::new(
                RemoteFailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        response
            .json::<CreateBriefResponse>()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    map_reqwest_error(err)
                } else {
                    RemoteError::new(RemoteFailureKind::InvalidResponse, err.to_string())
                }
            })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        return RemoteError::new(RemoteFailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return RemoteError::new(RemoteFailureKind::InvalidResponse, err.to_string());
    }
    RemoteError::new(RemoteFailureKind::Network, err.to_string())
}
