use std::{fmt, str::FromStr, time::Duration};

use reqwest::{
    Client,
    multipart::{Form, Part},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{config::MediaConfig, domain::submission::MediaFile};

/// Each asset category is uploaded to its own endpoint on the media host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum AssetCategory {
    ProductImages,
    ProductVideos,
    ProfilePictures,
    TradeLicenses,
    ChatAttachments,
    FeedbackImages,
}

impl AssetCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetCategory::ProductImages => "product-images",
            AssetCategory::ProductVideos => "product-videos",
            AssetCategory::ProfilePictures => "profile-pictures",
            AssetCategory::TradeLicenses => "trade-licenses",
            AssetCategory::ChatAttachments => "chat-attachments",
            AssetCategory::FeedbackImages => "feedback-images",
        }
    }

    fn resource_type(&self) -> &'static str {
        match self {
            AssetCategory::ProductVideos => "video",
            AssetCategory::TradeLicenses => "raw",
            _ => "image",
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product-images" => Ok(AssetCategory::ProductImages),
            "product-videos" => Ok(AssetCategory::ProductVideos),
            "profile-pictures" => Ok(AssetCategory::ProfilePictures),
            "trade-licenses" => Ok(AssetCategory::TradeLicenses),
            "chat-attachments" => Ok(AssetCategory::ChatAttachments),
            "feedback-images" => Ok(AssetCategory::FeedbackImages),
            other => Err(format!("unknown asset category '{other}'")),
        }
    }
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media host request failed")]
    Request(#[from] reqwest::Error),
    #[error("media host response has no hosted url")]
    MissingUrl,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
}

// Client for the external media host
#[derive(Clone)]
pub struct MediaClient {
    http_client: Client,
    base_url: String,
    api_key: SecretString,
}

impl MediaClient {
    pub fn new(config: &MediaConfig) -> Result<Self, MediaError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    #[tracing::instrument(
        "Uploading asset to media host",
        skip(self, file),
        fields(file_name = %file.file_name, bytes = file.bytes.len())
    )]
    pub async fn upload(
        &self,
        category: AssetCategory,
        file: &MediaFile,
    ) -> Result<String, MediaError> {
        let url = format!("{}/{}/upload", self.base_url, category.as_str());
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)?;
        let form = Form::new()
            .part("file", part)
            .text("folder", category.as_str())
            .text("resource_type", category.resource_type());

        let response: UploadResponse = self
            .http_client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .secure_url
            .or(response.url)
            .filter(|u| !u.is_empty())
            .ok_or(MediaError::MissingUrl)
    }
}

#[cfg(test)]
mod tests {
    use claim::{assert_err, assert_ok};
    use secrecy::SecretString;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, header_exists, method, path},
    };

    use super::*;

    fn client(base_url: String) -> MediaClient {
        MediaClient::new(&MediaConfig {
            base_url,
            api_key: SecretString::from("media-key".to_string()),
            timeout_secs: 2,
        })
        .unwrap()
    }

    fn image() -> MediaFile {
        MediaFile {
            file_name: "front.png".into(),
            content_type: "image/png".into(),
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
        }
    }

    struct MultipartFileMatcher;
    impl wiremock::Match for MultipartFileMatcher {
        fn matches(&self, request: &wiremock::Request) -> bool {
            let body = String::from_utf8_lossy(&request.body);
            body.contains("name=\"file\"")
                && body.contains("filename=\"front.png\"")
                && body.contains("name=\"folder\"")
        }
    }

    #[tokio::test]
    async fn upload_posts_to_the_category_endpoint() {
        let mock_server = MockServer::start().await;
        let media = client(mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/product-images/upload"))
            .and(header("Authorization", "Bearer media-key"))
            .and(header_exists("Content-Type"))
            .and(MultipartFileMatcher)
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "secure_url": "https://cdn.example.com/product-images/front.png"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let outcome = media.upload(AssetCategory::ProductImages, &image()).await;
        assert_ok!(&outcome);
        assert_eq!(
            outcome.unwrap(),
            "https://cdn.example.com/product-images/front.png"
        );
    }

    #[tokio::test]
    async fn upload_fails_if_the_host_returns_500() {
        let mock_server = MockServer::start().await;
        let media = client(mock_server.uri());

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        let outcome = media.upload(AssetCategory::ChatAttachments, &image()).await;
        assert_err!(outcome);
    }

    #[tokio::test]
    async fn upload_fails_without_a_hosted_url() {
        let mock_server = MockServer::start().await;
        let media = client(mock_server.uri());

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&mock_server)
            .await;

        let outcome = media.upload(AssetCategory::ProfilePictures, &image()).await;
        assert!(matches!(outcome, Err(MediaError::MissingUrl)));
    }

    #[test]
    fn categories_round_trip() {
        for category in [
            AssetCategory::ProductImages,
            AssetCategory::ProductVideos,
            AssetCategory::ProfilePictures,
            AssetCategory::TradeLicenses,
            AssetCategory::ChatAttachments,
            AssetCategory::FeedbackImages,
        ] {
            assert_eq!(category.as_str().parse::<AssetCategory>(), Ok(category));
        }
    }
}
