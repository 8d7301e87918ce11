// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloudinary-backed avatar storage.
//!
//! Uploads are signed server-side: the signature is the SHA-256 of the
//! sorted request params concatenated with the API secret, which is
//! what Cloudinary expects for authenticated REST calls.

use chrono::Utc;
use reqwest::multipart;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::config::CloudinaryConfig;
use crate::error::AppError;
use crate::services::check_response_json;

const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// A stored image: the serving URL plus the id needed to delete it.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub url: String,
    pub public_id: String,
}

#[derive(Clone)]
pub struct ImageHost {
    http: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl ImageHost {
    pub fn from_config(config: Option<&CloudinaryConfig>) -> Option<Self> {
        let config = config?;
        Some(Self {
            http: reqwest::Client::new(),
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        })
    }

    pub async fn upload(&self, data: Vec<u8>, filename: &str) -> Result<UploadedImage, AppError> {
        let timestamp = Utc::now().timestamp();
        let signature = self.sign(&format!("timestamp={}", timestamp));

        let part = multipart::Part::bytes(data).file_name(filename.to_string());
        let form = multipart::Form::new()
            .part("file", part)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp.to_string())
            .text("signature", signature);

        let response = self
            .http
            .post(format!(
                "{}/{}/image/upload",
                CLOUDINARY_API_BASE, self.cloud_name
            ))
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Image upload request failed: {}", e)))?;
        let uploaded: UploadResponse = check_response_json(response, "Image upload").await?;

        Ok(UploadedImage {
            url: uploaded.secure_url,
            public_id: uploaded.public_id,
        })
    }

    /// Delete a stored image. "not found" from the backend is treated
    /// as success so replacing an already-removed avatar cannot fail.
    pub async fn destroy(&self, public_id: &str) -> Result<(), AppError> {
        let timestamp = Utc::now().timestamp();
        let signature = self.sign(&format!("public_id={}&timestamp={}", public_id, timestamp));
        let timestamp = timestamp.to_string();

        let response = self
            .http
            .post(format!(
                "{}/{}/image/destroy",
                CLOUDINARY_API_BASE, self.cloud_name
            ))
            .form(&[
                ("public_id", public_id),
                ("api_key", &self.api_key),
                ("timestamp", &timestamp),
                ("signature", &signature),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Image delete request failed: {}", e)))?;
        let result: DestroyResponse = check_response_json(response, "Image delete").await?;

        if result.result != "ok" && result.result != "not found" {
            tracing::warn!(public_id, result = %result.result, "Unexpected image delete result");
        }
        Ok(())
    }

    fn sign(&self, params: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(params.as_bytes());
        hasher.update(self.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: String,
}
