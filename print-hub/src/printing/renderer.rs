//! Snapshot capture gateway
//!
//! The queue engine can't draw; it asks a [`Renderer`] for an image of the
//! job. In the POS app the renderer is the UI layer, which can only have one
//! order mounted on its render surface at a time, so implementations must
//! serialise their own captures.

use crate::models::{CaptureOptions, Order, PrinterRole};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no capture callback registered")]
    NotRegistered,

    #[error("capture returned no image")]
    Empty,

    #[error("capture failed: {0}")]
    Failed(String),

    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// A captured snapshot, decoded
#[derive(Debug, Clone)]
pub struct RenderedImage {
    image: DynamicImage,
}

impl RenderedImage {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    /// Decode PNG / JPEG / WebP bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RenderError> {
        if bytes.is_empty() {
            return Err(RenderError::Empty);
        }
        image::load_from_memory(bytes)
            .map(Self::new)
            .map_err(|e| RenderError::InvalidImage(e.to_string()))
    }

    /// Decode base64, with or without a `data:image/...;base64,` prefix
    pub fn from_base64(encoded: &str) -> Result<Self, RenderError> {
        let body = match encoded.split_once(',') {
            Some((prefix, body)) if prefix.starts_with("data:") => body,
            _ => encoded,
        };
        let bytes = STANDARD
            .decode(body.trim())
            .map_err(|e| RenderError::InvalidImage(format!("base64: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }
}

/// Renders a job into an image
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn capture(
        &self,
        role: PrinterRole,
        order: &Order,
        options: CaptureOptions,
    ) -> Result<RenderedImage, RenderError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CaptureRequest<'a> {
    role: PrinterRole,
    order: &'a Order,
    options: CaptureOptions,
}

#[derive(Deserialize)]
struct CaptureResponse {
    image: Option<String>,
}

/// Renderer that delegates to a UI process over HTTP
///
/// POSTs `{ role, order, options }` and expects `{ "image": "<base64>" }`.
pub struct HttpCaptureGateway {
    client: reqwest::Client,
    url: String,
    // one order on the render surface at a time
    surface: Mutex<()>,
}

impl HttpCaptureGateway {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RenderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RenderError::Failed(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            surface: Mutex::new(()),
        })
    }
}

#[async_trait]
impl Renderer for HttpCaptureGateway {
    #[instrument(skip(self, order), fields(order_id = %order.id, url = %self.url))]
    async fn capture(
        &self,
        role: PrinterRole,
        order: &Order,
        options: CaptureOptions,
    ) -> Result<RenderedImage, RenderError> {
        let _surface = self.surface.lock().await;

        let resp = self
            .client
            .post(&self.url)
            .json(&CaptureRequest {
                role,
                order,
                options,
            })
            .send()
            .await
            .map_err(|e| RenderError::Failed(e.to_string()))?
            .error_for_status()
            .map_err(|e| RenderError::Failed(e.to_string()))?;

        let body: CaptureResponse = resp
            .json()
            .await
            .map_err(|e| RenderError::Failed(format!("bad capture response: {}", e)))?;

        let encoded = body.image.filter(|s| !s.is_empty()).ok_or(RenderError::Empty)?;
        let image = RenderedImage::from_base64(&encoded)?;
        debug!(width = image.width(), "captured snapshot");
        Ok(image)
    }
}
