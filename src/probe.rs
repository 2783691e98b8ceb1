use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::io::Cursor;
use std::time::Duration;

/// Measures an image that carries no usable size in the markup.
#[async_trait]
pub trait ImageProbe: Send + Sync {
    /// Pixel `(width, height)` of the image at `url`.
    async fn measure(&self, url: &str) -> Result<(u32, u32)>;
}

/// Downloads the image and decodes only its header.
pub struct HttpImageProbe {
    client: Client,
}

impl HttpImageProbe {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageProbe for HttpImageProbe {
    async fn measure(&self, url: &str) -> Result<(u32, u32)> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch image {}", url))?;

        if !response.status().is_success() {
            bail!("Image {} returned status {}", url, response.status());
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read image body")?;

        image::io::Reader::new(Cursor::new(bytes.as_ref()))
            .with_guessed_format()
            .context("Failed to sniff image format")?
            .into_dimensions()
            .with_context(|| format!("Failed to decode dimensions of {}", url))
    }
}

/// Offline mode: nothing can be measured, so unsized images are dropped.
pub struct NoProbe;

#[async_trait]
impl ImageProbe for NoProbe {
    async fn measure(&self, url: &str) -> Result<(u32, u32)> {
        bail!("image probing disabled, cannot measure {}", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut buf), image::ImageOutputFormat::Png)
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn test_http_probe_reads_png_dimensions() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/photo.png");
            then.status(200)
                .header("content-type", "image/png")
                .body(png(640, 480));
        });

        let probe = HttpImageProbe::new("listing-scout-test").unwrap();
        let dims = probe.measure(&server.url("/photo.png")).await.unwrap();

        mock.assert();
        assert_eq!(dims, (640, 480));
    }

    #[tokio::test]
    async fn test_http_probe_fails_on_error_status_and_garbage() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing.jpg");
            then.status(404);
        });
        server.mock(|when, then| {
            when.method(GET).path("/garbage.jpg");
            then.status(200).body("not an image");
        });

        let probe = HttpImageProbe::new("listing-scout-test").unwrap();
        assert!(probe.measure(&server.url("/missing.jpg")).await.is_err());
        assert!(probe.measure(&server.url("/garbage.jpg")).await.is_err());
    }

    #[tokio::test]
    async fn test_no_probe_always_fails() {
        assert!(NoProbe.measure("https://example.com/a.jpg").await.is_err());
    }
}
