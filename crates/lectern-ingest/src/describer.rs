//! Figure descriptions through an external captioning model.

use crate::error::{IngestError, IngestResult};
use crate::extractors::ExtractedImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use lectern_config::ImageConfig;
use lectern_core::{ArtifactId, ArtifactKind, Captioner, Fingerprint, PageRange, TextArtifact};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

const START_QUALITY: u8 = 85;
const MIN_QUALITY: u8 = 60;
const SCALE_STEP: f32 = 0.8;
const MIN_SCALE: f32 = 0.1;

/// Turns extracted images into image-description artifacts.
///
/// Calls to the captioner are bounded by a semaphore shared by every clone,
/// so one pass never has more than `max_concurrent` requests in flight.
#[derive(Clone)]
pub struct ImageDescriber {
    captioner: Arc<dyn Captioner>,
    max_bytes: usize,
    permits: Arc<Semaphore>,
}

impl ImageDescriber {
    pub fn new(captioner: Arc<dyn Captioner>, config: &ImageConfig) -> Self {
        Self {
            captioner,
            max_bytes: config.max_bytes,
            permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        }
    }

    /// Describe one image of `source_path`.
    pub async fn describe(
        &self,
        source_path: &str,
        fingerprint: &Fingerprint,
        image: &ExtractedImage,
    ) -> IngestResult<TextArtifact> {
        let page = image.page;
        let description_error = |message: String| IngestError::Description { page, message };

        let (bytes, media_type) = if image.bytes.len() > self.max_bytes {
            let original = image.bytes.clone();
            let max_bytes = self.max_bytes;
            let resized = tokio::task::spawn_blocking(move || shrink_to_fit(&original, max_bytes))
                .await
                .map_err(|e| description_error(e.to_string()))?
                .map_err(description_error)?;
            (resized, "image/jpeg")
        } else {
            (image.bytes.clone(), image.media_type)
        };

        let description = {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|e| description_error(e.to_string()))?;
            self.captioner
                .caption(&bytes, media_type)
                .await
                .map_err(|e| description_error(e.to_string()))?
        };

        let file_name = source_path.rsplit('/').next().unwrap_or(source_path);
        debug!(path = source_path, page, index = image.index, "Described image");

        Ok(TextArtifact {
            id: ArtifactId::image(source_path, fingerprint, page, image.index),
            source_path: source_path.to_string(),
            pages: PageRange::single(page),
            kind: ArtifactKind::ImageDescription {
                image_index: image.index,
            },
            text: format!(
                "[IMAGE/FIGURE from {}, Page {}]\n{}",
                file_name,
                page,
                description.trim()
            ),
        })
    }
}

/// Downscale and re-encode as JPEG until the image fits in `max_bytes`
/// or the scale factor bottoms out.
fn shrink_to_fit(bytes: &[u8], max_bytes: usize) -> Result<Vec<u8>, String> {
    let original =
        image::load_from_memory(bytes).map_err(|e| format!("could not decode image: {}", e))?;
    let rgb = original.to_rgb8();

    let mut out = bytes.to_vec();
    let mut quality = START_QUALITY;
    let mut scale = 1.0f32;

    while out.len() > max_bytes && scale > MIN_SCALE {
        scale *= SCALE_STEP;
        let width = ((rgb.width() as f32 * scale) as u32).max(1);
        let height = ((rgb.height() as f32 * scale) as u32).max(1);
        let resized = image::imageops::resize(&rgb, width, height, FilterType::Triangle);

        let mut encoded = Vec::new();
        JpegEncoder::new_with_quality(&mut encoded, quality)
            .encode_image(&resized)
            .map_err(|e| format!("could not re-encode image: {}", e))?;
        out = encoded;

        if quality > MIN_QUALITY {
            quality -= 5;
        }
    }

    debug!(
        from = bytes.len(),
        to = out.len(),
        scale,
        "Downscaled image for captioning"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedCaptioner {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Captioner for FixedCaptioner {
        async fn caption(&self, image: &[u8], _media_type: &str) -> lectern_core::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(lectern_core::Error::Description("quota exceeded".into()));
            }
            Ok(format!("  A diagram ({} bytes).  ", image.len()))
        }
    }

    /// Records how many captions run at once.
    #[derive(Default)]
    struct SlowCaptioner {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Captioner for SlowCaptioner {
        async fn caption(&self, _image: &[u8], _media_type: &str) -> lectern_core::Result<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok("a chart".to_string())
        }
    }

    fn image(page: u32, bytes: Vec<u8>) -> ExtractedImage {
        ExtractedImage {
            page,
            index: 1,
            bytes,
            width: 200,
            height: 200,
            media_type: "image/png",
        }
    }

    fn noisy_png(side: u32) -> Vec<u8> {
        let mut seed: u32 = 12345;
        let img = RgbImage::from_fn(side, side, |_, _| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let v = (seed >> 16) as u8;
            image::Rgb([v, v.wrapping_mul(3), v.wrapping_add(97)])
        });
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[tokio::test]
    async fn test_describe_payload() {
        let captioner = Arc::new(FixedCaptioner {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let describer = ImageDescriber::new(captioner.clone(), &ImageConfig::default());
        let fp = Fingerprint::from_hex("feedfacecafebeef");

        let artifact = describer
            .describe("week2/optics.pdf", &fp, &image(4, vec![1, 2, 3]))
            .await
            .unwrap();

        assert_eq!(artifact.id.as_str(), "week2/optics.pdf:feedfacecafe:i4-1");
        assert_eq!(artifact.pages, PageRange::single(4));
        assert_eq!(
            artifact.text,
            "[IMAGE/FIGURE from optics.pdf, Page 4]\nA diagram (3 bytes)."
        );
        assert!(artifact.kind.is_image());
        assert_eq!(captioner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_captioner_failure_is_description_error() {
        let captioner = Arc::new(FixedCaptioner {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let describer = ImageDescriber::new(captioner, &ImageConfig::default());

        let err = describer
            .describe("a.pdf", &Fingerprint::from_hex("00"), &image(7, vec![0]))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Description { page: 7, .. }));
    }

    #[tokio::test]
    async fn test_max_concurrent_is_honoured() {
        let captioner = Arc::new(SlowCaptioner::default());
        let config = ImageConfig {
            max_concurrent: 2,
            ..ImageConfig::default()
        };
        let describer = ImageDescriber::new(captioner.clone(), &config);
        let fp = Fingerprint::from_hex("abcdef");
        let images: Vec<ExtractedImage> = (1..=6).map(|page| image(page, vec![0])).collect();

        // Separate clones share one semaphore, as concurrent documents do.
        let results = futures_util::future::join_all(images.iter().map(|img| {
            let describer = describer.clone();
            let fp = fp.clone();
            async move { describer.describe("deck.pdf", &fp, img).await }
        }))
        .await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(captioner.peak.load(Ordering::SeqCst), 2);
        assert_eq!(captioner.in_flight.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_shrink_to_fit() {
        let png = noisy_png(400);
        assert!(png.len() > 50_000);

        let shrunk = shrink_to_fit(&png, 50_000).unwrap();
        assert!(shrunk.len() <= 50_000);
        assert_eq!(
            image::guess_format(&shrunk).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_shrink_rejects_garbage() {
        assert!(shrink_to_fit(&[0u8; 64], 10).is_err());
    }
}
