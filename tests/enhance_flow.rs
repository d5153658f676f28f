//! Edge enhancement behavior with a scripted vision model

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use nukki::enhance::{parse_verdict, EdgeEnhancer, EdgeVerdict, VisionModel};
use nukki::{NukkiError, Result};

struct FixedReply(String);

#[async_trait]
impl VisionModel for FixedReply {
    async fn generate(&self, _prompt: &str, _image_png: &[u8]) -> Result<String> {
        Ok(self.0.clone())
    }
}

struct Unreachable;

#[async_trait]
impl VisionModel for Unreachable {
    async fn generate(&self, _prompt: &str, _image_png: &[u8]) -> Result<String> {
        Err(NukkiError::Network("connection refused".into()))
    }
}

fn cutout() -> RgbaImage {
    RgbaImage::from_fn(32, 32, |x, y| {
        if (10..22).contains(&x) && (10..22).contains(&y) {
            Rgba([200, 120, 40, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

#[tokio::test]
async fn disabled_enhancement_returns_identical_pixels() {
    let enhancer = EdgeEnhancer::new(Box::new(Unreachable));
    let image = cutout();
    let result = enhancer.enhance_edges(&image, false).await;
    assert_eq!(result, image);
}

#[tokio::test]
async fn cloud_outage_still_produces_a_cutout() {
    let enhancer = EdgeEnhancer::new(Box::new(Unreachable));
    let image = cutout();
    let result = enhancer.enhance_edges(&image, true).await;
    assert_eq!(result.dimensions(), image.dimensions());
}

#[tokio::test]
async fn halo_verdict_shrinks_the_opaque_region() {
    let verdict = r#"{"edge_rough": false, "has_halo": true, "needs_smoothing": false}"#;
    let with_halo = EdgeEnhancer::new(Box::new(FixedReply(verdict.into())));
    let plain = EdgeEnhancer::new(Box::new(FixedReply("{}".into())));

    let image = cutout();
    let eroded = with_halo.enhance_edges(&image, true).await;
    let baseline = plain.enhance_edges(&image, true).await;

    let opaque = |img: &RgbaImage| img.pixels().filter(|p| p[3] > 200).count();
    assert!(opaque(&eroded) < opaque(&baseline));
}

#[tokio::test]
async fn quality_score_parses_model_lines() {
    let enhancer = EdgeEnhancer::new(Box::new(FixedReply(
        "edge: 8\ntransparency: 9\noverall: 8".into(),
    )));
    let score = enhancer.quality_score(&cutout()).await.unwrap();
    assert_eq!((score.edge_quality, score.transparency, score.overall), (8, 9, 8));
}

#[tokio::test]
async fn analysis_passes_model_text_through() {
    let enhancer = EdgeEnhancer::new(Box::new(FixedReply("A mug on transparency.".into())));
    let text = enhancer.analyze_image(&cutout()).await.unwrap();
    assert_eq!(text, "A mug on transparency.");
}

#[test]
fn verdict_parsing_is_total() {
    assert_eq!(parse_verdict("no json here"), EdgeVerdict::default());
    let verdict = parse_verdict("prefix {\"needs_smoothing\": true} suffix");
    assert!(verdict.needs_smoothing);
}
