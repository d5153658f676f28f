//! Cloud-guided edge enhancement
//!
//! An optional post-processing stage that asks a vision model to judge the
//! cutout's edges, then applies local alpha filters according to the verdict.
//! The cloud is advisory only: any API failure degrades to the local baseline
//! treatment, and enhancement never fails a run.

use crate::error::{NukkiError, Result};
use crate::filters;
use async_trait::async_trait;
use base64::Engine as _;
use image::{DynamicImage, RgbaImage};
use log::{debug, warn};
use serde::Deserialize;
use std::io::Cursor;

/// Vision model name used for edge analysis
const GEMINI_MODEL: &str = "gemini-2.5-flash";

const VERDICT_PROMPT: &str = "You are inspecting a product cutout with a transparent background. \
Look closely at the subject's edges and answer with a single JSON object, no other text: \
{\"edge_rough\": bool, \"has_halo\": bool, \"needs_smoothing\": bool}. \
edge_rough means jagged or pixelated edges, has_halo means a bright fringe of \
leftover background around the subject, needs_smoothing means the alpha \
transition is abrupt.";

const ANALYSIS_PROMPT: &str = "Describe this product cutout in two or three sentences: \
the subject, the edge quality, and any visible artifacts from background removal.";

const SCORE_PROMPT: &str = "Rate this cutout with a transparent background. Reply with exactly \
three lines and nothing else:\nedge: <1-10>\ntransparency: <1-10>\noverall: <1-10>";

/// A vision-language model that can answer questions about an image
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Generate a text response for a prompt plus a PNG-encoded image
    async fn generate(&self, prompt: &str, image_png: &[u8]) -> Result<String>;
}

/// Gemini REST backend for [`VisionModel`]
pub struct GeminiVisionModel {
    client: reqwest::Client,
    api_key: String,
}

impl GeminiVisionModel {
    /// Create a client for the given API key
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{GEMINI_MODEL}:generateContent?key={}",
            self.api_key
        )
    }

    /// Check whether the API key is accepted by the service
    ///
    /// Sends a minimal text-only request. Network faults count as invalid
    /// since the key cannot be used either way.
    pub async fn validate_api_key(&self) -> bool {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": "ping" }] }]
        });
        match self.client.post(self.endpoint()).json(&body).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("API key validation request failed: {e}");
                false
            },
        }
    }
}

#[async_trait]
impl VisionModel for GeminiVisionModel {
    async fn generate(&self, prompt: &str, image_png: &[u8]) -> Result<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image_png);
        let body = serde_json::json!({
            "contents": [{
                "parts": [
                    { "text": prompt },
                    { "inline_data": { "mime_type": "image/png", "data": encoded } }
                ]
            }]
        });

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| NukkiError::network("vision API request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(NukkiError::Network(format!(
                "vision API returned {status}: {text}"
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| NukkiError::network("vision API response was not JSON", e))?;
        payload
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| NukkiError::Network("vision API response had no text part".into()))
    }
}

/// Edge assessment returned by the vision model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct EdgeVerdict {
    /// Edges look jagged or pixelated
    #[serde(default)]
    pub edge_rough: bool,
    /// A fringe of leftover background surrounds the subject
    #[serde(default)]
    pub has_halo: bool,
    /// The alpha transition is abrupt
    #[serde(default)]
    pub needs_smoothing: bool,
}

/// Parse a verdict out of free-form model text
///
/// Takes the first balanced `{...}` span and tries to deserialize it. Anything
/// unparseable yields the all-false verdict, so a rambling response only means
/// no extra filtering.
#[must_use]
pub fn parse_verdict(text: &str) -> EdgeVerdict {
    let Some(start) = text.find('{') else {
        return EdgeVerdict::default();
    };
    let mut depth = 0usize;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let span = &text[start..=start + offset];
                    return serde_json::from_str(span).unwrap_or_default();
                }
            },
            _ => {},
        }
    }
    EdgeVerdict::default()
}

/// Numeric quality assessment of a finished cutout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QualityScore {
    /// Edge quality, 1-10
    pub edge_quality: u8,
    /// Background transparency quality, 1-10
    pub transparency: u8,
    /// Overall impression, 1-10
    pub overall: u8,
}

/// Parse the three-line score format, defaulting missing lines to 0
fn parse_score(text: &str) -> QualityScore {
    let mut score = QualityScore::default();
    for line in text.lines() {
        let lower = line.to_lowercase();
        let value = line
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(char::is_ascii_digit)
            .collect::<String>()
            .parse::<u8>()
            .unwrap_or(0)
            .min(10);
        if lower.contains("edge") {
            score.edge_quality = value;
        } else if lower.contains("transparency") {
            score.transparency = value;
        } else if lower.contains("overall") {
            score.overall = value;
        }
    }
    score
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image.clone()).write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

/// Post-processor that refines cutout edges with cloud guidance
pub struct EdgeEnhancer {
    model: Box<dyn VisionModel>,
}

impl EdgeEnhancer {
    /// Create an enhancer backed by the given vision model
    #[must_use]
    pub fn new(model: Box<dyn VisionModel>) -> Self {
        Self { model }
    }

    /// Enhancer using the Gemini REST backend
    #[must_use]
    pub fn gemini(api_key: String) -> Self {
        Self::new(Box::new(GeminiVisionModel::new(api_key)))
    }

    /// Refine the cutout's edges, optionally guided by the vision model
    ///
    /// With `auto_enhance` off this returns the image unchanged. Otherwise the
    /// alpha channel gets a baseline smoothing pass, the model's verdict adds
    /// halo erosion, edge blur or extra smoothing, and a light sharpness lift
    /// finishes. Cloud failures are logged and treated as the default verdict.
    pub async fn enhance_edges(&self, image: &RgbaImage, auto_enhance: bool) -> RgbaImage {
        if !auto_enhance {
            return image.clone();
        }

        let verdict = match encode_png(image) {
            Ok(png) => match self.model.generate(VERDICT_PROMPT, &png).await {
                Ok(text) => {
                    let verdict = parse_verdict(&text);
                    debug!("Edge verdict: {verdict:?}");
                    verdict
                },
                Err(e) => {
                    warn!("Edge analysis unavailable, applying baseline only: {e}");
                    EdgeVerdict::default()
                },
            },
            Err(e) => {
                warn!("Could not encode cutout for analysis: {e}");
                EdgeVerdict::default()
            },
        };

        let mut alpha = filters::smooth(&filters::alpha_channel(image));
        if verdict.needs_smoothing {
            alpha = filters::smooth(&alpha);
        }
        if verdict.has_halo {
            alpha = filters::erode(&alpha, 3);
        }
        let mut result = filters::with_alpha(image, &alpha);
        if verdict.edge_rough {
            result = filters::blur_alpha(&result, 0.5);
        }
        filters::adjust_sharpness(&result, 1.1)
    }

    /// Ask the vision model for a textual description of the cutout
    ///
    /// # Errors
    /// Encoding or API failures; callers decide whether to surface them
    pub async fn analyze_image(&self, image: &RgbaImage) -> Result<String> {
        let png = encode_png(image)?;
        self.model.generate(ANALYSIS_PROMPT, &png).await
    }

    /// Ask the vision model to score the cutout
    ///
    /// Unparseable score lines default to 0 rather than erroring.
    ///
    /// # Errors
    /// Encoding or API failures
    pub async fn quality_score(&self, image: &RgbaImage) -> Result<QualityScore> {
        let png = encode_png(image)?;
        let text = self.model.generate(SCORE_PROMPT, &png).await?;
        Ok(parse_score(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::ScriptedVisionModel;
    use image::Rgba;

    fn sample_cutout() -> RgbaImage {
        RgbaImage::from_fn(24, 24, |x, y| {
            if (8..16).contains(&x) && (8..16).contains(&y) {
                Rgba([180, 60, 60, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        })
    }

    #[test]
    fn test_parse_verdict_from_clean_json() {
        let verdict =
            parse_verdict(r#"{"edge_rough": true, "has_halo": false, "needs_smoothing": true}"#);
        assert!(verdict.edge_rough);
        assert!(!verdict.has_halo);
        assert!(verdict.needs_smoothing);
    }

    #[test]
    fn test_parse_verdict_from_surrounding_prose() {
        let text = "Sure! Here is my assessment:\n```json\n{\"has_halo\": true}\n``` Hope it helps.";
        let verdict = parse_verdict(text);
        assert!(verdict.has_halo);
        assert!(!verdict.edge_rough);
    }

    #[test]
    fn test_parse_verdict_falls_back_to_no_op() {
        assert_eq!(parse_verdict("the edges look great"), EdgeVerdict::default());
        assert_eq!(parse_verdict("{not json}"), EdgeVerdict::default());
        assert_eq!(parse_verdict("{\"unclosed\": true"), EdgeVerdict::default());
    }

    #[test]
    fn test_parse_score_lines() {
        let score = parse_score("edge: 7\ntransparency: 9\noverall: 8");
        assert_eq!(
            score,
            QualityScore {
                edge_quality: 7,
                transparency: 9,
                overall: 8
            }
        );
    }

    #[test]
    fn test_parse_score_defaults_missing_lines_to_zero() {
        let score = parse_score("overall: 6");
        assert_eq!(score.edge_quality, 0);
        assert_eq!(score.transparency, 0);
        assert_eq!(score.overall, 6);
    }

    #[tokio::test]
    async fn test_enhance_disabled_is_exact_identity() {
        let enhancer = EdgeEnhancer::new(Box::new(ScriptedVisionModel::failing()));
        let image = sample_cutout();
        assert_eq!(enhancer.enhance_edges(&image, false).await, image);
    }

    #[tokio::test]
    async fn test_enhance_survives_cloud_failure() {
        let enhancer = EdgeEnhancer::new(Box::new(ScriptedVisionModel::failing()));
        let image = sample_cutout();
        let enhanced = enhancer.enhance_edges(&image, true).await;
        assert_eq!(enhanced.dimensions(), image.dimensions());
    }

    #[tokio::test]
    async fn test_quality_score_uses_model_reply() {
        let enhancer = EdgeEnhancer::new(Box::new(ScriptedVisionModel::replying(
            "edge: 5\ntransparency: 10\noverall: 7",
        )));
        let score = enhancer.quality_score(&sample_cutout()).await.unwrap();
        assert_eq!(score.overall, 7);
        assert_eq!(score.transparency, 10);
    }
}
