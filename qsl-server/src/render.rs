//! Certificate rendering.
//!
//! Templates are Handlebars HTML with `{{placeholder}}` slots. Values are
//! HTML-escaped by the engine. [`CertificateRenderer`] hands the page to a
//! [`Rasterizer`].

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use handlebars::Handlebars;
use qsl_core::errors::QslError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_EYEBALL_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{{title}}</title>
<style>
  body { font-family: Georgia, serif; text-align: center; margin: 48px; }
  h1 { font-size: 36px; margin-bottom: 8px; }
  .callsign { font-size: 56px; font-weight: bold; letter-spacing: 4px; }
  .details { margin-top: 32px; font-size: 18px; line-height: 1.8; }
</style>
</head>
<body>
  <h1>{{title}}</h1>
  <p>{{description}}</p>
  <div class="callsign">{{callsign}}</div>
  <div class="name">{{name}}</div>
  <div class="details">
    <div>Date: {{date}}</div>
    <div>Location: {{location}}</div>
    <div>Event: {{eventName}}</div>
    <div>Witnesses: {{witnesses}}</div>
    <div>Verified by: {{verificationMethod}}</div>
    <div>{{additionalInfo}}</div>
  </div>
</body>
</html>
"#;

/// A rendered certificate as stored on the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedDocument {
    pub content_type: String,
    pub content: String,
}

/// Turns a composed HTML page into the final document.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, html: &str) -> Result<RenderedDocument>;
}

/// Keeps the page as HTML.
pub struct HtmlRasterizer;

#[async_trait]
impl Rasterizer for HtmlRasterizer {
    async fn rasterize(&self, html: &str) -> Result<RenderedDocument> {
        Ok(RenderedDocument {
            content_type: "text/html".to_string(),
            content: html.to_string(),
        })
    }
}

/// Name of the built-in eyeball template in the registry.
pub const DEFAULT_EYEBALL: &str = "eyeball-default";

/// Lists render as `a, b` rather than Handlebars' `[a, b]`.
fn template_data(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| {
            let v = match v {
                Value::Array(items) => Value::String(
                    items
                        .iter()
                        .map(|i| match i {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(", "),
                ),
                other => other.clone(),
            };
            (k.clone(), v)
        })
        .collect()
}

#[derive(Clone)]
pub struct CertificateRenderer {
    handlebars: Arc<Handlebars<'static>>,
    rasterizer: Arc<dyn Rasterizer>,
}

impl CertificateRenderer {
    pub fn new(rasterizer: Arc<dyn Rasterizer>) -> Result<Self> {
        let mut hb = Handlebars::new();
        hb.register_template_string(DEFAULT_EYEBALL, DEFAULT_EYEBALL_TEMPLATE)?;
        Ok(Self {
            handlebars: Arc::new(hb),
            rasterizer,
        })
    }

    /// HTML renderer with the built-in templates.
    pub fn html() -> Result<Self> {
        Self::new(Arc::new(HtmlRasterizer))
    }

    /// Fill `template`, or the built-in eyeball template when `None`.
    /// Unknown keys render empty; a malformed tenant template is a 400.
    pub fn compose(&self, template: Option<&str>, fields: &Map<String, Value>) -> Result<String> {
        let data = template_data(fields);
        match template {
            None => Ok(self.handlebars.render(DEFAULT_EYEBALL, &data)?),
            Some(html) => self.handlebars.render_template(html, &data).map_err(|e| {
                QslError::bad_request(format!("Invalid certificate template: {e}")).into_anyhow()
            }),
        }
    }

    pub async fn render(
        &self,
        template: Option<&str>,
        fields: &Map<String, Value>,
    ) -> Result<RenderedDocument> {
        let html = self.compose(template, fields)?;
        self.rasterizer.rasterize(&html).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn placeholders_are_filled_and_escaped() {
        let html = CertificateRenderer::html()
            .unwrap()
            .compose(
                Some("<h1>{{ callsign }}</h1><p>{{name}}</p><i>{{missing}}</i>"),
                &fields(json!({"callsign": "BG7XYZ", "name": "<script>&\"</script>"})),
            )
            .unwrap();
        assert_eq!(
            html,
            "<h1>BG7XYZ</h1><p>&lt;script&gt;&amp;&quot;&lt;/script&gt;</p><i></i>"
        );
    }

    #[test]
    fn lists_are_joined() {
        let html = CertificateRenderer::html()
            .unwrap()
            .compose(
                Some("{{witnesses}}"),
                &fields(json!({"witnesses": ["BA1AA", "Zhang (BD4XX)"]})),
            )
            .unwrap();
        assert_eq!(html, "BA1AA, Zhang (BD4XX)");
    }

    #[test]
    fn malformed_tenant_templates_are_bad_requests() {
        let err = CertificateRenderer::html()
            .unwrap()
            .compose(Some("{{#if callsign}}unclosed"), &Map::new())
            .unwrap_err();
        assert_eq!(QslError::find_in(&err).map(|e| e.code()), Some(400));
    }

    #[tokio::test]
    async fn builtin_template_renders_to_html() {
        let doc = CertificateRenderer::html()
            .unwrap()
            .render(None, &fields(json!({"callsign": "BG7XYZ"})))
            .await
            .unwrap();
        assert_eq!(doc.content_type, "text/html");
        assert!(doc.content.contains("BG7XYZ"));
        assert!(!doc.content.contains("{{"));
    }
}
