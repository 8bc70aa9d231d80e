//! Page annotations made on the current document.
//!
//! Coordinates are in page space of the page the annotation sits on.

use serde::{Deserialize, Serialize};

/// Unique identifier for an annotation (UUID v4).
pub type AnnotationId = uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Highlight,
    Text,
    Drawing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: AnnotationId,
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    /// 1-based page number.
    pub page: u32,
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// CSS-style color string, e.g. `#FFEB3B`.
    pub color: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl Annotation {
    /// Create an annotation with a generated id
    pub fn new(
        kind: AnnotationKind,
        page: u32,
        x: f32,
        y: f32,
        color: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: AnnotationId::new_v4(),
            kind,
            page,
            x,
            y,
            width: None,
            height: None,
            text: None,
            color: color.into(),
            timestamp,
        }
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}
