//! Per-line style classification and block layout.

use promoreel_common::error::PromoreelResult;
use promoreel_composition_model::{CaptionStyle, StyleDecision};

use crate::wrap::wrap;

/// Decides size and weight for a source caption line.
///
/// Closures `Fn(&str) -> StyleDecision` implement this directly, so callers
/// can swap in stricter rules without touching the wrapping algorithm.
pub trait LineClassifier: Send + Sync {
    fn classify(&self, line: &str) -> StyleDecision;
}

impl<F> LineClassifier for F
where
    F: Fn(&str) -> StyleDecision + Send + Sync,
{
    fn classify(&self, line: &str) -> StyleDecision {
        self(line)
    }
}

/// Marks lines containing any of a set of substrings as emphasized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmphasisClassifier {
    markers: Vec<String>,
    base_font_pt: u32,
    emphasis_font_pt: u32,
}

impl EmphasisClassifier {
    pub fn new(markers: Vec<String>, base_font_pt: u32, emphasis_font_pt: u32) -> Self {
        Self {
            markers,
            base_font_pt,
            emphasis_font_pt,
        }
    }

    pub fn from_style(style: &CaptionStyle) -> Self {
        Self::new(
            style.emphasis_markers.clone(),
            style.base_font_pt,
            style.emphasis_font_pt,
        )
    }

    pub fn is_emphasized(&self, line: &str) -> bool {
        self.markers
            .iter()
            .any(|m| !m.is_empty() && line.contains(m.as_str()))
    }
}

impl Default for EmphasisClassifier {
    fn default() -> Self {
        Self::from_style(&CaptionStyle::default())
    }
}

impl LineClassifier for EmphasisClassifier {
    fn classify(&self, line: &str) -> StyleDecision {
        let bold = self.is_emphasized(line);
        StyleDecision {
            text: line.to_string(),
            font_size_pt: if bold {
                self.emphasis_font_pt
            } else {
                self.base_font_pt
            },
            bold,
        }
    }
}

/// Classify one source line, then wrap it at the decided size.
///
/// Every wrapped sub-line inherits the source line's style.
pub fn layout_line(
    line: &str,
    classifier: &dyn LineClassifier,
    max_text_width: f64,
) -> PromoreelResult<Vec<StyleDecision>> {
    let decision = classifier.classify(line);
    let wrapped = wrap(line, max_text_width, f64::from(decision.font_size_pt))?;

    tracing::trace!(
        line,
        font_size_pt = decision.font_size_pt,
        bold = decision.bold,
        wrapped = wrapped.len(),
        "Laid out caption line"
    );

    Ok(wrapped
        .into_iter()
        .map(|text| decision.with_text(text))
        .collect())
}

/// Lay out every line of a block in order.
pub fn layout_block<S: AsRef<str>>(
    lines: &[S],
    classifier: &dyn LineClassifier,
    max_text_width: f64,
) -> PromoreelResult<Vec<StyleDecision>> {
    let mut out = Vec::new();
    for line in lines {
        out.extend(layout_line(line.as_ref(), classifier, max_text_width)?);
    }
    Ok(out)
}
