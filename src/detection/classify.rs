use crate::config::ClassifierConfig;
use crate::models::{ShapeFeatures, ShapeLabel};

/// Map measured features to a shape label.
///
/// Branches are keyed on the vertex count so at most one can match. All bands are inclusive.
pub fn classify(features: &ShapeFeatures, config: &ClassifierConfig) -> Option<ShapeLabel> {
    match features.vertex_count {
        3 if features.circularity >= config.triangle_min_circularity => Some(ShapeLabel::Triangle),
        4 if config.square_aspect.contains(features.aspect_ratio) => Some(ShapeLabel::Square),
        4 if config.rectangle_aspect.contains(features.aspect_ratio) => Some(ShapeLabel::Rectangle),
        n if n >= config.circle_min_vertices
            && features.circularity >= config.circle_min_circularity
            && config.circle_aspect.contains(features.aspect_ratio) =>
        {
            Some(ShapeLabel::Circle)
        }
        _ => None,
    }
}
