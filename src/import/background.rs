use crate::dsl::numeric::{parse_double_legacy, parse_int_legacy, parse_time};
use crate::model::{TransitionMode, DEFAULT_BACKGROUND_REPETITIONS};

use super::{read_records, ImportError};

/// A dynamic background layer before its texture is registered.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    /// Seconds since midnight.
    pub time: f64,
    pub mode: TransitionMode,
    /// Texture reference relative to the XML file.
    pub texture: String,
    pub repetitions: u32,
    pub transition_time: f64,
}

/// Default crossfade between layers, seconds.
const DEFAULT_TRANSITION_TIME: f64 = 800.0;

/// Parse a dynamic background file: one `<Background>` element per layer.
/// Layers are returned ordered by time.
pub fn parse_background_layers(xml: &str) -> Result<Vec<LayerSpec>, ImportError> {
    let records = read_records(xml, "background")?;
    if records.is_empty() {
        return Err(ImportError::Parse("no <Background> elements".to_string()));
    }

    let mut layers = Vec::with_capacity(records.len());
    for (n, record) in records.iter().enumerate() {
        let texture = record
            .get("texture")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ImportError::Parse(format!("background layer {n} has no texture")))?;
        let mode = match record.get("mode").map(|m| m.to_ascii_lowercase()).as_deref() {
            None | Some("" | "none") => TransitionMode::None,
            Some("fadein") => TransitionMode::FadeIn,
            Some("fadeout") => TransitionMode::FadeOut,
            Some(other) => {
                return Err(ImportError::Parse(format!("unknown transition mode {other}")));
            }
        };
        layers.push(LayerSpec {
            time: record.get("time").and_then(|t| parse_time(t)).unwrap_or(0.0),
            mode,
            texture: texture.clone(),
            repetitions: record
                .get("repetitions")
                .and_then(|r| parse_int_legacy(r))
                .and_then(|r| u32::try_from(r).ok())
                .filter(|r| *r > 0)
                .unwrap_or(DEFAULT_BACKGROUND_REPETITIONS),
            transition_time: record
                .get("transitiontime")
                .and_then(|t| parse_double_legacy(t))
                .filter(|t| *t >= 0.0)
                .unwrap_or(DEFAULT_TRANSITION_TIME),
        });
    }
    layers.sort_by(|a, b| a.time.total_cmp(&b.time));
    Ok(layers)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn layers_are_sorted_by_time() {
        let xml = "<openBVE>
            <Background><Time>18.00</Time><Mode>FadeOut</Mode><Texture>dusk.png</Texture></Background>
            <Background><Time>06.30</Time><Mode>FadeIn</Mode><Texture>day.png</Texture>
                <Repetitions>4</Repetitions><TransitionTime>300</TransitionTime></Background>
        </openBVE>";
        let layers = parse_background_layers(xml).unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].texture, "day.png");
        assert_eq!(layers[0].time, 6.5 * 3600.0);
        assert_eq!(layers[0].mode, TransitionMode::FadeIn);
        assert_eq!(layers[0].repetitions, 4);
        assert_eq!(layers[0].transition_time, 300.0);
        assert_eq!(layers[1].repetitions, DEFAULT_BACKGROUND_REPETITIONS);
        assert_eq!(layers[1].transition_time, DEFAULT_TRANSITION_TIME);
    }

    #[test]
    fn layer_without_texture_fails() {
        let xml = "<openBVE><Background><Time>1</Time></Background></openBVE>";
        assert!(matches!(parse_background_layers(xml), Err(ImportError::Parse(_))));
    }

    #[test]
    fn no_layers_fails() {
        assert!(parse_background_layers("<openBVE/>").is_err());
    }

    #[test]
    fn unknown_mode_fails() {
        let xml = "<x><Background><Texture>a.png</Texture><Mode>Spin</Mode></Background></x>";
        assert!(parse_background_layers(xml).is_err());
    }
}
