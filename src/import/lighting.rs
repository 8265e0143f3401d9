use crate::dsl::numeric::{parse_byte_legacy, parse_double_legacy, parse_time};
use crate::model::route::RouteInfo;
use crate::model::structure::light_direction;
use crate::model::LightDefinition;

use super::{parse_rgb, read_records, ImportError};

/// Parse a dynamic lighting file: one `<Brightness>` element per light state.
///
/// Fields missing from a state fall back to the route defaults. States are
/// returned ordered by time.
pub fn parse_light_definitions(xml: &str) -> Result<Vec<LightDefinition>, ImportError> {
    let records = read_records(xml, "brightness")?;
    if records.is_empty() {
        return Err(ImportError::Parse("no <Brightness> elements".to_string()));
    }
    let defaults = RouteInfo::default();

    let mut states = Vec::with_capacity(records.len());
    for (n, record) in records.iter().enumerate() {
        let time = record
            .get("time")
            .and_then(|t| parse_time(t))
            .ok_or_else(|| ImportError::Parse(format!("light state {n} has no valid time")))?;
        let color = |key: &str, fallback: [u8; 3]| -> Result<[u8; 3], ImportError> {
            match record.get(key) {
                None => Ok(fallback),
                Some(text) => parse_rgb(text)
                    .ok_or_else(|| ImportError::Parse(format!("{key} {text} is not an RGB triple"))),
            }
        };
        let direction = match record.get("lightdirection") {
            None => defaults.light_direction,
            Some(text) => {
                let angles: Vec<f64> = text
                    .split([',', ';'])
                    .filter_map(parse_double_legacy)
                    .collect();
                match angles.as_slice() {
                    [theta, phi] => light_direction(*theta, *phi),
                    _ => {
                        return Err(ImportError::Parse(format!(
                            "LightDirection {text} needs theta and phi"
                        )));
                    }
                }
            }
        };
        states.push(LightDefinition {
            time,
            ambient: color("ambientlight", defaults.ambient_light)?,
            directional: color("directionallight", defaults.directional_light)?,
            direction,
            cab_lighting: record
                .get("cablighting")
                .and_then(|c| parse_byte_legacy(c))
                .unwrap_or(255),
        });
    }
    states.sort_by(|a, b| a.time.total_cmp(&b.time));
    Ok(states)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_sorts_states() {
        let xml = "<openBVE>
            <Brightness><Time>20.00</Time><AmbientLight>40,40,60</AmbientLight><CabLighting>0</CabLighting></Brightness>
            <Brightness><Time>12.00</Time><DirectionalLight>255,250,240</DirectionalLight>
                <LightDirection>45,0</LightDirection></Brightness>
        </openBVE>";
        let states = parse_light_definitions(xml).unwrap();
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].time, 12.0 * 3600.0);
        assert_eq!(states[0].directional, [255, 250, 240]);
        assert_eq!(states[0].ambient, [160, 160, 160]);
        assert_eq!(states[0].cab_lighting, 255);
        assert!((states[0].direction.y + 45f64.to_radians().sin()).abs() < 1e-12);
        assert_eq!(states[1].ambient, [40, 40, 60]);
        assert_eq!(states[1].cab_lighting, 0);
    }

    #[test]
    fn missing_time_fails() {
        let xml = "<a><Brightness><AmbientLight>1,2,3</AmbientLight></Brightness></a>";
        assert!(parse_light_definitions(xml).is_err());
    }

    #[test]
    fn bad_color_fails() {
        let xml = "<a><Brightness><Time>1</Time><AmbientLight>red</AmbientLight></Brightness></a>";
        assert!(matches!(parse_light_definitions(xml), Err(ImportError::Parse(_))));
    }
}
