use serde::{Deserialize, Serialize};

/// Palette used for spectrogram cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorScheme {
    Grayscale,
    Heat,
    #[default]
    Magma,
}

const GRAYSCALE_STOPS: [[u8; 3]; 2] = [[0, 0, 0], [255, 255, 255]];

const HEAT_STOPS: [[u8; 3]; 5] = [
    [0, 0, 0],
    [128, 0, 0],
    [230, 40, 0],
    [255, 200, 40],
    [255, 255, 255],
];

const MAGMA_STOPS: [[u8; 3]; 6] = [
    [0, 0, 4],
    [59, 15, 112],
    [140, 41, 129],
    [222, 73, 104],
    [254, 159, 109],
    [252, 253, 191],
];

impl ColorScheme {
    fn stops(self) -> &'static [[u8; 3]] {
        match self {
            ColorScheme::Grayscale => &GRAYSCALE_STOPS,
            ColorScheme::Heat => &HEAT_STOPS,
            ColorScheme::Magma => &MAGMA_STOPS,
        }
    }
}

/// 256-entry lookup table from spectrogram level to RGB, with brightness and
/// contrast folded in.
#[derive(Clone, Debug)]
pub struct ColorMap {
    lut: [[u8; 3]; 256],
}

impl ColorMap {
    /// `brightness` shifts the normalized level (0 leaves it alone), `contrast`
    /// scales it around mid-grey (1 leaves it alone).
    pub fn new(scheme: ColorScheme, brightness: f64, contrast: f64) -> Self {
        let stops = scheme.stops();
        let segments = (stops.len() - 1) as f64;
        let mut lut = [[0u8; 3]; 256];

        for (level, entry) in lut.iter_mut().enumerate() {
            let t = adjust(level as f64 / 255.0, brightness, contrast);
            let scaled = t * segments;
            let index = (scaled.floor() as usize).min(stops.len() - 1);
            let next = (index + 1).min(stops.len() - 1);
            let frac = scaled - index as f64;

            for channel in 0..3 {
                let start = stops[index][channel] as f64;
                let stop = stops[next][channel] as f64;
                entry[channel] = (start + (stop - start) * frac).round().clamp(0.0, 255.0) as u8;
            }
        }

        Self { lut }
    }

    pub fn rgb(&self, level: u8) -> [u8; 3] {
        self.lut[level as usize]
    }

    pub fn rgba(&self, level: u8) -> [u8; 4] {
        let [r, g, b] = self.rgb(level);
        [r, g, b, 255]
    }
}

fn adjust(t: f64, brightness: f64, contrast: f64) -> f64 {
    ((t - 0.5) * contrast + 0.5 + brightness).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grayscale_is_identity_by_default() {
        let map = ColorMap::new(ColorScheme::Grayscale, 0.0, 1.0);
        for level in [0u8, 1, 64, 128, 200, 255] {
            assert_eq!(map.rgb(level), [level, level, level]);
        }
    }

    #[test]
    fn endpoints_match_palette_stops() {
        let map = ColorMap::new(ColorScheme::Magma, 0.0, 1.0);
        assert_eq!(map.rgb(0), MAGMA_STOPS[0]);
        assert_eq!(map.rgb(255), MAGMA_STOPS[5]);
        let heat = ColorMap::new(ColorScheme::Heat, 0.0, 1.0);
        assert_eq!(heat.rgb(0), [0, 0, 0]);
        assert_eq!(heat.rgb(255), [255, 255, 255]);
    }

    #[test]
    fn brightness_lifts_levels() {
        let base = ColorMap::new(ColorScheme::Grayscale, 0.0, 1.0);
        let bright = ColorMap::new(ColorScheme::Grayscale, 0.2, 1.0);
        assert!(bright.rgb(100)[0] > base.rgb(100)[0]);
        assert_eq!(bright.rgb(255), [255, 255, 255]);
    }

    #[test]
    fn contrast_spreads_around_mid_grey() {
        let flat = ColorMap::new(ColorScheme::Grayscale, 0.0, 0.0);
        assert_eq!(flat.rgb(0), flat.rgb(255));
        let steep = ColorMap::new(ColorScheme::Grayscale, 0.0, 2.0);
        assert_eq!(steep.rgb(50), [0, 0, 0]);
        assert_eq!(steep.rgb(220), [255, 255, 255]);
    }

    #[test]
    fn scheme_names_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            scheme: ColorScheme,
        }
        let w: Wrapper = toml::from_str("scheme = \"heat\"").unwrap();
        assert_eq!(w.scheme, ColorScheme::Heat);
    }
}
