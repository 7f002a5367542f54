//! Automatic visual classification of uploaded images.
//!
//! Every stored image gets exactly three derived tags: orientation,
//! resolution class, and dominant background color. Classification is a
//! pure function of the pixel content, so re-running it on the same bytes
//! always yields the same tags.

use image::DynamicImage;

/// Landscape/portrait split; square images count as horizontal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Horizontal => "horizontal",
            Orientation::Vertical => "vertical",
        }
    }
}

/// Above or below the Full-HD pixel-count threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionClass {
    Hq,
    Sq,
}

impl ResolutionClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionClass::Hq => "hq",
            ResolutionClass::Sq => "sq",
        }
    }
}

/// Dominant background color bucket derived from the average pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundColor {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    White,
    Black,
    Gray,
    Mixed,
}

impl BackgroundColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackgroundColor::Red => "redBg",
            BackgroundColor::Orange => "orangeBg",
            BackgroundColor::Yellow => "yellowBg",
            BackgroundColor::Green => "greenBg",
            BackgroundColor::Blue => "blueBg",
            BackgroundColor::White => "whiteBg",
            BackgroundColor::Black => "blackBg",
            BackgroundColor::Gray => "grayBg",
            BackgroundColor::Mixed => "mixedBg",
        }
    }
}

/// The three derived tags for one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub orientation: Orientation,
    pub resolution: ResolutionClass,
    pub background: BackgroundColor,
}

impl Classification {
    /// Tag titles in stable order: orientation, resolution, background.
    pub fn tags(&self) -> [&'static str; 3] {
        [
            self.orientation.as_str(),
            self.resolution.as_str(),
            self.background.as_str(),
        ]
    }
}

/// Derives visual tags from image pixel data.
#[derive(Debug, Clone, Copy, Default)]
pub struct VisualTagger;

impl VisualTagger {
    /// Pixel count above which an image is classified `hq`.
    const FULLHD_PIXELS: u64 = 1920 * 1080;

    pub fn new() -> Self {
        Self
    }

    /// Classify an encoded image.
    pub fn classify(&self, bytes: &[u8]) -> Result<Classification, image::ImageError> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(self.classify_decoded(&decoded))
    }

    fn classify_decoded(&self, decoded: &DynamicImage) -> Classification {
        let (width, height) = (decoded.width(), decoded.height());

        let orientation = if width >= height {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        };

        let resolution = if u64::from(width) * u64::from(height) > Self::FULLHD_PIXELS {
            ResolutionClass::Hq
        } else {
            ResolutionClass::Sq
        };

        let (r, g, b) = average_rgb(decoded);
        let background = classify_background(r, g, b);

        Classification {
            orientation,
            resolution,
            background,
        }
    }
}

/// Box-filter the whole image down to one representative pixel.
fn average_rgb(decoded: &DynamicImage) -> (f64, f64, f64) {
    let rgb = decoded.to_rgb8();
    let mut sums = [0u64; 3];
    for pixel in rgb.pixels() {
        sums[0] += u64::from(pixel.0[0]);
        sums[1] += u64::from(pixel.0[1]);
        sums[2] += u64::from(pixel.0[2]);
    }
    let count = (u64::from(rgb.width()) * u64::from(rgb.height())).max(1) as f64;
    (
        sums[0] as f64 / count,
        sums[1] as f64 / count,
        sums[2] as f64 / count,
    )
}

fn classify_background(r: f64, g: f64, b: f64) -> BackgroundColor {
    let (h, s, v) = rgb_to_hsv(r, g, b);

    // White / black detection
    if v > 0.85 {
        return BackgroundColor::White;
    }
    if v < 0.05 {
        return BackgroundColor::Black;
    }
    // Gray detection
    if s < 0.1 {
        return BackgroundColor::Gray;
    }
    // Hue-based color mapping
    if !(15.0..345.0).contains(&h) {
        return BackgroundColor::Red;
    }
    if h < 45.0 {
        return BackgroundColor::Orange;
    }
    if h < 65.0 {
        return BackgroundColor::Yellow;
    }
    if h < 170.0 {
        return BackgroundColor::Green;
    }
    if h < 260.0 {
        return BackgroundColor::Blue;
    }
    BackgroundColor::Mixed
}

/// RGB (0-255) to HSV (H in [0, 360), S and V in [0, 1]).
///
/// The red branch wraps with a true floating-point modulo; a truncating
/// integer remainder here collapses most red-adjacent hues to 0.
fn rgb_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let r = r / 255.0;
    let g = g / 255.0;
    let b = b / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let v = max;

    if delta < 1e-6 {
        return (0.0, 0.0, v);
    }

    let s = delta / max;
    let h = if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    (h, s, v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(rgb));
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();
        bytes
    }

    fn classify(width: u32, height: u32, rgb: [u8; 3]) -> Classification {
        VisualTagger::new()
            .classify(&solid_png(width, height, rgb))
            .unwrap()
    }

    #[test]
    fn white_and_black_and_gray_backgrounds() {
        assert_eq!(
            classify(10, 10, [255, 255, 255]).background,
            BackgroundColor::White
        );
        assert_eq!(classify(10, 10, [0, 0, 0]).background, BackgroundColor::Black);
        assert_eq!(
            classify(10, 10, [128, 128, 128]).background,
            BackgroundColor::Gray
        );
    }

    #[test]
    fn primary_hue_buckets() {
        assert_eq!(classify(10, 10, [200, 0, 0]).background, BackgroundColor::Red);
        assert_eq!(
            classify(10, 10, [200, 100, 0]).background,
            BackgroundColor::Orange
        );
        assert_eq!(
            classify(10, 10, [200, 200, 0]).background,
            BackgroundColor::Yellow
        );
        assert_eq!(classify(10, 10, [0, 200, 0]).background, BackgroundColor::Green);
        assert_eq!(classify(10, 10, [0, 0, 200]).background, BackgroundColor::Blue);
    }

    #[test]
    fn red_adjacent_hue_wraps_instead_of_collapsing_to_zero() {
        // Rose (r max, b > g) sits near 330 degrees. A truncating modulo
        // would report hue 0 and misclassify this as red.
        let classification = classify(10, 10, [200, 0, 100]);
        assert_eq!(classification.background, BackgroundColor::Mixed);

        // Just before the wrap boundary the bucket flips back to red.
        let (h, _, _) = rgb_to_hsv(200.0, 0.0, 20.0);
        assert!(h > 345.0, "expected near-wrap hue, got {h}");
        assert_eq!(classify(10, 10, [200, 0, 20]).background, BackgroundColor::Red);
    }

    #[test]
    fn orientation_and_resolution() {
        let wide = classify(3000, 1000, [0, 200, 0]);
        assert_eq!(wide.orientation, Orientation::Horizontal);
        assert_eq!(wide.resolution, ResolutionClass::Hq);

        let tall = classify(100, 200, [0, 200, 0]);
        assert_eq!(tall.orientation, Orientation::Vertical);
        assert_eq!(tall.resolution, ResolutionClass::Sq);

        // A square image counts as horizontal; exactly Full HD is still sq.
        let square = classify(1920, 1080, [0, 200, 0]);
        assert_eq!(square.orientation, Orientation::Horizontal);
        assert_eq!(square.resolution, ResolutionClass::Sq);
    }

    #[test]
    fn emits_exactly_three_distinct_tags() {
        let tags = classify(10, 10, [255, 255, 255]).tags();
        assert_eq!(tags, ["horizontal", "sq", "whiteBg"]);
    }

    #[test]
    fn rejects_non_image_bytes() {
        assert!(VisualTagger::new().classify(b"not an image").is_err());
    }

    #[test]
    fn hsv_conversion_reference_points() {
        let (h, s, v) = rgb_to_hsv(255.0, 0.0, 0.0);
        assert!((h - 0.0).abs() < 1e-9);
        assert!((s - 1.0).abs() < 1e-9);
        assert!((v - 1.0).abs() < 1e-9);

        let (h, _, _) = rgb_to_hsv(0.0, 255.0, 0.0);
        assert!((h - 120.0).abs() < 1e-9);

        let (h, _, _) = rgb_to_hsv(0.0, 0.0, 255.0);
        assert!((h - 240.0).abs() < 1e-9);

        // Achromatic input reports hue and saturation zero.
        let (h, s, v) = rgb_to_hsv(77.0, 77.0, 77.0);
        assert_eq!((h, s), (0.0, 0.0));
        assert!(v > 0.0);
    }
}
