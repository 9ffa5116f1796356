//! Dominant colour extraction
//!
//! Decodes the image, shrinks it to a small bounding box, samples a fixed
//! stride of pixels and groups them into colour clusters. The output is the
//! top clusters by frequency with each cluster's mean colour.

use crate::config::SamplerConfig;
use crate::error::{Result, SoilError};
use crate::types::{rgb_distance, SampledColor};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

/// Running totals for one colour cluster
#[derive(Debug, Clone)]
struct Cluster {
    seed: [u8; 3],
    sum: [u64; 3],
    count: usize,
}

impl Cluster {
    fn new(rgb: [u8; 3]) -> Self {
        Self {
            seed: rgb,
            sum: [rgb[0] as u64, rgb[1] as u64, rgb[2] as u64],
            count: 1,
        }
    }

    fn push(&mut self, rgb: [u8; 3]) {
        for (acc, c) in self.sum.iter_mut().zip(rgb) {
            *acc += c as u64;
        }
        self.count += 1;
    }

    fn mean(&self) -> [u8; 3] {
        let n = self.count as f64;
        [
            (self.sum[0] as f64 / n).round() as u8,
            (self.sum[1] as f64 / n).round() as u8,
            (self.sum[2] as f64 / n).round() as u8,
        ]
    }
}

/// Output of one sampling pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSet {
    /// Top clusters, most frequent first
    pub colors: Vec<SampledColor>,
    /// Number of opaque pixels that were sampled
    pub points: usize,
}

/// Extracts representative colours from encoded image bytes
#[derive(Debug, Clone)]
pub struct ColorSampler {
    config: SamplerConfig,
}

impl ColorSampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    /// Decode and sample; undecodable bytes are an `ImageDecode` error
    pub fn sample(&self, bytes: &[u8]) -> Result<SampleSet> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| SoilError::image_decode("Failed to decode image", e))?;
        Ok(self.sample_image(&image))
    }

    /// Sample an already decoded image
    pub fn sample_image(&self, image: &DynamicImage) -> SampleSet {
        let max = self.config.max_dimension;
        let (width, height) = image.dimensions();

        let scaled;
        let working = if width > max || height > max {
            scaled = image.resize(max, max, FilterType::Triangle);
            &scaled
        } else {
            image
        };

        let rgba = working.to_rgba8();
        let pixels: Vec<[u8; 3]> = rgba
            .pixels()
            .step_by(self.config.pixel_stride.max(1))
            .filter(|p| p.0[3] > self.config.alpha_threshold)
            .map(|p| [p.0[0], p.0[1], p.0[2]])
            .collect();

        tracing::debug!(
            "Sampled {} opaque pixels from {}x{} image",
            pixels.len(),
            working.width(),
            working.height()
        );

        SampleSet {
            colors: self.cluster(&pixels),
            points: pixels.len(),
        }
    }

    /// Group pixels by proximity and return the largest clusters
    pub fn cluster(&self, pixels: &[[u8; 3]]) -> Vec<SampledColor> {
        if pixels.is_empty() {
            return Vec::new();
        }

        let mut clusters: Vec<Cluster> = Vec::new();
        for &rgb in pixels {
            let nearest = clusters
                .iter_mut()
                .map(|c| (rgb_distance(rgb, c.seed), c))
                .filter(|(d, _)| *d < self.config.cluster_distance)
                .min_by(|a, b| a.0.total_cmp(&b.0));

            match nearest {
                Some((_, cluster)) => cluster.push(rgb),
                None => clusters.push(Cluster::new(rgb)),
            }
        }

        // stable: equal counts keep creation order
        clusters.sort_by(|a, b| b.count.cmp(&a.count));

        let total = pixels.len() as f64;
        clusters
            .iter()
            .take(self.config.max_clusters)
            .map(|c| SampledColor::new(c.mean(), c.count as f64 / total))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn sampler() -> ColorSampler {
        ColorSampler::new(Config::default().sampler)
    }

    fn encode_png(image: RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_uniform_image_yields_single_cluster() {
        let bytes = encode_png(RgbaImage::from_pixel(40, 40, Rgba([139, 69, 19, 255])));
        let set = sampler().sample(&bytes).unwrap();
        // 1600 pixels, every 10th
        assert_eq!(set.points, 160);
        let colors = set.colors;
        assert_eq!(colors.len(), 1);
        assert_eq!(colors[0].rgb, [139, 69, 19]);
        assert!((colors[0].frequency - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_large_image_is_downscaled() {
        let bytes = encode_png(RgbaImage::from_pixel(640, 480, Rgba([200, 180, 140, 255])));
        let set = sampler().sample(&bytes).unwrap();
        // 100x75 after downscale, every 10th pixel
        assert_eq!(set.points, 750);
        assert_eq!(set.colors.len(), 1);
        let [r, g, b] = set.colors[0].rgb;
        assert!(r.abs_diff(200) <= 1 && g.abs_diff(180) <= 1 && b.abs_diff(140) <= 1);
    }

    #[test]
    fn test_transparent_pixels_are_skipped() {
        let bytes = encode_png(RgbaImage::from_pixel(20, 20, Rgba([10, 10, 10, 0])));
        let set = sampler().sample(&bytes).unwrap();
        assert!(set.colors.is_empty());
        assert_eq!(set.points, 0);
    }

    #[test]
    fn test_undecodable_bytes_fail() {
        let err = sampler().sample(b"definitely not an image").unwrap_err();
        assert!(matches!(err, SoilError::ImageDecode { .. }));
    }

    #[test]
    fn test_cluster_frequencies_and_order() {
        let mut pixels = vec![[250, 250, 250]; 6];
        pixels.extend(vec![[10, 10, 10]; 3]);
        pixels.push([12, 8, 14]);
        let colors = sampler().cluster(&pixels);

        assert_eq!(colors.len(), 2);
        assert_eq!(colors[0].rgb, [250, 250, 250]);
        assert!((colors[0].frequency - 0.6).abs() < 1e-9);
        assert!((colors[1].frequency - 0.4).abs() < 1e-9);
        let sum: f64 = colors.iter().map(|c| c.frequency).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cluster_count_is_capped() {
        let pixels = [
            [0, 0, 0],
            [255, 0, 0],
            [0, 255, 0],
            [0, 0, 255],
            [255, 255, 0],
            [0, 255, 255],
            [255, 0, 255],
            [255, 255, 255],
        ];
        let colors = sampler().cluster(&pixels);
        assert_eq!(colors.len(), 5);
    }
}
