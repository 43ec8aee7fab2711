use image::{Rgb, RgbImage};
use palette::{Gradient, LinSrgb};
use spacemap_core::Category;

// Classified cells: void is black, gas blue-grey, stars yellow, black holes purple
fn category_color(c: Category) -> LinSrgb {
    match c {
        Category::Empty => LinSrgb::new(0.0, 0.0, 0.0),
        Category::Sparse => LinSrgb::new(0.25, 0.3, 0.45),
        Category::Dense => LinSrgb::new(1.0, 0.9, 0.4),
        Category::Extreme => LinSrgb::new(0.5, 0.0, 0.6),
    }
}

fn to_rgb(col: LinSrgb) -> Rgb<u8> {
    let rgb = col.into_format::<u8>();
    Rgb([rgb.red, rgb.green, rgb.blue])
}

/// Row-major category layer as an image, one pixel per cell.
pub fn category_image(layer: &[Category], width: usize, height: usize) -> RgbImage {
    let mut img = RgbImage::new(width as u32, height as u32);
    for (i, c) in layer.iter().enumerate().take(width * height) {
        img.put_pixel((i % width) as u32, (i / width) as u32, to_rgb(category_color(*c)));
    }
    img
}

/// Row-major sample layer as a dark-to-bright gradient, min-max normalized.
pub fn sample_image(layer: &[f64], width: usize, height: usize) -> RgbImage {
    let gradient = Gradient::with_domain(vec![
        (0.0, LinSrgb::new(0.0, 0.0, 0.05)),
        (0.5, LinSrgb::new(0.2, 0.25, 0.5)),
        (1.0, LinSrgb::new(1.0, 1.0, 0.9)),
    ]);

    let (min, max) = layer
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    let mut img = RgbImage::new(width as u32, height as u32);
    for (i, &v) in layer.iter().enumerate().take(width * height) {
        let norm = if (max - min).abs() < f64::EPSILON {
            0.5
        } else {
            (v - min) / (max - min)
        };
        let col: LinSrgb = gradient.get(norm as f32);
        img.put_pixel((i % width) as u32, (i / width) as u32, to_rgb(col));
    }
    img
}
