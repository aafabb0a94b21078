//! Отладочный рисунок карты
//!
//! Полигоны заливаются цветом биома (вода — синим, темнее с глубиной),
//! поверх рисуются реки и переправы. Масштаб задаётся числом пикселей на
//! единицу длины карты.

use image::{ImageBuffer, Rgba, RgbaImage};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point as PixelPoint;
use std::path::Path;

use crate::biome::WATER_RGB;
use crate::error::Result;
use crate::map::{Map, MapFace};

const UNKNOWN_LAND: [u8; 3] = [150, 150, 150];
const RIVER: Rgba<u8> = Rgba([40, 90, 200, 255]);
const CROSSING: Rgba<u8> = Rgba([230, 200, 80, 255]);

pub struct MapImage {
    pub width: u32,
    pub height: u32,
    image: RgbaImage,
}

fn face_color(face: &MapFace) -> Rgba<u8> {
    let [r, g, b] = if face.water {
        // Каждый уровень глубины темнее на 12 %
        let depth = f64::from((-face.altitude).max(1) - 1).min(5.0);
        let k = 1.0 - 0.12 * depth;
        WATER_RGB.map(|c| (f64::from(c) * k) as u8)
    } else {
        face.biome.map_or(UNKNOWN_LAND, |b| b.to_rgb())
    };
    Rgba([r, g, b, 255])
}

impl MapImage {
    #[must_use]
    pub fn render(map: &Map, px_per_unit: u32) -> Self {
        let scale = px_per_unit.max(1) as f32;
        let width = ((map.width as f32) * scale).ceil().max(1.0) as u32;
        let height = ((map.height as f32) * scale).ceil().max(1.0) as u32;
        let mut image: RgbaImage = ImageBuffer::from_pixel(width, height, Rgba([0, 0, 0, 255]));
        let at = |n: u32| {
            let node = &map.nodes[n as usize];
            (node.x as f32 * scale, node.y as f32 * scale)
        };

        for face in &map.faces {
            let mut poly: Vec<PixelPoint<i32>> = Vec::with_capacity(face.nodes.len());
            for &n in &face.nodes {
                let (x, y) = at(n);
                let p = PixelPoint::new(x.round() as i32, y.round() as i32);
                if poly.last() != Some(&p) {
                    poly.push(p);
                }
            }
            // Контур не должен быть замкнут явно
            while poly.len() > 1 && poly.first() == poly.last() {
                poly.pop();
            }
            if poly.len() >= 3 {
                draw_polygon_mut(&mut image, &poly, face_color(face));
            }
        }

        for river in &map.rivers {
            for (i, pair) in river.nodes.windows(2).enumerate() {
                let (a, b) = (at(pair[0]), at(pair[1]));
                let width = river.widths.get(i + 1).copied().unwrap_or(0.0);
                let spread = (width * f64::from(scale) / 8.0).round().max(0.0) as i32;
                for d in -spread..=spread {
                    let o = d as f32 * 0.5;
                    draw_line_segment_mut(&mut image, (a.0 + o, a.1 + o), (b.0 + o, b.1 + o), RIVER);
                }
            }
        }

        for conn in &map.water_connections {
            let from = (conn.from[0] as f32 * scale, conn.from[1] as f32 * scale);
            let to = (conn.to[0] as f32 * scale, conn.to[1] as f32 * scale);
            draw_line_segment_mut(&mut image, from, to, CROSSING);
        }

        Self { width, height, image }
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.image.get_pixel(x, y).0
    }

    pub fn save_as_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.image.save(path)?;
        Ok(())
    }
}
