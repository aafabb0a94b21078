//! Равномерная сетка корзин для поиска ближайших узлов и рёбер.
//!
//! Сетка используется только для выборки кандидатов: результат запроса отсортирован
//! и не зависит от порядка обхода `HashMap`.

use std::collections::HashMap;

use super::geometry::Point;

#[derive(Debug, Clone)]
pub struct SpatialGrid<T> {
    cell: f64,
    cells: HashMap<(i32, i32), Vec<T>>,
}

impl<T: Copy + Ord> SpatialGrid<T> {
    #[must_use]
    pub fn new(cell: f64) -> Self {
        Self {
            cell: cell.max(1e-6),
            cells: HashMap::new(),
        }
    }

    fn key(&self, p: Point) -> (i32, i32) {
        (
            (p.x / self.cell).floor() as i32,
            (p.y / self.cell).floor() as i32,
        )
    }

    fn cell_range(&self, a: Point, b: Point) -> ((i32, i32), (i32, i32)) {
        let lo = self.key(Point::new(a.x.min(b.x), a.y.min(b.y)));
        let hi = self.key(Point::new(a.x.max(b.x), a.y.max(b.y)));
        (lo, hi)
    }

    pub fn insert_point(&mut self, item: T, p: Point) {
        let key = self.key(p);
        self.cells.entry(key).or_default().push(item);
    }

    pub fn remove_point(&mut self, item: T, p: Point) {
        let key = self.key(p);
        if let Some(bucket) = self.cells.get_mut(&key) {
            bucket.retain(|&x| x != item);
        }
    }

    /// Отрезок регистрируется во всех клетках своего ограничивающего прямоугольника.
    pub fn insert_segment(&mut self, item: T, a: Point, b: Point) {
        let ((x0, y0), (x1, y1)) = self.cell_range(a, b);
        for cx in x0..=x1 {
            for cy in y0..=y1 {
                self.cells.entry((cx, cy)).or_default().push(item);
            }
        }
    }

    pub fn remove_segment(&mut self, item: T, a: Point, b: Point) {
        let ((x0, y0), (x1, y1)) = self.cell_range(a, b);
        for cx in x0..=x1 {
            for cy in y0..=y1 {
                if let Some(bucket) = self.cells.get_mut(&(cx, cy)) {
                    bucket.retain(|&x| x != item);
                }
            }
        }
    }

    /// Все элементы в клетках, пересекающих прямоугольник `a`–`b`, расширенный на `margin`.
    #[must_use]
    pub fn query(&self, a: Point, b: Point, margin: f64) -> Vec<T> {
        let lo = Point::new(a.x.min(b.x) - margin, a.y.min(b.y) - margin);
        let hi = Point::new(a.x.max(b.x) + margin, a.y.max(b.y) + margin);
        let ((x0, y0), (x1, y1)) = self.cell_range(lo, hi);
        let mut out = Vec::new();
        for cx in x0..=x1 {
            for cy in y0..=y1 {
                if let Some(bucket) = self.cells.get(&(cx, cy)) {
                    out.extend_from_slice(bucket);
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}
