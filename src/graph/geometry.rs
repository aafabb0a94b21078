//! Геометрические примитивы на плоскости
//!
//! Все вычисления в `f64`. Полигоны задаются срезом вершин без повторения первой точки;
//! положительная площадь означает обход против часовой стрелки.

use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};
use std::ops::{Add, Mul, Sub};

/// Порог для предикатов ориентации.
const ORIENT_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Единичный вектор в направлении `angle` (радианы).
    #[must_use]
    pub fn from_angle(angle: f64) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    #[must_use]
    pub fn cross(self, other: Point) -> f64 {
        self.x * other.y - self.y * other.x
    }

    #[must_use]
    pub fn dot(self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        (self - other).length()
    }

    /// Угол направления из `self` в `to`.
    #[must_use]
    pub fn angle_to(self, to: Point) -> f64 {
        (to.y - self.y).atan2(to.x - self.x)
    }

    #[must_use]
    pub fn lerp(self, to: Point, t: f64) -> Point {
        self + (to - self) * t
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

/// Ориентация тройки: > 0 — поворот против часовой стрелки.
#[must_use]
pub fn orient(a: Point, b: Point, c: Point) -> f64 {
    (b - a).cross(c - a)
}

/// Приводит угол к диапазону `[0, 2π)`.
#[must_use]
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle.rem_euclid(TAU);
    if a >= TAU { 0.0 } else { a }
}

/// Наименьшее угловое расстояние между направлениями, `[0, π]`.
#[must_use]
pub fn angle_between(a: f64, b: f64) -> f64 {
    let d = normalize_angle(a - b);
    if d > PI { TAU - d } else { d }
}

/// Собственное пересечение отрезков `ab` и `cd` (касания и общие концы не считаются).
///
/// Возвращает параметр `t` точки пересечения вдоль `ab`.
#[must_use]
pub fn segment_crossing(a: Point, b: Point, c: Point, d: Point) -> Option<f64> {
    let d1 = orient(c, d, a);
    let d2 = orient(c, d, b);
    let d3 = orient(a, b, c);
    let d4 = orient(a, b, d);
    let straddles = |p: f64, q: f64| (p > ORIENT_EPS && q < -ORIENT_EPS) || (p < -ORIENT_EPS && q > ORIENT_EPS);
    if straddles(d1, d2) && straddles(d3, d4) {
        Some(d1 / (d1 - d2))
    } else {
        None
    }
}

/// Ближайшая к `p` точка отрезка `ab`.
#[must_use]
pub fn closest_on_segment(p: Point, a: Point, b: Point) -> Point {
    let ab = b - a;
    let len2 = ab.dot(ab);
    if len2 <= f64::EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    a + ab * t
}

#[must_use]
pub fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    p.distance(closest_on_segment(p, a, b))
}

/// Ближайшие точки двух отрезков: `(расстояние, точка на ab, точка на cd)`.
#[must_use]
pub fn segment_closest_points(a: Point, b: Point, c: Point, d: Point) -> (f64, Point, Point) {
    if let Some(t) = segment_crossing(a, b, c, d) {
        let p = a.lerp(b, t);
        return (0.0, p, p);
    }
    let candidates = [
        (a, closest_on_segment(a, c, d)),
        (b, closest_on_segment(b, c, d)),
        (closest_on_segment(c, a, b), c),
        (closest_on_segment(d, a, b), d),
    ];
    candidates
        .into_iter()
        .map(|(p, q)| (p.distance(q), p, q))
        .fold((f64::INFINITY, a, c), |best, cand| {
            if cand.0 < best.0 { cand } else { best }
        })
}

/// Ориентированная площадь (формула шнурков).
#[must_use]
pub fn signed_area(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        sum += p.cross(q);
    }
    sum * 0.5
}

/// Центр масс полигона; для вырожденных — среднее вершин.
#[must_use]
pub fn centroid(points: &[Point]) -> Point {
    let area = signed_area(points);
    let n = points.len();
    if area.abs() <= f64::EPSILON {
        let sum = points.iter().fold(Point::default(), |acc, &p| acc + p);
        return sum * (1.0 / n.max(1) as f64);
    }
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        let f = p.cross(q);
        cx += (p.x + q.x) * f;
        cy += (p.y + q.y) * f;
    }
    Point::new(cx / (6.0 * area), cy / (6.0 * area))
}

/// Точка внутри полигона (чётно-нечётное правило).
#[must_use]
pub fn point_in_polygon(p: Point, polygon: &[Point]) -> bool {
    let n = polygon.len();
    let mut inside = false;
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[j];
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Простой полигон: не меньше трёх вершин и никакие несмежные стороны не пересекаются.
#[must_use]
pub fn is_simple_polygon(points: &[Point]) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            if adjacent {
                continue;
            }
            let c = points[j];
            let d = points[(j + 1) % n];
            if segment_crossing(a, b, c, d).is_some() {
                return false;
            }
            if point_segment_distance(c, a, b) <= ORIENT_EPS
                || point_segment_distance(a, c, d) <= ORIENT_EPS
            {
                return false;
            }
        }
    }
    true
}

/// Минимальное расстояние между контурами двух полигонов и точки, на которых оно достигается.
#[must_use]
pub fn ring_distance(a: &[Point], b: &[Point]) -> (f64, Point, Point) {
    let mut best = (f64::INFINITY, Point::default(), Point::default());
    for i in 0..a.len() {
        let (p, q) = (a[i], a[(i + 1) % a.len()]);
        for j in 0..b.len() {
            let (r, s) = (b[j], b[(j + 1) % b.len()]);
            let cand = segment_closest_points(p, q, r, s);
            if cand.0 < best.0 {
                best = cand;
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
        ]
    }

    #[test]
    fn shoelace_area_and_centroid() {
        let sq = square();
        assert!((signed_area(&sq) - 4.0).abs() < 1e-12);
        let rev: Vec<Point> = sq.iter().rev().copied().collect();
        assert!((signed_area(&rev) + 4.0).abs() < 1e-12);
        let c = centroid(&sq);
        assert!((c.x - 1.0).abs() < 1e-12 && (c.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn proper_crossing_only() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(2.0, 2.0);
        let t = segment_crossing(a, b, Point::new(0.0, 2.0), Point::new(2.0, 0.0)).unwrap();
        assert!((t - 0.5).abs() < 1e-12);
        // общий конец — не пересечение
        assert!(segment_crossing(a, b, b, Point::new(3.0, 0.0)).is_none());
        // касание концом внутренней точки — не собственное пересечение
        assert!(segment_crossing(a, b, Point::new(1.0, 1.0), Point::new(2.0, 0.0)).is_none());
    }

    #[test]
    fn bow_tie_is_not_simple() {
        let bow = vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(2.0, 0.0),
            Point::new(0.0, 2.0),
        ];
        assert!(!is_simple_polygon(&bow));
        assert!(is_simple_polygon(&square()));
    }

    #[test]
    fn point_location() {
        let sq = square();
        assert!(point_in_polygon(Point::new(1.0, 1.0), &sq));
        assert!(!point_in_polygon(Point::new(3.0, 1.0), &sq));
    }

    #[test]
    fn ring_distance_between_squares() {
        let a = square();
        let b: Vec<Point> = square().iter().map(|p| *p + Point::new(3.0, 0.5)).collect();
        let (d, pa, pb) = ring_distance(&a, &b);
        assert!((d - 1.0).abs() < 1e-12);
        assert!((pa.x - 2.0).abs() < 1e-12);
        assert!((pb.x - 3.0).abs() < 1e-12);
    }

    #[test]
    fn angles_wrap() {
        assert!((angle_between(0.1, TAU - 0.1) - 0.2).abs() < 1e-12);
        assert!((normalize_angle(-PI / 2.0) - 1.5 * PI).abs() < 1e-12);
    }
}
