//! Representative Point Service
//!
//! Pure domain logic for summarizing several matched coordinates as one.
//!
//! The representative point of a point set is the input point nearest to the
//! set's centroid. Unlike the centroid itself it always lies on the convex
//! hull or inside it, also for rings and other non-convex layouts, and it is
//! always a real location from the dataset.

use crate::domain::entities::GeoPoint;
use geo::{Centroid, MultiPoint, Point};
use std::cmp::Ordering;

/// Aggregator for ambiguous multi-row matches.
pub struct RepresentativePoint;

impl RepresentativePoint {
    /// Compute the representative point of `points`.
    ///
    /// One point is returned unchanged; an empty slice has no representative.
    /// The result depends only on the multiset of inputs: points are sorted
    /// before the centroid is taken, and equidistant candidates resolve to
    /// the smallest `(lat, lon)`. Identical or collinear inputs are handled
    /// by the same rule.
    pub fn aggregate(points: &[GeoPoint]) -> Option<GeoPoint> {
        match points {
            [] => None,
            [only] => Some(*only),
            _ => {
                let mut sorted = points.to_vec();
                sorted.sort_by(Self::cmp_points);

                // geo works in (x, y) = (lon, lat)
                let multi: MultiPoint<f64> =
                    sorted.iter().map(|p| Point::new(p.lon, p.lat)).collect();
                let centroid = multi.centroid()?;

                let mut best: Option<(GeoPoint, f64)> = None;
                for candidate in &sorted {
                    let dx = candidate.lon - centroid.x();
                    let dy = candidate.lat - centroid.y();
                    let dist = dx * dx + dy * dy;
                    match best {
                        Some((_, best_dist)) if dist >= best_dist => {}
                        _ => best = Some((*candidate, dist)),
                    }
                }

                best.map(|(p, _)| p)
            }
        }
    }

    fn cmp_points(a: &GeoPoint, b: &GeoPoint) -> Ordering {
        a.lat.total_cmp(&b.lat).then(a.lon.total_cmp(&b.lon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon)
    }

    fn on_segment(q: GeoPoint, a: GeoPoint, b: GeoPoint) -> bool {
        let cross = (b.lat - a.lat) * (q.lon - a.lon) - (b.lon - a.lon) * (q.lat - a.lat);
        let within_lat = q.lat >= a.lat.min(b.lat) && q.lat <= a.lat.max(b.lat);
        let within_lon = q.lon >= a.lon.min(b.lon) && q.lon <= a.lon.max(b.lon);
        cross.abs() < 1e-9 && within_lat && within_lon
    }

    // ===== Degenerate Inputs =====

    #[test]
    fn test_empty_has_no_representative() {
        assert_eq!(RepresentativePoint::aggregate(&[]), None);
    }

    #[test]
    fn test_single_point_unchanged() {
        let only = p(25.66667, -100.31667);
        assert_eq!(RepresentativePoint::aggregate(&[only]), Some(only));
    }

    #[test]
    fn test_identical_points() {
        let same = p(40.4165, -3.7026);
        assert_eq!(
            RepresentativePoint::aggregate(&[same, same, same]),
            Some(same)
        );
    }

    #[test]
    fn test_collinear_points_lie_on_segment() {
        let a = p(0.0, 0.0);
        let b = p(1.0, 1.0);
        let c = p(4.0, 4.0);
        let rep = RepresentativePoint::aggregate(&[a, b, c]).unwrap();
        assert!(on_segment(rep, a, c));
    }

    // ===== Hull Containment =====

    #[test]
    fn test_square_within_bounds() {
        let square = [p(0.0, 0.0), p(0.0, 2.0), p(2.0, 2.0), p(2.0, 0.0)];
        let rep = RepresentativePoint::aggregate(&square).unwrap();
        assert!((0.0..=2.0).contains(&rep.lat));
        assert!((0.0..=2.0).contains(&rep.lon));
    }

    #[test]
    fn test_ring_stays_on_ring() {
        // A naive average of a ring falls in the empty middle.
        let ring: Vec<GeoPoint> = (0..12)
            .map(|i| {
                let angle = i as f64 * std::f64::consts::PI / 6.0;
                p(10.0 * angle.sin(), 10.0 * angle.cos())
            })
            .collect();
        let rep = RepresentativePoint::aggregate(&ring).unwrap();
        assert!(ring.contains(&rep));
    }

    // ===== Determinism =====

    #[test]
    fn test_order_independent() {
        let a = [p(0.0, 0.0), p(0.0, 2.0), p(2.0, 2.0), p(2.0, 0.0)];
        let b = [p(2.0, 0.0), p(2.0, 2.0), p(0.0, 0.0), p(0.0, 2.0)];
        assert_eq!(
            RepresentativePoint::aggregate(&a),
            RepresentativePoint::aggregate(&b)
        );
        // Equidistant corners resolve to the smallest (lat, lon).
        assert_eq!(RepresentativePoint::aggregate(&a), Some(p(0.0, 0.0)));
    }

    #[test]
    fn test_reference_fixture() {
        // Monterrey, Mexico City, Guadalajara
        let points = [
            p(25.66667, -100.31667),
            p(19.43, -99.13),
            p(20.67, -103.35),
        ];
        assert_eq!(
            RepresentativePoint::aggregate(&points),
            Some(p(20.67, -103.35))
        );
    }
}
