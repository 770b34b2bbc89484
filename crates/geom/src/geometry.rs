//! Various low level geometrical operations. All of them work on the xz
//! plane, the y coordinate (height) is ignored.

use glam::Vec3;

/// Tolerance used by all "on the line" decisions of the signed area tests.
pub const TOLERANCE_STD: f32 = 0.0001;

/// Returns twice the signed area of triangle `a`, `b`, `c` projected onto the
/// xz plane.
///
/// The result is positive if `c` lies on the left side of the directed line
/// `a` -> `b`, negative if it lies on the right side and (close to) zero if
/// the three points are collinear.
pub fn signed_area_x2(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    (b.x - a.x) * (c.z - a.z) - (c.x - a.x) * (b.z - a.z)
}

/// Returns true if `point` is on the line `a` -> `b` or left of it (within
/// [`TOLERANCE_STD`]).
pub fn is_at_or_left(a: Vec3, b: Vec3, point: Vec3) -> bool {
    signed_area_x2(a, b, point) > -TOLERANCE_STD
}

/// Returns true if `point` is on the line `a` -> `b` or right of it (within
/// [`TOLERANCE_STD`]).
pub fn is_at_or_right(a: Vec3, b: Vec3, point: Vec3) -> bool {
    signed_area_x2(a, b, point) < TOLERANCE_STD
}

/// Returns true if the two points coincide on the xz plane.
pub fn xz_equal(a: Vec3, b: Vec3) -> bool {
    a.x == b.x && a.z == b.z
}

/// Squared distance of two points on the xz plane.
pub fn xz_distance_squared(a: Vec3, b: Vec3) -> f32 {
    let dx = b.x - a.x;
    let dz = b.z - a.z;
    dx * dx + dz * dz
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_signed_area() {
        let a = Vec3::new(0., 7., 0.);
        let b = Vec3::new(2., -1., 0.);
        let c = Vec3::new(0., 3., 2.);

        assert_abs_diff_eq!(signed_area_x2(a, b, c), 4.);
        assert_abs_diff_eq!(signed_area_x2(a, c, b), -4.);
        assert_abs_diff_eq!(signed_area_x2(a, b, Vec3::new(4., 0., 0.)), 0.);
    }

    #[test]
    fn test_half_planes() {
        let a = Vec3::ZERO;
        let b = Vec3::new(0., 0., 10.);

        assert!(is_at_or_left(a, b, Vec3::new(-1., 0., 5.)));
        assert!(!is_at_or_right(a, b, Vec3::new(-1., 0., 5.)));
        assert!(is_at_or_right(a, b, Vec3::new(1., 0., 5.)));
        assert!(!is_at_or_left(a, b, Vec3::new(1., 0., 5.)));

        // Points (almost) on the line belong to both half-planes.
        let on_line = Vec3::new(0.000_001, 3., 5.);
        assert!(is_at_or_left(a, b, on_line));
        assert!(is_at_or_right(a, b, on_line));
    }

    #[test]
    fn test_xz_helpers() {
        assert!(xz_equal(Vec3::new(1., 2., 3.), Vec3::new(1., -8., 3.)));
        assert!(!xz_equal(Vec3::new(1., 2., 3.), Vec3::new(1., 2., 3.1)));
        assert_abs_diff_eq!(
            xz_distance_squared(Vec3::new(1., 2., 3.), Vec3::new(4., 100., 7.)),
            25.
        );
    }
}
