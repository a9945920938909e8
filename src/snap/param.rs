//! Parametric interpolation along model entities.
//!
//! Periodic parametric axes are discontinuous somewhere in their range.
//! If the difference between two endpoint parameters exceeds half the
//! periodic range, the interval is assumed to cross the discontinuity and
//! the blend runs the short way around.

use crate::mesh::{EntityId, Mesh, ModelEntity};

/// Interpolate a scalar parametric coordinate at `t` between `a` and `b`.
///
/// Non-periodic axes blend linearly. Periodic axes normalize `a <= b`
/// (complementing `t` on swap); an interval spanning at least half the
/// period wraps through the seam, and the result is folded back into the
/// range. Endpoints are preserved modulo the period: `t = 0` yields `a`
/// and `t = 1` yields `b`, wrapped or not.
pub fn interpolate_parametric_coordinate(
    t: f64,
    a: f64,
    b: f64,
    range: [f64; 2],
    periodic: bool,
) -> f64 {
    if !periodic {
        return (1.0 - t) * a + t * b;
    }
    let (lo, hi) = if range[0] > range[1] {
        (range[1], range[0])
    } else {
        (range[0], range[1])
    };
    let (a, b, t) = if a > b { (b, a, 1.0 - t) } else { (a, b, t) };
    let period = hi - lo;
    let span = b - a;
    if span < period / 2.0 {
        return (1.0 - t) * a + t * b;
    }
    let a = a + period;
    let mut result = (1.0 - t) * a + t * b;
    if result > hi {
        result -= period;
    }
    debug_assert!(result > lo && result < hi);
    result
}

/// Run the scalar rule on each parametric axis of `class`.
pub fn interpolate_parametric_coordinates<M: Mesh>(
    m: &M,
    class: ModelEntity,
    t: f64,
    a: [f64; 3],
    b: [f64; 3],
) -> [f64; 3] {
    let mut p = [0.0; 3];
    for d in 0..class.dim {
        let (range, periodic) = m.periodic_range(class, d);
        p[d] = interpolate_parametric_coordinate(t, a[d], b[d], range, periodic);
    }
    p
}

/// Parametric coordinate of the point at `t` along a mesh edge, for use
/// when the edge is split.
///
/// Returns `None` when the edge is classified on a model entity of mesh
/// dimension (interior edges carry no meaningful parameter).
pub fn transfer_parametric_on_edge_split<M: Mesh>(
    m: &M,
    edge: EntityId,
    t: f64,
) -> Option<[f64; 3]> {
    let class = m.classification(edge);
    if class.dim == m.dimension() {
        return None;
    }
    let ev = m.downward(edge, 0);
    debug_assert_eq!(ev.len(), 2);
    let a = m.param_on(class, ev[0]);
    let b = m.param_on(class, ev[1]);
    Some(interpolate_parametric_coordinates(m, class, t, a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f64::consts::PI;

    const TWO_PI: f64 = 2.0 * PI;

    #[test]
    fn non_periodic_midpoint() {
        let r = interpolate_parametric_coordinate(0.5, 0.2, 0.8, [0.0, 1.0], false);
        assert!((r - 0.5).abs() < 1e-12);
    }

    #[test]
    fn periodic_midpoint_wraps_through_seam() {
        // Endpoints hug the seam from both sides; the midpoint must land
        // near the seam, not near pi.
        let r =
            interpolate_parametric_coordinate(0.5, 0.1, TWO_PI - 0.2, [0.0, TWO_PI], true);
        let seam_dist = r.min(TWO_PI - r);
        assert!(seam_dist < 0.2, "midpoint {r} did not wrap");
        assert!((r - PI).abs() > 1.0);
    }

    #[test]
    fn periodic_short_interval_stays_linear() {
        let r = interpolate_parametric_coordinate(0.5, 1.0, 2.0, [0.0, TWO_PI], true);
        assert!((r - 1.5).abs() < 1e-12);
    }

    #[test]
    fn wrap_endpoints_return_inputs() {
        let (a, b) = (0.1, TWO_PI - 0.2);
        let range = [0.0, TWO_PI];
        let r0 = interpolate_parametric_coordinate(0.0, a, b, range, true);
        let r1 = interpolate_parametric_coordinate(1.0, a, b, range, true);
        assert!((r0 - a).abs() < 1e-12);
        assert!((r1 - b).abs() < 1e-12);
    }

    #[test]
    fn reversed_endpoints_match() {
        let range = [0.0, TWO_PI];
        let fwd = interpolate_parametric_coordinate(0.3, 0.1, TWO_PI - 0.2, range, true);
        let rev = interpolate_parametric_coordinate(0.7, TWO_PI - 0.2, 0.1, range, true);
        assert!((fwd - rev).abs() < 1e-12);
    }

    #[test]
    fn reversed_range_is_normalized() {
        // Short interval: stays in the linear branch after the range is
        // put in order.
        let r = interpolate_parametric_coordinate(0.5, 0.2, 0.6, [1.0, 0.0], true);
        assert!((r - 0.4).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn periodic_result_stays_in_range(
            lo in -3.0f64..0.0,
            width in 1.0f64..7.0,
            fa in 0.01f64..0.99,
            fb in 0.01f64..0.99,
            t in 0.0f64..1.0,
        ) {
            let hi = lo + width;
            let a = lo + fa * width;
            let b = lo + fb * width;
            // Stay away from the exact half-period knife edge, where the
            // result legitimately lands on the seam.
            prop_assume!(((b - a).abs() - width / 2.0).abs() > 1e-6);
            let r = interpolate_parametric_coordinate(t, a, b, [lo, hi], true);
            prop_assert!(r > lo && r < hi, "result {r} outside ({lo}, {hi})");
        }
    }
}
