/// Lower and upper volume thresholds of the overlap switching function.
///
/// Overlaps whose raw volume is below `min_a` are discarded, overlaps above `min_b` enter
/// with full weight, and the ones in between are faded in by a quintic Hermite ramp that is
/// continuous together with its first derivative at both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeCutoffs {
    pub min_a: f64,
    pub min_b: f64,
}

/// Default cutoffs for atomic overlaps, in Å³.
pub const VOLMINA: f64 = 0.01;
pub const VOLMINB: f64 = 0.1;

/// Default cutoffs applied to the free volume of solvent-probe particles, in Å³.
pub const VOLMINMSA: f64 = 0.05;
pub const VOLMINMSB: f64 = 0.5;

impl Default for VolumeCutoffs {
    fn default() -> Self {
        Self {
            min_a: VOLMINA,
            min_b: VOLMINB,
        }
    }
}

impl VolumeCutoffs {
    pub fn new(min_a: f64, min_b: f64) -> Self {
        Self { min_a, min_b }
    }

    /// Cutoffs for the free volumes of derived solvent-probe particles.
    pub fn probe() -> Self {
        Self {
            min_a: VOLMINMSA,
            min_b: VOLMINMSB,
        }
    }

    /// Returns the switching factor `s(v)` and its derivative `s'(v)`.
    #[inline]
    pub fn switch(&self, volume: f64) -> (f64, f64) {
        switching_function(volume, self.min_a, self.min_b)
    }

    /// Whether an overlap of this raw volume is fully weighted.
    #[inline]
    pub fn is_above_switch(&self, volume: f64) -> bool {
        volume > self.min_b
    }

    /// Whether an overlap of this raw volume is kept in the tree at all.
    #[inline]
    pub fn is_retained(&self, volume: f64) -> bool {
        volume > self.min_a
    }
}

#[inline]
pub fn switching_function(volume: f64, min_a: f64, min_b: f64) -> (f64, f64) {
    if volume >= min_b {
        return (1.0, 0.0);
    }
    if volume <= min_a {
        return (0.0, 0.0);
    }
    let inv_width = 1.0 / (min_b - min_a);
    let u = (volume - min_a) * inv_width;
    let u2 = u * u;
    let u3 = u * u2;
    let s = u3 * (10.0 - 15.0 * u + 6.0 * u2);
    let sp = inv_width * 30.0 * u2 * (1.0 - 2.0 * u + u2);
    (s, sp)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    #[test]
    fn switch_is_zero_below_lower_cutoff() {
        let cutoffs = VolumeCutoffs::default();
        assert_eq!(cutoffs.switch(0.001), (0.0, 0.0));
        assert_eq!(cutoffs.switch(VOLMINA), (0.0, 0.0));
    }

    #[test]
    fn switch_is_one_above_upper_cutoff() {
        let cutoffs = VolumeCutoffs::default();
        assert_eq!(cutoffs.switch(1.0), (1.0, 0.0));
        assert_eq!(cutoffs.switch(VOLMINB), (1.0, 0.0));
    }

    #[test]
    fn switch_is_one_half_at_midpoint() {
        let cutoffs = VolumeCutoffs::new(1.0, 3.0);
        let (s, sp) = cutoffs.switch(2.0);
        assert!(f64_approx_equal(s, 0.5));
        assert!(f64_approx_equal(sp, 30.0 * 0.0625 / 2.0));
    }

    #[test]
    fn switch_and_its_derivative_are_continuous_at_both_ends() {
        let cutoffs = VolumeCutoffs::default();
        let eps = 1e-9;
        let (s_lo, sp_lo) = cutoffs.switch(VOLMINA + eps);
        let (s_hi, sp_hi) = cutoffs.switch(VOLMINB - eps);
        assert!(s_lo.abs() < 1e-12);
        assert!(sp_lo.abs() < 1e-6);
        assert!((s_hi - 1.0).abs() < 1e-12);
        assert!(sp_hi.abs() < 1e-6);
    }

    #[test]
    fn switched_volume_is_smooth_across_the_switch_region() {
        let cutoffs = VolumeCutoffs::default();
        let n = 2000;
        let v_max = 0.2;
        let dv = v_max / n as f64;
        let mut previous: Option<(f64, f64)> = None;
        for k in 0..=n {
            let v = k as f64 * dv;
            let (s, sp) = cutoffs.switch(v);
            let w = s * v;
            let dw = sp * v + s;
            if let Some((w_prev, dw_prev)) = previous {
                assert!((w - w_prev).abs() <= dw.max(dw_prev).abs() * dv + 1e-6);
                assert!((dw - dw_prev).abs() < 0.05, "derivative jump at v = {v}");
            }
            previous = Some((w, dw));
        }
    }

    #[test]
    fn derivative_matches_finite_difference_inside_switch_region() {
        let cutoffs = VolumeCutoffs::default();
        let h = 1e-7;
        for &v in &[0.02, 0.035, 0.05, 0.08, 0.095] {
            let (_, sp) = cutoffs.switch(v);
            let (s_plus, _) = cutoffs.switch(v + h);
            let (s_minus, _) = cutoffs.switch(v - h);
            let numerical = (s_plus - s_minus) / (2.0 * h);
            assert!((sp - numerical).abs() < 1e-4, "v = {v}: {sp} vs {numerical}");
        }
    }

    #[test]
    fn retention_and_full_weight_predicates_follow_the_cutoffs() {
        let cutoffs = VolumeCutoffs::default();
        assert!(!cutoffs.is_retained(0.005));
        assert!(cutoffs.is_retained(0.05));
        assert!(!cutoffs.is_above_switch(0.05));
        assert!(cutoffs.is_above_switch(0.5));
    }
}
