//! Removal of negative bin contents.

use crate::histogram::Histogram;

/// Content assigned to a bin that was negative.
pub const NEGATIVE_BIN_FLOOR: f64 = 1e-7;

/// Histograms whose integral is below this value are unusable.
pub const MIN_USABLE_INTEGRAL: f64 = 1e-6;

/// Replace negative in-range bins by [`NEGATIVE_BIN_FLOOR`] and rescale to
/// the original integral.
///
/// The size of each correction is added in quadrature to the bin error.
/// Returns `false` when the histogram integral is below
/// [`MIN_USABLE_INTEGRAL`]; the histogram is then left untouched and the
/// caller must drop it.
pub fn repair_negative_bins(hist: &mut Histogram) -> bool {
    let original_integral = hist.integral();
    if !(original_integral >= MIN_USABLE_INTEGRAL) {
        log::debug!("integral of '{}' is too small: {original_integral}", hist.name);
        return false;
    }

    let mut has_fixed_bins = false;
    for bin in hist.in_range_bins() {
        let content = hist.content(bin);
        if content < 0.0 {
            has_fixed_bins = true;
            let correction = NEGATIVE_BIN_FLOOR - content;
            let new_error = (correction * correction + hist.sumw2(bin)).sqrt();
            hist.set_content(bin, NEGATIVE_BIN_FLOOR);
            hist.set_error(bin, new_error);
        }
    }

    if has_fixed_bins {
        let new_integral = hist.integral();
        hist.scale(original_integral / new_integral);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::Axis;
    use approx::assert_relative_eq;
    use bo_core::BinEdges;
    use proptest::prelude::*;

    fn hist(content: &[f64], sumw2: &[f64]) -> Histogram {
        let edges: Vec<f64> = (0..content.len() - 1).map(|i| i as f64).collect();
        let x = Axis::new(BinEdges::new(edges).unwrap());
        Histogram::from_parts("h", "", x, None, content.to_vec(), sumw2.to_vec()).unwrap()
    }

    #[test]
    fn test_small_integral_is_unusable() {
        let mut h = hist(&[0.0, 1e-7, -1e-7, 0.0], &[0.0; 4]);
        assert!(!repair_negative_bins(&mut h));
        assert_eq!(h.content(2), -1e-7);

        let mut h = hist(&[0.0, 5.0, -6.0, 0.0], &[0.0; 4]);
        assert!(!repair_negative_bins(&mut h));
    }

    #[test]
    fn test_no_negative_bins_is_noop() {
        let mut h = hist(&[1.0, 2.0, 3.0, 4.0], &[1.0, 2.0, 3.0, 4.0]);
        let before = h.clone();
        assert!(repair_negative_bins(&mut h));
        assert_eq!(h, before);
    }

    #[test]
    fn test_negative_bin_is_floored_and_rescaled() {
        let mut h = hist(&[0.0, 4.0, -1.0, 2.0, 0.0], &[0.0, 4.0, 0.25, 2.0, 0.0]);
        assert!(repair_negative_bins(&mut h));
        let pre_scale = 4.0 + NEGATIVE_BIN_FLOOR + 2.0;
        let factor = 5.0 / pre_scale;
        assert_relative_eq!(h.integral(), 5.0, epsilon = 1e-12);
        assert_relative_eq!(h.content(2), NEGATIVE_BIN_FLOOR * factor, epsilon = 1e-18);
        let corrected_err = ((NEGATIVE_BIN_FLOOR + 1.0).powi(2) + 0.25).sqrt();
        assert_relative_eq!(h.error(2), corrected_err * factor, epsilon = 1e-12);
        assert_relative_eq!(h.content(1), 4.0 * factor, epsilon = 1e-12);
    }

    #[test]
    fn test_flow_bins_are_scaled_but_not_floored() {
        let mut h = hist(&[-3.0, 4.0, -1.0, 2.0], &[0.0; 4]);
        assert!(repair_negative_bins(&mut h));
        assert!(h.content(0) < 0.0);
        assert!(h.content(2) > 0.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

        #[test]
        fn prop_repair_preserves_normalization(
            inner in prop::collection::vec(-2.0f64..10.0, 1..12),
            flows in (-1.0f64..1.0, -1.0f64..1.0),
        ) {
            let mut content = vec![flows.0];
            content.extend(inner.iter().copied());
            content.push(flows.1);
            let sumw2: Vec<f64> = content.iter().map(|c| c.abs()).collect();
            let mut h = hist(&content, &sumw2);
            let before = h.integral();
            let usable = repair_negative_bins(&mut h);
            prop_assert_eq!(usable, before >= MIN_USABLE_INTEGRAL);
            if usable {
                assert_relative_eq!(h.integral(), before, max_relative = 1e-9);
                for bin in h.in_range_bins() {
                    prop_assert!(h.content(bin) >= 0.0);
                }
            }
        }
    }
}
