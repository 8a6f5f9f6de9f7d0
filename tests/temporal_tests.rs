//! Integration tests for temporal accumulation.

use lbvh_render::temporal::TemporalAccumulator;
use lbvh_render::util::Vec4;
use lbvh_render::HdrImage;

#[test]
fn test_converges_geometrically() {
    let alpha = 0.1f32;
    let mut acc = TemporalAccumulator::new(4, 4, alpha, false).expect("accumulator");
    acc.accumulate(&HdrImage::filled(4, 4, Vec4::ZERO), false).expect("first");

    let target = HdrImage::filled(4, 4, Vec4::new(2.0, 1.0, 0.5, 1.0));
    for k in 1..=60 {
        let out = acc.accumulate(&target, false).expect("frame");
        let expected_gap = (1.0 - alpha).powi(k) * 2.0;
        let gap = 2.0 - out.get(1, 2).x;
        assert!((gap - expected_gap).abs() < 1e-4, "k={k}: gap {gap} vs {expected_gap}");
    }
    let out = acc.output();
    assert!((out.get(3, 3) - target.get(3, 3)).abs().max_element() < 0.01);
}

#[test]
fn test_reset_snaps_exactly() {
    let mut acc = TemporalAccumulator::new(3, 2, 0.05, false).expect("accumulator");
    for v in [5.0f32, -1.0, 100.0, 0.3] {
        acc.accumulate(&HdrImage::filled(3, 2, Vec4::splat(v)), false).expect("frame");
    }
    let mut current = HdrImage::new(3, 2);
    current.set(2, 1, Vec4::new(0.123, 4.56, 7.89, 1.0));
    let out = acc.accumulate(&current, true).expect("reset frame");
    assert_eq!(out, &current);
    assert_eq!(acc.frames_since_reset(), 1);
}

#[test]
fn test_history_is_previous_output() {
    let mut acc = TemporalAccumulator::new(1, 1, 0.5, false).expect("accumulator");
    acc.accumulate(&HdrImage::filled(1, 1, Vec4::splat(8.0)), false).expect("frame");
    let first = acc.output().clone();
    acc.accumulate(&HdrImage::filled(1, 1, Vec4::ZERO), false).expect("frame");
    assert_eq!(acc.history(), &first);
    assert_eq!(acc.output().get(0, 0), Vec4::splat(4.0));
}

#[test]
fn test_manual_reset() {
    let mut acc = TemporalAccumulator::new(2, 2, 0.1, false).expect("accumulator");
    acc.accumulate(&HdrImage::filled(2, 2, Vec4::ONE), false).expect("frame");
    acc.reset();
    let next = HdrImage::filled(2, 2, Vec4::splat(9.0));
    assert_eq!(acc.accumulate(&next, false).expect("frame"), &next);
}
