use super::*;

#[test]
fn frame_index_next_saturates() {
    assert_eq!(FrameIndex(3).next(), FrameIndex(4));
    assert_eq!(FrameIndex(u64::MAX).next(), FrameIndex(u64::MAX));
}

#[test]
fn rgb_quantizes_with_clamping() {
    assert_eq!(Rgb(0.0, 0.5, 1.0).to_rgba8(), [0, 128, 255, 255]);
    assert_eq!(Rgb(-1.0, 2.0, f64::NAN).to_rgba8(), [0, 255, 0, 255]);
}

#[test]
fn rgb_lerp_hits_endpoints() {
    let a = Rgb(0.2, 0.4, 0.6);
    let b = Rgb::splat(1.0);
    assert_eq!(a.lerp(b, 0.0), a);
    assert_eq!(a.lerp(b, 1.0), b);
}

#[test]
fn rgb_serializes_as_array() {
    let s = serde_json::to_string(&Rgb(0.5, 0.8, 1.0)).unwrap();
    assert_eq!(s, "[0.5,0.8,1.0]");
    let back: Rgb = serde_json::from_str(&s).unwrap();
    assert_eq!(back, Rgb(0.5, 0.8, 1.0));
}
