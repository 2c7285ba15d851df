use approx::assert_relative_eq;
use tld::{GrayImage, OutputSource, Rect, Tld, TldConfig, TldError, TrackingState};

const SIDE: usize = 200;

fn bright_square(rect: Rect) -> GrayImage {
    let mut img = GrayImage::new(SIDE, SIDE, 40);
    for y in rect.y..rect.bottom() {
        for x in rect.x..rect.right() {
            img.set(x as usize, y as usize, 220);
        }
    }
    img
}

fn textured(rect: Rect) -> GrayImage {
    let mut img = GrayImage::new(SIDE, SIDE, 0);
    for y in 0..SIDE as i32 {
        for x in 0..SIDE as i32 {
            let inside = x >= rect.x && x < rect.right() && y >= rect.y && y < rect.bottom();
            let v = if inside {
                let (u, v) = (x - rect.x, y - rect.y);
                if (u / 6 + v / 6) % 2 == 0 {
                    225
                } else {
                    70 + 2 * u as u8
                }
            } else {
                (30 + (x * 5 + y * 3) % 25) as u8
            };
            img.set(x as usize, y as usize, v);
        }
    }
    img
}

fn selected(img: &GrayImage, rect: Rect) -> Tld {
    let mut tld = Tld::new(SIDE, SIDE, TldConfig::default()).expect("tld");
    tld.select_object(&img.view(), rect).expect("select");
    tld
}

#[test]
fn same_frame_keeps_the_selected_square() {
    let rect = Rect::new(50, 50, 40, 40);
    let img = bright_square(rect);
    let mut tld = selected(&img, rect);
    assert_eq!(tld.state(), TrackingState::Tracking);

    let r = tld.process_frame(&img.view()).expect("frame");
    let bbox = r.bbox.expect("box");
    assert!(bbox.overlap(&rect) >= 0.9, "{bbox:?}");
    assert!(r.confidence >= tld.config().detector.nn.theta_p);
    // textured background never correlates with a flat object
    assert_relative_eq!(r.confidence, 1.0, epsilon = 1e-6);
    assert_eq!(r.state, TrackingState::Tracking);
    assert_eq!(r.stats.source, OutputSource::Tracker);
    assert_eq!(r.stats.frame_index, 0);
}

#[test]
fn vanished_object_is_lost_without_error() {
    let rect = Rect::new(50, 50, 40, 40);
    let mut tld = selected(&bright_square(rect), rect);

    let empty = GrayImage::new(SIDE, SIDE, 40);
    let r = tld.process_frame(&empty.view()).expect("frame");
    assert_eq!(r.bbox, None);
    assert_eq!(r.confidence, 0.0);
    assert_eq!(r.state, TrackingState::Lost);
    assert_eq!(tld.state(), TrackingState::Lost);
    assert_eq!(r.stats.cascade.variance_rejected, r.stats.cascade.windows);

    // still lost on the next empty frame, and the tracker is not consulted
    let r = tld.process_frame(&empty.view()).expect("frame");
    assert_eq!(r.bbox, None);
    assert!(r.stats.flow.is_none());
}

#[test]
fn lost_object_is_reacquired_by_the_detector() {
    // on the scan grid, so one window matches the selection exactly
    let rect = Rect::new(41, 61, 48, 48);
    let img = textured(rect);
    let mut tld = selected(&img, rect);

    let blank = GrayImage::new(SIDE, SIDE, 40);
    let r = tld.process_frame(&blank.view()).expect("frame");
    assert_eq!(r.state, TrackingState::Lost);

    let r = tld.process_frame(&img.view()).expect("frame");
    assert_eq!(r.state, TrackingState::Tracking);
    assert_eq!(r.stats.source, OutputSource::Detector);
    assert!(r.stats.flow.is_none());
    let bbox = r.bbox.expect("box");
    assert!(bbox.overlap(&rect) >= 0.7, "{bbox:?}");
    assert!(r.confidence >= tld.config().detector.nn.theta_p);
    assert!(!r.learned);

    // the tracker picks the object up again from the reacquired box
    let r = tld.process_frame(&img.view()).expect("frame");
    assert_eq!(r.state, TrackingState::Tracking);
    assert!(r.stats.flow.is_some());
    assert!(r.bbox.expect("box").overlap(&rect) >= 0.7);
}

#[test]
fn clear_returns_to_uninitialized_and_never_reports_a_stale_box() {
    let rect = Rect::new(50, 50, 40, 40);
    let img = bright_square(rect);
    let mut tld = selected(&img, rect);
    tld.process_frame(&img.view()).expect("frame");
    tld.process_frame(&img.view()).expect("frame");

    tld.clear();
    assert_eq!(tld.state(), TrackingState::Uninitialized);
    assert_eq!(tld.current_box(), None);
    assert!(tld.detector().is_none());

    let r = tld.process_frame(&img.view()).expect("frame");
    assert_eq!(r.bbox, None);
    assert_eq!(r.state, TrackingState::Uninitialized);
    assert!(!r.learned);
    assert!(matches!(tld.export_model(), Err(TldError::NotInitialized)));

    // a new selection works after clearing
    tld.select_object(&img.view(), rect).expect("reselect");
    assert!(tld.process_frame(&img.view()).expect("frame").bbox.is_some());
}

#[test]
fn unselected_tracker_reports_nothing() {
    let mut tld = Tld::new(SIDE, SIDE, TldConfig::default()).expect("tld");
    let r = tld
        .process_frame(&bright_square(Rect::new(10, 10, 30, 30)).view())
        .expect("frame");
    assert_eq!(r.bbox, None);
    assert_eq!(r.state, TrackingState::Uninitialized);
}

#[test]
fn malformed_inputs_are_errors() {
    let rect = Rect::new(50, 50, 40, 40);
    let img = bright_square(rect);
    let mut tld = Tld::new(SIDE, SIDE, TldConfig::default()).expect("tld");

    for bad in [
        Rect::new(180, 50, 40, 40),
        Rect::new(-1, 0, 10, 10),
        Rect::new(10, 10, 0, 10),
    ] {
        assert!(matches!(
            tld.select_object(&img.view(), bad),
            Err(TldError::InvalidRegion { .. })
        ));
    }

    let small = GrayImage::new(100, 100, 0);
    assert!(matches!(
        tld.select_object(&small.view(), Rect::new(10, 10, 20, 20)),
        Err(TldError::DimensionMismatch { .. })
    ));

    tld.select_object(&img.view(), rect).expect("select");
    assert!(matches!(
        tld.process_frame(&small.view()),
        Err(TldError::DimensionMismatch {
            expected: (200, 200),
            got: (100, 100)
        })
    ));
    // the failed call left the tracker untouched
    assert_eq!(tld.state(), TrackingState::Tracking);
    assert_eq!(tld.current_box(), Some(rect));
}

#[test]
fn slowly_moving_object_is_followed() {
    let start = Rect::new(40, 60, 48, 48);
    let mut tld = selected(&textured(start), start);
    for step in 1..=6 {
        let truth = Rect::new(start.x + 2 * step, start.y + step, 48, 48);
        let r = tld.process_frame(&textured(truth).view()).expect("frame");
        let bbox = r.bbox.expect("box");
        assert!(bbox.overlap(&truth) >= 0.7, "step {step}: {bbox:?} vs {truth:?}");
    }
}

#[test]
fn disabled_learning_leaves_the_model_untouched() {
    let rect = Rect::new(40, 60, 48, 48);
    let img = textured(rect);
    let mut tld = selected(&img, rect);
    tld.set_learning_enabled(false);
    let before = tld.export_model().expect("export");

    for step in 0..3 {
        let moved = Rect::new(rect.x + step, rect.y, 48, 48);
        let r = tld.process_frame(&textured(moved).view()).expect("frame");
        assert!(!r.learned);
    }
    assert_eq!(tld.export_model().expect("export"), before);
}

#[test]
fn alternating_mode_never_learns_on_consecutive_valid_frames() {
    let rect = Rect::new(40, 60, 48, 48);
    let mut tld = selected(&textured(rect), rect);
    tld.set_alternating(true);

    let mut previous_learned = false;
    for step in 0..8 {
        let moved = Rect::new(rect.x + step, rect.y + step % 3, 48, 48);
        let r = tld.process_frame(&textured(moved).view()).expect("frame");
        if r.bbox.is_some() && r.stats.source == OutputSource::Tracker {
            assert!(!(previous_learned && r.learned), "step {step}");
            previous_learned = r.learned;
        }
    }
}

#[test]
fn exported_model_detects_like_the_original() {
    let rect = Rect::new(40, 60, 48, 48);
    let img = textured(rect);
    let mut tld = selected(&img, rect);
    for step in 1..=3 {
        let moved = Rect::new(rect.x + step, rect.y, 48, 48);
        tld.process_frame(&textured(moved).view()).expect("frame");
    }

    let bytes = tld.export_model().expect("export");
    let restored = Tld::import_model(&bytes).expect("import");
    assert_eq!(restored.state(), TrackingState::Lost);
    assert_eq!(restored.frame_size(), tld.frame_size());
    assert_eq!(restored.config(), tld.config());
    assert_eq!(restored.export_model().expect("re-export"), bytes);

    let sample = textured(Rect::new(60, 70, 48, 48));
    let a = tld.detector().expect("detector").detect(&sample.view());
    let b = restored.detector().expect("detector").detect(&sample.view());
    assert_eq!(a.verdicts, b.verdicts);
    assert_eq!(a.posteriors, b.posteriors);
    assert_eq!(a.clusters, b.clusters);

    // two imports of the same model behave identically frame by frame
    let mut x = Tld::import_model(&bytes).expect("import");
    let mut y = Tld::import_model(&bytes).expect("import");
    for step in 0..3 {
        let frame = textured(Rect::new(60 + step, 70, 48, 48));
        assert_eq!(
            x.process_frame(&frame.view()).expect("frame"),
            y.process_frame(&frame.view()).expect("frame")
        );
    }
}

#[test]
fn corrupt_models_are_rejected() {
    assert!(matches!(
        Tld::import_model(b"{\"format\":\"tld-model\"}"),
        Err(TldError::ModelCorrupt(_))
    ));
    assert!(matches!(
        Tld::import_model(&[0xff, 0x00, 0x13]),
        Err(TldError::ModelCorrupt(_))
    ));
}
