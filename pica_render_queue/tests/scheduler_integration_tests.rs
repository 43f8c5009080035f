//! Integration tests for the render queue on the mock device
//!
//! These tests drive whole frame loops through the public API with timed
//! completions and check the queue invariants along the way.
//!
//! Run with: cargo test --test scheduler_integration_tests


use mock_test_utils::{assert_invariants, create_scheduler, create_screen_targets, draw_frame};
use pica_render_queue::pica::gpu::{
    ColorFormat, DepthFormat, GpuDevice, GpuOp, HardwareEvent, MemoryKind, Screen, Side,
    TransferFlags,
};
use pica_render_queue::pica::{ClearBits, FrameFlags, TargetState};

// ============================================================================
// FRAME LOOP TESTS
// ============================================================================

#[test]
fn test_integration_steady_frame_loop() {
    let mut s = create_scheduler(0, 0, 0);
    let targets = create_screen_targets(&mut s);

    for _ in 0..120 {
        assert!(draw_frame(&mut s, FrameFlags::empty(), &[targets.top, targets.bottom]));
        s.frame_sync();
    }
    s.wait_idle();

    let stats = s.stats();
    assert_eq!(stats.frames_submitted, 120);
    assert_eq!(stats.frames_rendered, 120);
    assert!(stats.transfers >= 2 * 119, "only {} transfers", stats.transfers);
    // Every transfer is followed by a clear, plus the initial clears
    assert_eq!(stats.clears, stats.transfers + 2);
    assert_eq!(s.frame_counter(Screen::Top), 120);
    assert!(s.command_buffer_usage() > 0.0);
}

#[test]
fn test_integration_invariants_under_load() {
    let mut s = create_scheduler(2, 1, 1);
    s.gpu_mut().set_3d(true);
    let targets = create_screen_targets(&mut s);
    let right = s.create_target(240, 400, ColorFormat::Rgba8, None).unwrap();
    s.set_clear(right, ClearBits::COLOR, 0, 0).unwrap();

    for i in 0..400u32 {
        // Right eye only on some frames so the stereo copy gets exercised
        match i % 5 {
            0 => s.set_output(right, Screen::Top, Side::Right, TransferFlags::default()).unwrap(),
            3 => s.detach_output(right).unwrap(),
            _ => {}
        }
        let keys = if i % 3 == 0 {
            vec![targets.top, right, targets.bottom]
        } else {
            vec![targets.top, targets.bottom]
        };
        draw_frame(&mut s, FrameFlags::NONBLOCK, &keys);
        assert_invariants(&s);

        s.wait_for_event();
        assert_invariants(&s);
    }

    s.wait_idle();
    assert!(s.stats().frames_rendered > 0);
    let left_color = s.target(targets.top).unwrap().frame_buffer().color;
    let right_eye = s.gpu_mut().framebuffer(Screen::Top, Side::Right);
    let stereo_copies = s
        .gpu()
        .display_transfers()
        .iter()
        .filter(|t| Some(t.src) == left_color && t.dst == right_eye)
        .count();
    assert!(stereo_copies > 0);

    let gpu = s.shutdown();
    assert_eq!(gpu.live_allocations(), 0);
}

#[test]
fn test_integration_syncdraw_keeps_one_frame_in_flight() {
    let mut s = create_scheduler(3, 0, 0);
    let targets = create_screen_targets(&mut s);

    for _ in 0..20 {
        assert!(draw_frame(&mut s, FrameFlags::SYNCDRAW, &[targets.top]));
        assert!(s.queued_frames() <= 1);
    }
    s.wait_idle();
    assert_eq!(s.stats().frames_rendered, 20);
}

// ============================================================================
// TARGET LIFECYCLE TESTS
// ============================================================================

#[test]
fn test_integration_delete_while_in_flight() {
    let mut s = create_scheduler(4, 2, 2);
    let targets = create_screen_targets(&mut s);
    let offscreen = s.create_target(128, 128, ColorFormat::Rgba8, Some(DepthFormat::Depth16)).unwrap();

    draw_frame(&mut s, FrameFlags::empty(), &[offscreen, targets.top]);
    draw_frame(&mut s, FrameFlags::empty(), &[offscreen]);
    assert_eq!(s.queued_frames(), 2);

    s.delete_target(offscreen).unwrap();
    assert!(s.target(offscreen).is_err());
    assert!(s.gpu().delivered_events().contains(&HardwareEvent::RenderDone));

    s.delete_target(targets.top).unwrap();
    s.delete_target(targets.bottom).unwrap();
    assert_eq!(s.target_count(), 0);
    assert_eq!(s.gpu().used(MemoryKind::Vram), 0);
    assert!(s.registry().validate().is_ok());
}

#[test]
fn test_integration_targets_return_to_drawable() {
    let mut s = create_scheduler(1, 1, 1);
    let targets = create_screen_targets(&mut s);

    draw_frame(&mut s, FrameFlags::empty(), &[targets.top, targets.bottom]);
    while s.stats().clears < 4 {
        s.wait_for_event();
    }

    for key in [targets.top, targets.bottom] {
        assert_eq!(s.target(key).unwrap().state(), TargetState::Drawable);
    }
    let fills = s
        .gpu()
        .ops()
        .iter()
        .filter(|op| matches!(op, GpuOp::MemoryFill(_)))
        .count();
    assert_eq!(fills, 4);
}

// ============================================================================
// PACING TESTS
// ============================================================================

#[test]
fn test_integration_half_rate_frame_sync() {
    let mut s = create_scheduler(0, 0, 0);
    assert_eq!(s.frame_rate(30.0), 60.0);

    for _ in 0..60 {
        s.frame_sync();
    }
    assert_eq!(s.frame_counter(Screen::Top), 60);
    let tick = s.gpu().tick();
    assert!((117..=120).contains(&tick), "60 syncs took {} vblanks", tick);
}
