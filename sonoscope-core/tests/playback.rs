use std::cell::RefCell;
use std::rc::Rc;

use sonoscope_core::playback::PlaybackSynchronizer;
use sonoscope_core::{PaintSink, PlaybackPhase, SampleBuffer, Settings, Tile, Visualizer, VisualizerEvent};

struct NullSink;

impl PaintSink for NullSink {
    fn paint_tile(&mut self, _: usize, _: &Tile) -> sonoscope_core::Result<()> {
        Ok(())
    }
    fn paint_oscillogram_segment(&mut self, _: usize, _: &str) {}
    fn clear_tile(&mut self, _: usize) {}
    fn clear_all(&mut self) {}
}

#[test]
fn double_speed_transit_and_pause() {
    let mut sync = PlaybackSynchronizer::new();
    let started = sync.start(1000.0, 3000.0, 200.0, 10_000.0).unwrap();
    assert_eq!(started.transit_ms, 1000.0);

    let played = sync.pause(10_400.0).unwrap();
    assert!((played - 800.0).abs() < 1e-6);
    assert_eq!(sync.phase(), PlaybackPhase::Paused);
}

#[test]
fn transport_round_trip_through_visualizer() {
    let mut sink = NullSink;
    let settings = Settings { auto_scroll: false, ..Settings::default() };
    let mut vis = Visualizer::new(settings).unwrap();
    vis.set_viewport(640.0, &mut sink);
    vis.load(SampleBuffer::new(vec![0.0; 48_000], 16_000), &mut sink).unwrap();

    let phases = Rc::new(RefCell::new(Vec::new()));
    let seen = phases.clone();
    vis.subscribe(move |e| {
        if let VisualizerEvent::PlaybackChanged { phase } = e {
            seen.borrow_mut().push(*phase);
        }
    });

    vis.play(0.0, 3000.0, 50.0, 0.0, &mut sink).unwrap();
    assert_eq!(vis.playback_position_ms(2000.0), Some(1000.0));
    assert_eq!(vis.pause(2000.0), Some(1000.0));
    vis.resume(5000.0, None, &mut sink).unwrap();
    assert_eq!(vis.playback_position_ms(6000.0), Some(1500.0));

    let frame = vis.tick(9000.0, &mut sink).unwrap();
    assert!(frame.finished);
    assert_eq!(frame.position_ms, 3000.0);
    assert_eq!(frame.scroll_px, None);
    assert!(!vis.indicator_visible());

    assert_eq!(
        *phases.borrow(),
        vec![PlaybackPhase::Playing, PlaybackPhase::Paused, PlaybackPhase::Playing, PlaybackPhase::Idle]
    );
}

#[test]
fn play_is_clamped_to_recording_length() {
    let mut sink = NullSink;
    let mut vis = Visualizer::new(Settings::default()).unwrap();
    vis.load(SampleBuffer::new(vec![0.0; 16_000], 16_000), &mut sink).unwrap();

    let started = vis.play(500.0, 60_000.0, 100.0, 0.0, &mut sink).unwrap();
    assert_eq!(started.transit_ms, 500.0);
    assert!(vis.play(2000.0, 3000.0, 100.0, 0.0, &mut sink).is_err());
}
