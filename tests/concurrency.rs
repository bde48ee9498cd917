// Integration test: editing and playback on separate threads
//
// The editor keeps mutating while a playback thread reads snapshots. Every
// snapshot the reader sees must be internally consistent, versions only move
// forward, and the reader never waits on the writer.

mod common;

use blockseq::{BlockJoiner, ClockEvent, Tick, TimeRange, Timeline, create_session};
use blockseq::config::TransportConfig;
use common::{RecordingClock, RecordingSampler, Sent, held_note, silence};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

#[test]
fn test_reader_sees_consistent_snapshots() {
    let mut timeline = Timeline::new();
    let reader = timeline.reader();
    let done = Arc::new(AtomicBool::new(false));

    let watcher = {
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut last_version = 0;
            let mut observed = 0u64;
            while !done.load(Ordering::Acquire) {
                let snapshot = reader.snapshot();
                assert!(snapshot.version() >= last_version);
                last_version = snapshot.version();

                for lane in snapshot.lanes() {
                    let blocks: Vec<_> = snapshot
                        .blocks_overlapping(lane, TimeRange::new(Tick::ZERO, Tick(u64::MAX)))
                        .collect();
                    for pair in blocks.windows(2) {
                        assert!(!pair[0].overlaps(pair[1]));
                    }
                }
                observed += 1;
            }
            observed
        })
    };

    let mut rng = StdRng::seed_from_u64(5);
    let mut ids = Vec::new();
    for _ in 0..5_000 {
        let lane = rng.gen_range(0..8u32);
        if ids.is_empty() || rng.gen_bool(0.5) {
            if let Ok(id) = timeline.insert(lane, Tick(rng.gen_range(0..20_000)), silence(200)) {
                ids.push(id);
            }
        } else {
            let id = ids[rng.gen_range(0..ids.len())];
            let _ = timeline.place(id, lane, Tick(rng.gen_range(0..20_000)));
        }
    }
    done.store(true, Ordering::Release);

    let observed = watcher.join().unwrap();
    assert!(observed > 0);
    assert_eq!(timeline.snapshot().version(), timeline.version());
}

#[test]
fn test_playback_thread_follows_joins() {
    let mut timeline = Timeline::new();
    let a = timeline.insert(0, Tick(0), held_note(60, 480)).unwrap();
    let b = timeline.insert(0, Tick(480), held_note(62, 480)).unwrap();

    let (mut sync, mut controller) = create_session(
        timeline.reader(),
        RecordingSampler::default(),
        RecordingClock::default(),
        &TransportConfig::default(),
    );
    controller.play().unwrap();
    sync.on_clock_event(ClockEvent::Tick(Tick(240)));

    // Join while the player is mid-block
    BlockJoiner::join(&mut timeline, &[a, b]).unwrap();

    let player = thread::spawn(move || {
        for position in (300..=1200).step_by(60) {
            sync.on_clock_event(ClockEvent::Tick(Tick(position)));
        }
        sync
    });
    let sync = player.join().unwrap();

    // Same events as without the join, each exactly once
    assert_eq!(
        sync.sampler().sent,
        vec![
            Sent::On(60, Tick(0)),
            Sent::Off(60, Tick(480)),
            Sent::On(62, Tick(480)),
            Sent::Off(62, Tick(960)),
        ]
    );
    assert_eq!(controller.position(), Tick(1200));
}
