//! Integration tests for session controllers and the registry
//!
//! Every test drives sessions through the public handle API against a
//! recording transport.

mod support;

use jukebox_core::{ChannelId, JukeboxError, Mode, ResultCode, TransportError};
use jukebox_playback::{
    CloseReason, Command, CommandOutput, EnqueuePosition, EnqueueReport, PlaybackConfig,
    PlaybackError, PlaybackState, SessionEvent,
};
use support::{registry, registry_with, track, tracks, wait_for_event, Call, RecordingTransport};

const CHANNEL: ChannelId = ChannelId::new(1);

fn status(output: CommandOutput) -> jukebox_playback::SessionStatus {
    match output {
        CommandOutput::Status(status) => *status,
        other => panic!("expected status, got {:?}", other),
    }
}

// ===== Enqueue and Start =====

#[tokio::test]
async fn enqueue_to_idle_session_starts_playback() {
    let transport = RecordingTransport::new();
    let registry = registry(&transport);

    let output = registry
        .enqueue(CHANNEL, tracks(&["A", "B", "C"]), EnqueuePosition::End)
        .await
        .unwrap();

    assert_eq!(
        output,
        CommandOutput::Enqueued {
            report: EnqueueReport {
                added: 3,
                skipped: 0
            },
            started: Some(track("A")),
        }
    );
    assert_eq!(transport.started(CHANNEL), vec!["/music/A.mp3"]);
}

#[tokio::test]
async fn enqueue_while_playing_does_not_restart() {
    let transport = RecordingTransport::new();
    let registry = registry(&transport);

    registry
        .enqueue(CHANNEL, tracks(&["A"]), EnqueuePosition::End)
        .await
        .unwrap();
    let output = registry
        .enqueue(CHANNEL, tracks(&["A", "B"]), EnqueuePosition::End)
        .await
        .unwrap();

    assert_eq!(
        output,
        CommandOutput::Enqueued {
            report: EnqueueReport {
                added: 1,
                skipped: 1
            },
            started: None,
        }
    );
    assert_eq!(transport.started(CHANNEL).len(), 1);
}

#[tokio::test]
async fn started_volume_includes_normalization_gain() {
    let transport = RecordingTransport::new();
    let registry = registry_with(
        &transport,
        PlaybackConfig {
            default_volume: 0.5,
            ..PlaybackConfig::default()
        },
    );

    let quiet = track("quiet").with_normalization_gain(0.5);
    registry
        .enqueue(CHANNEL, vec![quiet], EnqueuePosition::End)
        .await
        .unwrap();

    match &transport.calls()[0] {
        Call::Start { volume, .. } => assert!((volume - 0.25).abs() < 1e-6),
        other => panic!("unexpected call {:?}", other),
    }
}

// ===== Skip and Exhaustion =====

#[tokio::test]
async fn skip_twice_then_queue_exhausts() {
    let transport = RecordingTransport::new();
    let registry = registry(&transport);
    let mut events = registry.subscribe();

    registry
        .enqueue(CHANNEL, tracks(&["A", "B", "C"]), EnqueuePosition::End)
        .await
        .unwrap();
    let session = registry.get(CHANNEL).unwrap();

    assert_eq!(
        session.execute(Command::Skip).await.unwrap(),
        CommandOutput::Playing(track("B"))
    );
    assert_eq!(
        session.execute(Command::Skip).await.unwrap(),
        CommandOutput::Playing(track("C"))
    );

    let done = status(session.execute(Command::Status).await.unwrap());
    assert_eq!(done.cursor, Some(2));

    assert_eq!(
        session.execute(Command::Skip).await.unwrap(),
        CommandOutput::Finished
    );

    assert!(registry.get(CHANNEL).is_none());
    assert!(transport.calls().contains(&Call::Stop(CHANNEL)));
    assert!(transport.calls().contains(&Call::Leave(CHANNEL)));

    let closed = wait_for_event(&mut events, |e| matches!(e, SessionEvent::Closed { .. })).await;
    assert_eq!(
        closed,
        SessionEvent::Closed {
            channel: CHANNEL,
            reason: CloseReason::Exhausted
        }
    );
}

#[tokio::test]
async fn commands_after_teardown_report_session_closed() {
    let transport = RecordingTransport::new();
    let registry = registry(&transport);

    registry
        .enqueue(CHANNEL, tracks(&["A"]), EnqueuePosition::End)
        .await
        .unwrap();
    let session = registry.get(CHANNEL).unwrap();

    assert_eq!(
        session.execute(Command::ClearAndStop).await.unwrap(),
        CommandOutput::Finished
    );

    let err = session.execute(Command::Play).await.unwrap_err();
    assert!(matches!(err, PlaybackError::SessionClosed(c) if c == CHANNEL));
    assert!(session.is_closed());
}

#[tokio::test]
async fn enqueue_after_teardown_creates_new_session() {
    let transport = RecordingTransport::new();
    let registry = registry(&transport);

    registry
        .enqueue(CHANNEL, tracks(&["A"]), EnqueuePosition::End)
        .await
        .unwrap();
    let old = registry.get(CHANNEL).unwrap();
    old.execute(Command::ClearAndStop).await.unwrap();

    let output = registry
        .enqueue(CHANNEL, tracks(&["B"]), EnqueuePosition::End)
        .await
        .unwrap();
    assert!(matches!(
        output,
        CommandOutput::Enqueued {
            started: Some(_),
            ..
        }
    ));
    assert!(!registry.get(CHANNEL).unwrap().is_closed());
}

// ===== Track Notifications =====

#[tokio::test]
async fn stale_track_ended_never_advances() {
    let transport = RecordingTransport::new();
    let registry = registry(&transport);

    registry
        .enqueue(CHANNEL, tracks(&["A", "B", "C"]), EnqueuePosition::End)
        .await
        .unwrap();
    let session = registry.get(CHANNEL).unwrap();
    let first = transport.last_generation(CHANNEL).unwrap();

    session.execute(Command::Skip).await.unwrap();
    let second = transport.last_generation(CHANNEL).unwrap();
    assert_ne!(first, second);

    // Late notification from A
    assert_eq!(
        session
            .execute(Command::TrackEnded { generation: first })
            .await
            .unwrap(),
        CommandOutput::Stale
    );
    let current = status(session.execute(Command::Status).await.unwrap());
    assert_eq!(current.current, Some(track("B")));

    // Real notification for B, then a duplicate of it
    assert_eq!(
        session
            .execute(Command::TrackEnded { generation: second })
            .await
            .unwrap(),
        CommandOutput::Playing(track("C"))
    );
    assert_eq!(
        session
            .execute(Command::TrackEnded { generation: second })
            .await
            .unwrap(),
        CommandOutput::Stale
    );
    assert_eq!(transport.started(CHANNEL).len(), 3);
}

#[tokio::test]
async fn loop_mode_replays_on_track_end() {
    let transport = RecordingTransport::new();
    let registry = registry(&transport);

    registry
        .enqueue(CHANNEL, tracks(&["A", "B"]), EnqueuePosition::End)
        .await
        .unwrap();
    let session = registry.get(CHANNEL).unwrap();
    for _ in 0..3 {
        session.execute(Command::CycleMode).await.unwrap();
    }

    let generation = transport.last_generation(CHANNEL).unwrap();
    assert_eq!(
        session
            .execute(Command::TrackEnded { generation })
            .await
            .unwrap(),
        CommandOutput::Playing(track("A"))
    );

    assert_eq!(
        session.execute(Command::Skip).await.unwrap(),
        CommandOutput::Playing(track("B"))
    );
    let current = status(session.execute(Command::Status).await.unwrap());
    assert_eq!(current.mode, Mode::Loop);
}

#[tokio::test]
async fn track_failed_skips_to_next() {
    let transport = RecordingTransport::new();
    let registry = registry(&transport);
    let mut events = registry.subscribe();

    registry
        .enqueue(CHANNEL, tracks(&["A", "B"]), EnqueuePosition::End)
        .await
        .unwrap();
    let session = registry.get(CHANNEL).unwrap();
    let generation = transport.last_generation(CHANNEL).unwrap();

    let output = session
        .execute(Command::TrackFailed {
            generation,
            reason: "stream dropped".into(),
        })
        .await
        .unwrap();
    assert_eq!(output, CommandOutput::Playing(track("B")));

    let failed =
        wait_for_event(&mut events, |e| matches!(e, SessionEvent::TrackFailed { .. })).await;
    assert_eq!(
        failed,
        SessionEvent::TrackFailed {
            channel: CHANNEL,
            track: track("A"),
            reason: "stream dropped".into(),
        }
    );
}

#[tokio::test]
async fn unplayable_tracks_are_skipped_on_start() {
    let transport = RecordingTransport::new();
    transport.fail_source("/music/A.mp3");
    transport.fail_source("/music/B.mp3");
    let registry = registry(&transport);

    let output = registry
        .enqueue(CHANNEL, tracks(&["A", "B", "C"]), EnqueuePosition::End)
        .await
        .unwrap();

    assert!(matches!(
        output,
        CommandOutput::Enqueued { started: Some(ref t), .. } if *t == track("C")
    ));
    assert_eq!(transport.started(CHANNEL), vec!["/music/C.mp3"]);
}

#[tokio::test]
async fn all_tracks_failing_tears_down() {
    let transport = RecordingTransport::new();
    transport.fail_source("/music/A.mp3");
    transport.fail_source("/music/B.mp3");
    let registry = registry_with(
        &transport,
        PlaybackConfig {
            repeat_queue: true,
            ..PlaybackConfig::default()
        },
    );

    let output = registry
        .enqueue(CHANNEL, tracks(&["A", "B"]), EnqueuePosition::End)
        .await
        .unwrap();

    assert!(matches!(
        output,
        CommandOutput::Enqueued { started: None, .. }
    ));
    assert!(registry.get(CHANNEL).is_none());
}

#[tokio::test]
async fn unavailable_transport_is_reported() {
    let transport = RecordingTransport::new();
    transport.set_unavailable(true);
    let registry = registry(&transport);

    let err = registry
        .enqueue(CHANNEL, tracks(&["A"]), EnqueuePosition::End)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PlaybackError::Transport(TransportError::Unavailable(_))
    ));
    assert_eq!(JukeboxError::from(err).code(), ResultCode::TransportUnavailable);

    // The track stays queued; play works once the transport is back
    transport.set_unavailable(false);
    let session = registry.get(CHANNEL).unwrap();
    assert_eq!(
        session.execute(Command::Play).await.unwrap(),
        CommandOutput::Playing(track("A"))
    );
}

// ===== Pause, Volume, Mode =====

#[tokio::test]
async fn toggle_pause_round_trip() {
    let transport = RecordingTransport::new();
    let registry = registry(&transport);

    registry
        .enqueue(CHANNEL, tracks(&["A"]), EnqueuePosition::End)
        .await
        .unwrap();
    let session = registry.get(CHANNEL).unwrap();

    assert_eq!(
        session.execute(Command::TogglePause).await.unwrap(),
        CommandOutput::Paused
    );
    let paused = status(session.execute(Command::Status).await.unwrap());
    assert_eq!(paused.state, PlaybackState::Paused);

    assert_eq!(
        session.execute(Command::TogglePause).await.unwrap(),
        CommandOutput::Playing(track("A"))
    );
    assert!(transport.calls().contains(&Call::Pause(CHANNEL)));
    assert!(transport.calls().contains(&Call::Resume(CHANNEL)));
}

#[tokio::test]
async fn pause_with_nothing_playing_is_invalid() {
    let transport = RecordingTransport::new();
    let registry = registry(&transport);
    let session = registry.get_or_create(CHANNEL);

    let err = session.execute(Command::Pause).await.unwrap_err();
    assert!(matches!(err, PlaybackError::NothingPlaying));
    assert_eq!(JukeboxError::from(err).code(), ResultCode::InvalidArgument);

    let err = session.execute(Command::Play).await.unwrap_err();
    assert!(matches!(err, PlaybackError::QueueEmpty));
}

#[tokio::test]
async fn volume_is_validated_and_capped() {
    let transport = RecordingTransport::new();
    let registry = registry_with(
        &transport,
        PlaybackConfig {
            max_volume: 0.8,
            ..PlaybackConfig::default()
        },
    );
    registry
        .enqueue(CHANNEL, tracks(&["A"]), EnqueuePosition::End)
        .await
        .unwrap();
    let session = registry.get(CHANNEL).unwrap();

    assert!(matches!(
        session.execute(Command::SetVolume(1.5)).await,
        Err(PlaybackError::InvalidVolume(_))
    ));
    assert_eq!(
        session.execute(Command::SetVolume(1.0)).await.unwrap(),
        CommandOutput::Volume(0.8)
    );
    assert!(transport.calls().contains(&Call::SetVolume(CHANNEL, 0.8)));
}

#[tokio::test]
async fn four_cycle_mode_calls_return_to_sequential() {
    let transport = RecordingTransport::new();
    let registry = registry(&transport);
    let session = registry.get_or_create(CHANNEL);

    let mut modes = Vec::new();
    for _ in 0..4 {
        match session.execute(Command::CycleMode).await.unwrap() {
            CommandOutput::Mode(mode) => modes.push(mode),
            other => panic!("unexpected {:?}", other),
        }
    }
    assert_eq!(
        modes,
        vec![Mode::Shuffle, Mode::Alphabetical, Mode::Loop, Mode::Sequential]
    );
}

// ===== Remove and Jump =====

#[tokio::test]
async fn removing_current_starts_shifted_track() {
    let transport = RecordingTransport::new();
    let registry = registry(&transport);

    registry
        .enqueue(CHANNEL, tracks(&["A", "B", "C"]), EnqueuePosition::End)
        .await
        .unwrap();
    let session = registry.get(CHANNEL).unwrap();

    assert_eq!(
        session.execute(Command::Remove(0)).await.unwrap(),
        CommandOutput::Removed(track("A"))
    );
    let now = status(session.execute(Command::Status).await.unwrap());
    assert_eq!(now.current, Some(track("B")));
    assert_eq!(now.cursor, Some(0));
    assert_eq!(transport.started(CHANNEL), vec!["/music/A.mp3", "/music/B.mp3"]);

    assert!(matches!(
        session.execute(Command::Remove(7)).await,
        Err(PlaybackError::IndexOutOfBounds { index: 7, len: 2 })
    ));
}

#[tokio::test]
async fn removing_current_last_track_in_shuffle_keeps_playing() {
    let transport = RecordingTransport::new();
    let registry = registry(&transport);

    registry
        .enqueue(CHANNEL, tracks(&["A", "B", "C", "D"]), EnqueuePosition::End)
        .await
        .unwrap();
    let session = registry.get(CHANNEL).unwrap();
    session.execute(Command::CycleMode).await.unwrap();
    session.execute(Command::JumpTo(3)).await.unwrap();

    assert_eq!(
        session.execute(Command::Remove(3)).await.unwrap(),
        CommandOutput::Removed(track("D"))
    );

    let now = status(session.execute(Command::Status).await.unwrap());
    assert_eq!(now.state, PlaybackState::Playing);
    assert_eq!(now.tracks.len(), 3);
    let current = now.current.expect("a remaining track plays");
    assert_ne!(current, track("D"));
    assert_eq!(registry.channels(), vec![CHANNEL]);
}

#[tokio::test]
async fn removing_current_last_track_in_sequential_finishes() {
    let transport = RecordingTransport::new();
    let registry = registry(&transport);

    registry
        .enqueue(CHANNEL, tracks(&["A", "B"]), EnqueuePosition::End)
        .await
        .unwrap();
    let session = registry.get(CHANNEL).unwrap();
    session.execute(Command::JumpTo(1)).await.unwrap();

    session.execute(Command::Remove(1)).await.unwrap();
    assert!(registry.get(CHANNEL).is_none());
}

#[tokio::test]
async fn jump_to_plays_selected_track() {
    let transport = RecordingTransport::new();
    let registry = registry(&transport);

    registry
        .enqueue(CHANNEL, tracks(&["A", "B", "C"]), EnqueuePosition::End)
        .await
        .unwrap();
    let session = registry.get(CHANNEL).unwrap();

    assert_eq!(
        session.execute(Command::JumpTo(2)).await.unwrap(),
        CommandOutput::Playing(track("C"))
    );
    assert!(session.execute(Command::JumpTo(3)).await.is_err());
}

// ===== Registry =====

#[tokio::test]
async fn most_recent_follows_user_commands() {
    let transport = RecordingTransport::new();
    let registry = registry(&transport);
    let other = ChannelId::new(2);

    assert!(registry.most_recent().is_none());

    registry
        .enqueue(CHANNEL, tracks(&["A"]), EnqueuePosition::End)
        .await
        .unwrap();
    registry
        .enqueue(other, tracks(&["B"]), EnqueuePosition::End)
        .await
        .unwrap();
    assert_eq!(registry.most_recent().unwrap().channel(), other);

    // Read-only commands do not move the pointer
    registry
        .get(CHANNEL)
        .unwrap()
        .execute(Command::Status)
        .await
        .unwrap();
    assert_eq!(registry.most_recent().unwrap().channel(), other);

    registry
        .get(CHANNEL)
        .unwrap()
        .execute(Command::Pause)
        .await
        .unwrap();
    assert_eq!(registry.most_recent().unwrap().channel(), CHANNEL);

    // Closing the most recent session hands over to the previous one
    registry
        .get(CHANNEL)
        .unwrap()
        .execute(Command::ClearAndStop)
        .await
        .unwrap();
    assert_eq!(registry.channels(), vec![other]);
    assert_eq!(registry.most_recent().unwrap().channel(), other);

    registry
        .get(other)
        .unwrap()
        .execute(Command::ClearAndStop)
        .await
        .unwrap();
    assert!(registry.most_recent().is_none());
}

#[tokio::test]
async fn closing_latest_session_falls_back_to_earlier_one() {
    let transport = RecordingTransport::new();
    let registry = registry(&transport);
    let other = ChannelId::new(2);

    registry
        .enqueue(CHANNEL, tracks(&["A"]), EnqueuePosition::End)
        .await
        .unwrap();
    registry
        .enqueue(other, tracks(&["B"]), EnqueuePosition::End)
        .await
        .unwrap();

    registry
        .get(other)
        .unwrap()
        .execute(Command::ClearAndStop)
        .await
        .unwrap();

    assert_eq!(registry.channels(), vec![CHANNEL]);
    assert_eq!(registry.most_recent().unwrap().channel(), CHANNEL);
}

#[tokio::test]
async fn shutdown_keeps_queues_for_snapshot_and_restore() {
    let transport = RecordingTransport::new();
    let registry = registry(&transport);

    registry
        .enqueue(CHANNEL, tracks(&["A", "B"]), EnqueuePosition::End)
        .await
        .unwrap();
    registry
        .get(CHANNEL)
        .unwrap()
        .execute(Command::Skip)
        .await
        .unwrap();

    registry.shutdown_all().await;
    assert!(registry.is_empty());

    let snapshots = registry.snapshot_all().await;
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].cursor, Some(1));
    assert_eq!(snapshots[0].tracks, tracks(&["A", "B"]));

    let fresh = support::registry(&RecordingTransport::new());
    assert_eq!(fresh.restore(snapshots), 1);

    let restored = status(
        fresh
            .get(CHANNEL)
            .unwrap()
            .execute(Command::Status)
            .await
            .unwrap(),
    );
    assert_eq!(restored.state, PlaybackState::Stopped);
    assert_eq!(restored.current, Some(track("B")));

    assert_eq!(fresh.resume_all().await, 1);
}

#[tokio::test]
async fn restore_skips_invalid_snapshots() {
    let transport = RecordingTransport::new();
    let registry = registry(&transport);

    let mut bad = jukebox_core::SessionSnapshot {
        channel: CHANNEL,
        tracks: tracks(&["A"]),
        cursor: Some(4),
        mode: Mode::Sequential,
        volume: 0.3,
        repeat_queue: false,
    };
    assert_eq!(registry.restore(vec![bad.clone()]), 0);

    bad.cursor = None;
    assert_eq!(registry.restore(vec![bad]), 1);
}
