/// App lifecycle tests
/// Shutdown writes the state file; the next start restores from it
mod common;

use common::{ctx, say, start, test_config, LISTENER, OWNER};
use jukebox_bot::App;
use jukebox_core::{ChannelId, ResultCode};
use jukebox_playback::{Command, CommandOutput, PlaybackState};
use jukebox_storage::{PersistedState, PersistenceManager};
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn shutdown_persists_and_restart_resumes() {
    let dir = TempDir::new().unwrap();

    let app = start(dir.path()).await;
    say(&app, ctx(LISTENER, 10), "!m https://example.com/a.ogg").await;
    say(&app, ctx(LISTENER, 10), "!m https://example.com/b.ogg").await;
    say(&app, ctx(LISTENER, 10), "!playlist save Mix").await;
    say(&app, ctx(OWNER, 10), "!disable 5").await;
    app.shutdown().await.unwrap();

    let state: PersistedState = PersistenceManager::new(dir.path().join("data.json"))
        .load()
        .await
        .unwrap();
    assert_eq!(state.sessions.len(), 1);
    assert_eq!(state.sessions[0].tracks.len(), 2);
    assert!(state.playlists.contains_key("Mix"));
    assert!(state.disabled_users.contains(&jukebox_core::UserId::new(5)));

    let app = start(dir.path()).await;
    let session = app
        .services()
        .registry
        .get(ChannelId::new(10))
        .expect("session restored");
    let CommandOutput::Status(status) = session.execute(Command::Status).await.unwrap() else {
        panic!("expected status");
    };
    assert_eq!(status.state, PlaybackState::Playing);
    assert_eq!(status.tracks.len(), 2);
    assert!(app.services().users.is_disabled(jukebox_core::UserId::new(5)));
    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn restored_sessions_stay_idle_without_resume() {
    let dir = TempDir::new().unwrap();

    let app = start(dir.path()).await;
    say(&app, ctx(LISTENER, 10), "!m https://example.com/a.ogg").await;
    app.shutdown().await.unwrap();

    let mut config = test_config(dir.path());
    config.persistence.resume_on_startup = false;
    let app = App::start(config).await.unwrap();

    let session = app.services().registry.get(ChannelId::new(10)).unwrap();
    let CommandOutput::Status(status) = session.execute(Command::Status).await.unwrap() else {
        panic!("expected status");
    };
    assert_eq!(status.state, PlaybackState::Stopped);
    assert!(app.transport().now_playing(ChannelId::new(10)).is_none());
}

#[tokio::test]
async fn shutdown_command_notifies_the_main_loop() {
    let dir = TempDir::new().unwrap();
    let app = start(dir.path()).await;
    let shutdown = std::sync::Arc::clone(&app.services().shutdown);

    let reply = say(&app, ctx(OWNER, 10), "!shutdown").await;
    assert_eq!(reply.code, ResultCode::Success);

    tokio::time::timeout(Duration::from_secs(1), shutdown.notified())
        .await
        .expect("shutdown should be signalled");
}

#[tokio::test]
async fn skip_is_announced() {
    let dir = TempDir::new().unwrap();
    let mut app = start(dir.path()).await;
    let mut announcements = app.take_announcements().unwrap();

    say(&app, ctx(LISTENER, 10), "!m https://example.com/a.ogg").await;
    say(&app, ctx(LISTENER, 10), "!m https://example.com/b.ogg").await;

    let first = announcements.recv().await.unwrap();
    assert!(first.contains("a.ogg"), "{}", first);

    say(&app, ctx(LISTENER, 10), "!mskip").await;
    let second = announcements.recv().await.unwrap();
    assert!(second.contains("b.ogg"), "{}", second);
    assert_eq!(
        app.transport().now_playing(ChannelId::new(10)).as_deref(),
        Some("https://example.com/b.ogg")
    );
}

#[tokio::test]
async fn finished_tracks_advance_until_the_queue_ends() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.transport.default_track_secs = 1;
    let mut app = App::start(config).await.unwrap();
    let mut announcements = app.take_announcements().unwrap();

    say(&app, ctx(LISTENER, 10), "!m https://example.com/a.ogg").await;
    say(&app, ctx(LISTENER, 10), "!m https://example.com/b.ogg").await;

    let mut seen = Vec::new();
    while seen.len() < 3 {
        let message = tokio::time::timeout(Duration::from_secs(5), announcements.recv())
            .await
            .expect("announcement in time")
            .expect("announcer running");
        seen.push(message);
    }

    assert!(seen[0].contains("a.ogg"));
    assert!(seen[1].contains("b.ogg"));
    assert!(seen[2].contains("Queue finished"));
    assert!(app.services().registry.get(ChannelId::new(10)).is_none());
}
