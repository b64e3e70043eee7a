//! Shared helpers for playback integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use jukebox_core::{AudioTransport, ChannelId, Generation, TrackDescriptor, TransportError};
use jukebox_playback::{PlaybackConfig, SessionEvent, SessionRegistry};
use jukebox_storage::SaveHandle;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// One call made against the transport
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Start {
        channel: ChannelId,
        source: String,
        volume: f32,
        generation: Generation,
    },
    Pause(ChannelId),
    Resume(ChannelId),
    Stop(ChannelId),
    SetVolume(ChannelId, f32),
    Leave(ChannelId),
}

/// Transport that records every call and fails on demand
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<String>>,
    unavailable: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reject `start_playback` for this source with a `Source` error
    pub fn fail_source(&self, source: &str) {
        self.failing.lock().unwrap().insert(source.to_string());
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Sources started in `channel`, in order
    pub fn started(&self, channel: ChannelId) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Start {
                    channel: c, source, ..
                } if c == channel => Some(source),
                _ => None,
            })
            .collect()
    }

    /// Generation of the most recent start in `channel`
    pub fn last_generation(&self, channel: ChannelId) -> Option<Generation> {
        self.calls().into_iter().rev().find_map(|call| match call {
            Call::Start {
                channel: c,
                generation,
                ..
            } if c == channel => Some(generation),
            _ => None,
        })
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_available(&self) -> Result<(), TransportError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(TransportError::Unavailable("not connected".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AudioTransport for RecordingTransport {
    async fn start_playback(
        &self,
        channel: ChannelId,
        track: &TrackDescriptor,
        volume: f32,
        generation: Generation,
    ) -> Result<(), TransportError> {
        self.check_available()?;
        if self.failing.lock().unwrap().contains(track.source()) {
            return Err(TransportError::Source(format!("cannot open {}", track.source())));
        }
        self.record(Call::Start {
            channel,
            source: track.source().to_string(),
            volume,
            generation,
        });
        Ok(())
    }

    async fn pause_playback(&self, channel: ChannelId) -> Result<(), TransportError> {
        self.check_available()?;
        self.record(Call::Pause(channel));
        Ok(())
    }

    async fn resume_playback(&self, channel: ChannelId) -> Result<(), TransportError> {
        self.check_available()?;
        self.record(Call::Resume(channel));
        Ok(())
    }

    async fn stop_playback(&self, channel: ChannelId) -> Result<(), TransportError> {
        self.record(Call::Stop(channel));
        Ok(())
    }

    async fn set_volume(&self, channel: ChannelId, volume: f32) -> Result<(), TransportError> {
        self.check_available()?;
        self.record(Call::SetVolume(channel, volume));
        Ok(())
    }

    async fn leave(&self, channel: ChannelId) -> Result<(), TransportError> {
        self.record(Call::Leave(channel));
        Ok(())
    }
}

pub fn track(name: &str) -> TrackDescriptor {
    TrackDescriptor::local(name, format!("/music/{}.mp3", name))
}

pub fn tracks(names: &[&str]) -> Vec<TrackDescriptor> {
    names.iter().map(|n| track(n)).collect()
}

pub fn registry(transport: &Arc<RecordingTransport>) -> SessionRegistry {
    registry_with(transport, PlaybackConfig::default())
}

pub fn registry_with(transport: &Arc<RecordingTransport>, config: PlaybackConfig) -> SessionRegistry {
    SessionRegistry::new(transport.clone(), SaveHandle::detached(), config)
}

/// Wait for the first event matching `predicate`
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<SessionEvent>,
    predicate: F,
) -> SessionEvent
where
    F: Fn(&SessionEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = events.recv().await.expect("event stream closed");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
