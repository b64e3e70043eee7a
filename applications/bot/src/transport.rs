//! Simulated voice transport
//!
//! Stands in for a real voice connection: each started track runs a timer for
//! its duration and reports `Ended` when the timer fires. Pausing banks the
//! time already played so resuming only waits for the remainder.

use async_trait::async_trait;
use jukebox_core::{
    AudioTransport, ChannelId, Generation, TrackDescriptor, TransportError, TransportEvent,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

struct ActiveTrack {
    generation: Generation,
    title: String,
    volume: f32,
    remaining: Duration,
    /// Set while the timer runs
    resumed_at: Option<Instant>,
    timer: Option<JoinHandle<()>>,
}

impl ActiveTrack {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Timer-driven [`AudioTransport`]
pub struct SimulatedTransport {
    events: mpsc::UnboundedSender<TransportEvent>,
    default_length: Duration,
    available: AtomicBool,
    channels: Arc<Mutex<HashMap<ChannelId, ActiveTrack>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedTransport {
    /// `default_length` is used for tracks without a known duration
    pub fn new(events: mpsc::UnboundedSender<TransportEvent>, default_length: Duration) -> Self {
        Self {
            events,
            default_length,
            available: AtomicBool::new(true),
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Simulate losing or regaining the voice connection
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Volume currently applied in `channel`
    pub fn volume(&self, channel: ChannelId) -> Option<f32> {
        lock(&self.channels).get(&channel).map(|track| track.volume)
    }

    /// Title playing (or paused) in `channel`
    pub fn now_playing(&self, channel: ChannelId) -> Option<String> {
        lock(&self.channels)
            .get(&channel)
            .map(|track| track.title.clone())
    }

    fn ensure_available(&self) -> Result<(), TransportError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::Unavailable(
                "not connected to voice".to_string(),
            ))
        }
    }

    fn spawn_timer(
        &self,
        channel: ChannelId,
        generation: Generation,
        after: Duration,
    ) -> JoinHandle<()> {
        let events = self.events.clone();
        let channels = Arc::clone(&self.channels);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;

            let finished = {
                let mut channels = lock(&channels);
                match channels.get(&channel) {
                    Some(track) if track.generation == generation => {
                        channels.remove(&channel);
                        true
                    }
                    _ => false,
                }
            };

            if finished && events.send(TransportEvent::ended(channel, generation)).is_err() {
                debug!(channel = %channel, "Event receiver dropped");
            }
        })
    }
}

#[async_trait]
impl AudioTransport for SimulatedTransport {
    async fn start_playback(
        &self,
        channel: ChannelId,
        track: &TrackDescriptor,
        volume: f32,
        generation: Generation,
    ) -> Result<(), TransportError> {
        self.ensure_available()?;

        if track.is_local() && !Path::new(track.source()).is_file() {
            return Err(TransportError::Source(format!(
                "file not found: {}",
                track.source()
            )));
        }

        let length = track.duration().unwrap_or(self.default_length);

        // Hold the map while arming so the timer always finds its entry
        let mut channels = lock(&self.channels);
        let timer = self.spawn_timer(channel, generation, length);
        let previous = channels.insert(
            channel,
            ActiveTrack {
                generation,
                title: track.title().to_string(),
                volume,
                remaining: length,
                resumed_at: Some(Instant::now()),
                timer: Some(timer),
            },
        );
        drop(channels);

        if let Some(mut previous) = previous {
            previous.cancel_timer();
        }

        info!(channel = %channel, generation = %generation, track = %track.title(), "Playback started");
        Ok(())
    }

    async fn pause_playback(&self, channel: ChannelId) -> Result<(), TransportError> {
        self.ensure_available()?;

        let mut channels = lock(&self.channels);
        let Some(track) = channels.get_mut(&channel) else {
            return Err(TransportError::Unavailable(format!(
                "nothing playing in {}",
                channel
            )));
        };

        if let Some(resumed_at) = track.resumed_at.take() {
            track.remaining = track.remaining.saturating_sub(resumed_at.elapsed());
            track.cancel_timer();
        }
        Ok(())
    }

    async fn resume_playback(&self, channel: ChannelId) -> Result<(), TransportError> {
        self.ensure_available()?;

        let (generation, remaining) = {
            let channels = lock(&self.channels);
            match channels.get(&channel) {
                Some(track) if track.resumed_at.is_none() => (track.generation, track.remaining),
                Some(_) => return Ok(()),
                None => {
                    return Err(TransportError::Unavailable(format!(
                        "nothing paused in {}",
                        channel
                    )))
                }
            }
        };

        let mut channels = lock(&self.channels);
        let timer = self.spawn_timer(channel, generation, remaining);
        match channels.get_mut(&channel) {
            Some(track) if track.generation == generation => {
                track.resumed_at = Some(Instant::now());
                track.timer = Some(timer);
            }
            _ => timer.abort(),
        }
        Ok(())
    }

    async fn stop_playback(&self, channel: ChannelId) -> Result<(), TransportError> {
        if let Some(mut track) = lock(&self.channels).remove(&channel) {
            track.cancel_timer();
        }
        Ok(())
    }

    async fn set_volume(&self, channel: ChannelId, volume: f32) -> Result<(), TransportError> {
        if let Some(track) = lock(&self.channels).get_mut(&channel) {
            track.volume = volume;
        }
        Ok(())
    }

    async fn leave(&self, channel: ChannelId) -> Result<(), TransportError> {
        self.stop_playback(channel).await?;
        debug!(channel = %channel, "Left voice channel");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> (SimulatedTransport, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SimulatedTransport::new(tx, Duration::from_secs(10)), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn track_ends_after_its_duration() {
        let (transport, mut rx) = transport();
        let channel = ChannelId::new(1);
        let track = TrackDescriptor::remote("Radio", "https://example.com/a")
            .with_duration(Duration::from_secs(3));

        transport
            .start_playback(channel, &track, 0.5, Generation::default().next())
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event, TransportEvent::ended(channel, Generation::default().next()));
        assert!(transport.now_playing(channel).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_emits_nothing() {
        let (transport, mut rx) = transport();
        let channel = ChannelId::new(1);
        let track = TrackDescriptor::remote("Radio", "https://example.com/a");

        transport
            .start_playback(channel, &track, 0.5, Generation::default())
            .await
            .unwrap();
        transport.stop_playback(channel).await.unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn pause_holds_the_remaining_time() {
        let (transport, mut rx) = transport();
        let channel = ChannelId::new(1);
        let track = TrackDescriptor::remote("Radio", "https://example.com/a")
            .with_duration(Duration::from_secs(4));

        transport
            .start_playback(channel, &track, 0.5, Generation::default())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        transport.pause_playback(channel).await.unwrap();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());

        transport.resume_playback(channel).await.unwrap();
        let started = Instant::now();
        rx.recv().await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn missing_local_file_is_a_source_error() {
        let (transport, _rx) = transport();
        let track = TrackDescriptor::local("Gone", "/definitely/not/here.mp3");

        let err = transport
            .start_playback(ChannelId::new(1), &track, 0.5, Generation::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Source(_)));
    }

    #[tokio::test]
    async fn unavailable_transport_rejects_start() {
        let (transport, _rx) = transport();
        transport.set_available(false);
        let track = TrackDescriptor::remote("Radio", "https://example.com/a");

        let err = transport
            .start_playback(ChannelId::new(1), &track, 0.5, Generation::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Unavailable(_)));
    }
}
