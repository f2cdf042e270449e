//! Audio output on the default cpal device.
//!
//! Each playback session gets its own output stream. The decoded samples are
//! resampled to the device rate if needed, pushed into a heap ring buffer in
//! one go and drained by the audio callback, which fans mono out to every
//! device channel.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    FromSample, SampleFormat, SampleRate, SizedSample, StreamConfig, SupportedStreamConfig,
    SupportedStreamConfigRange,
};
use magic_stories_core::pcm;
use magic_stories_core::playback::{
    AudioBackend, ContextState, EndedCallback, OutputContext, OutputSource, PlaybackError,
    SampleBuffer,
};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapRb};
use std::time::Duration;
use tracing::{debug, error, info};

/// Opens the host's default output device.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalBackend;

impl AudioBackend for CpalBackend {
    type Context = CpalContext;

    fn open(&self, sample_rate: u32) -> Result<CpalContext, PlaybackError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| PlaybackError::Unavailable("no default output device".to_string()))?;
        let config = pick_config(&device, sample_rate)?;
        info!(
            device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
            sample_rate = config.sample_rate().0,
            channels = config.channels(),
            format = ?config.sample_format(),
            "Opened audio output device"
        );
        Ok(CpalContext {
            device,
            config,
            state: ContextState::Running,
        })
    }
}

/// Picks the stream config sessions are built with.
fn pick_config(device: &cpal::Device, rate: u32) -> Result<SupportedStreamConfig, PlaybackError> {
    let ranges: Vec<SupportedStreamConfigRange> = device
        .supported_output_configs()
        .map(|configs| configs.collect())
        .unwrap_or_default();
    let fallback = device
        .default_output_config()
        .map_err(|e| PlaybackError::Unavailable(e.to_string()));
    choose_config(&ranges, SampleRate(rate), fallback)
}

/// Preference order: an `f32` range covering `wanted`, then any `f32` range
/// (samples get resampled to its rate), then the device default.
fn choose_config(
    ranges: &[SupportedStreamConfigRange],
    wanted: SampleRate,
    fallback: Result<SupportedStreamConfig, PlaybackError>,
) -> Result<SupportedStreamConfig, PlaybackError> {
    let float = || ranges.iter().filter(|r| r.sample_format() == SampleFormat::F32);
    let covers = |r: &&SupportedStreamConfigRange| {
        r.min_sample_rate() <= wanted && wanted <= r.max_sample_rate()
    };
    if let Some(range) = float().find(covers) {
        return Ok(range.clone().with_sample_rate(wanted));
    }
    if let Some(range) = float().next() {
        debug!(wanted = wanted.0, "No f32 config at the speech rate; resampling");
        return Ok(range.clone().with_max_sample_rate());
    }
    fallback
}

/// A cpal device plus the stream config every session is built with.
///
/// cpal has no suspended state of its own; the context reports `Running`
/// until it is closed.
pub struct CpalContext {
    device: cpal::Device,
    config: SupportedStreamConfig,
    state: ContextState,
}

impl OutputContext for CpalContext {
    type Source = CpalSource;

    fn state(&self) -> ContextState {
        self.state
    }

    fn resume(&mut self) -> Result<(), PlaybackError> {
        if self.state == ContextState::Closed {
            return Err(PlaybackError::Unavailable("output context is closed".to_string()));
        }
        self.state = ContextState::Running;
        Ok(())
    }

    fn start(
        &mut self,
        buffer: SampleBuffer,
        on_ended: EndedCallback,
    ) -> Result<CpalSource, PlaybackError> {
        let device_rate = self.config.sample_rate().0;
        let samples = pcm::resample(&buffer.samples, buffer.sample_rate, device_rate)?;
        let channels = usize::from(self.config.channels());

        let (mut producer, consumer) = HeapRb::<f32>::new(samples.len().max(1)).split();
        producer.push_slice(&samples);
        debug!(
            frames = samples.len(),
            device_rate,
            channels,
            "Queued samples for output"
        );

        let stream_config: StreamConfig = self.config.config();
        let format = self.config.sample_format();
        let (device, config) = (&self.device, &stream_config);
        let stream = match format {
            SampleFormat::F32 => build_stream::<f32>(device, config, channels, consumer, on_ended),
            SampleFormat::F64 => build_stream::<f64>(device, config, channels, consumer, on_ended),
            SampleFormat::I8 => build_stream::<i8>(device, config, channels, consumer, on_ended),
            SampleFormat::I16 => build_stream::<i16>(device, config, channels, consumer, on_ended),
            SampleFormat::I32 => build_stream::<i32>(device, config, channels, consumer, on_ended),
            SampleFormat::I64 => build_stream::<i64>(device, config, channels, consumer, on_ended),
            SampleFormat::U8 => build_stream::<u8>(device, config, channels, consumer, on_ended),
            SampleFormat::U16 => build_stream::<u16>(device, config, channels, consumer, on_ended),
            SampleFormat::U32 => build_stream::<u32>(device, config, channels, consumer, on_ended),
            SampleFormat::U64 => build_stream::<u64>(device, config, channels, consumer, on_ended),
            other => Err(PlaybackError::Output(format!(
                "unsupported output sample format: {other:?}"
            ))),
        }?;
        stream
            .play()
            .map_err(|e| PlaybackError::Output(e.to_string()))?;
        Ok(CpalSource {
            stream: Some(stream),
        })
    }

    fn close(&mut self) {
        self.state = ContextState::Closed;
        debug!("Audio output context closed");
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    channels: usize,
    mut consumer: HeapCons<f32>,
    on_ended: EndedCallback,
) -> Result<cpal::Stream, PlaybackError>
where
    T: SizedSample + FromSample<f32>,
{
    let mut on_ended = Some(on_ended);
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                fill_frames(data, channels, &mut consumer, &mut on_ended);
            },
            |err| error!(error = %err, "Audio output stream error"),
            Some(Duration::from_millis(200)),
        )
        .map_err(|e| PlaybackError::Output(e.to_string()))
}

/// Copies the next mono sample into every channel of each frame in `data`.
///
/// Frames past the end of the queue are silenced. `on_ended` fires once, from
/// the first call that runs out of samples.
fn fill_frames<T>(
    data: &mut [T],
    channels: usize,
    consumer: &mut HeapCons<f32>,
    on_ended: &mut Option<EndedCallback>,
) where
    T: SizedSample + FromSample<f32>,
{
    let mut drained = false;
    for frame in data.chunks_mut(channels.max(1)) {
        let value = consumer.try_pop().unwrap_or_else(|| {
            drained = true;
            0.0
        });
        frame.fill(T::from_sample(value));
    }
    if drained {
        if let Some(done) = on_ended.take() {
            done();
        }
    }
}

/// One playing stream. Dropping the stream halts the callback, so a stopped
/// source can never report completion.
pub struct CpalSource {
    stream: Option<cpal::Stream>,
}

impl OutputSource for CpalSource {
    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                debug!(error = %e, "Pausing output stream failed");
            }
        }
    }
}
