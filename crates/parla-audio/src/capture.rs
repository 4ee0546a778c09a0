//! Microphone capture into an in-memory WAV buffer. There can only be one
//! active capture at a time; that invariant is owned by the caller, this
//! module only manages the device and the buffer.

use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::sync::Arc;

use anyhow::anyhow;
use bytes::Bytes;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Host, Sample};
use hound::WavWriter;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum CaptureError {
    /// generic anyhow error
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
    /// Microphone missing, busy, or access refused
    #[error("microphone unavailable: {0}")]
    PermissionDenied(String),
    /// Sample format not supported
    #[error("sample format not supported: {0}")]
    SampleFormatNotSupported(String),
    /// Build stream error
    #[error(transparent)]
    BuildStream(#[from] cpal::BuildStreamError),
}

type Result<T> = std::result::Result<T, CaptureError>;
type WavWriterHandle = Arc<Mutex<Option<WavWriter<MemoryWriter>>>>;

/// Starts microphone captures. Implemented by [`MicBackend`] for real
/// hardware and by scripted fakes in tests.
pub trait CaptureBackend {
    fn begin(&self) -> Result<Box<dyn CaptureStream>>;
}

/// An in-progress capture. Finishing stops the device and returns the
/// recorded chunks in arrival order; dropping without finishing releases
/// the device and discards the audio.
pub trait CaptureStream {
    fn finish(self: Box<Self>) -> Result<Vec<Bytes>>;
}

/// A cheaply cloneable handle to the inner data that is being recorded. The
/// finalize method for the wav writer does not return the inner data, so we
/// store it behind an Arc<Mutex> to allow for cheap cloning and access to the
/// inner data.
#[derive(Clone)]
struct MemoryWriter {
    inner: Arc<Mutex<Cursor<Vec<u8>>>>,
}

impl MemoryWriter {
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Cursor::new(Vec::with_capacity(8 * 1024)))),
        }
    }

    fn try_into_inner(self) -> Result<Vec<u8>> {
        // Attempt to own the inner arc
        let owned = Arc::try_unwrap(self.inner).map_err(|_| {
            CaptureError::Anyhow(anyhow!("Failed to unwrap inner Arc in MemoryWriter"))
        })?;
        // Extract the cursor
        let cursor = owned.into_inner();
        // Extract the Vec
        Ok(cursor.into_inner())
    }
}

impl Seek for MemoryWriter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.lock().seek(pos)
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

/// The cpal-backed capture backend, recording from the default input device.
pub struct MicBackend {
    host: Host,
}

impl MicBackend {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }
}

impl Default for MicBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for MicBackend {
    fn begin(&self) -> Result<Box<dyn CaptureStream>> {
        let device = self
            .host
            .default_input_device()
            .ok_or_else(|| CaptureError::PermissionDenied("no input device available".into()))?;
        let config = device
            .default_input_config()
            .map_err(|e| CaptureError::PermissionDenied(format!("input config: {e}")))?;

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        info!(device_name = %device_name, config = ?config, "Capturing from device");

        let spec = wav_spec_from_config(&config);

        let buffer = MemoryWriter::new();
        let writer =
            WavWriter::new(buffer.clone(), spec).map_err(|e| CaptureError::Anyhow(e.into()))?;
        let writer = Arc::new(Mutex::new(Some(writer)));

        // The input stream runs its callback on a separate thread.
        let writer_2 = writer.clone();

        let err_fn = move |err| {
            error!("an error occurred on stream: {}", err);
        };

        let stream = match config.sample_format() {
            cpal::SampleFormat::I8 => device.build_input_stream(
                &config.into(),
                move |data, _: &_| write_input_data::<i8, i8>(data, &writer_2),
                err_fn,
                None,
            )?,
            cpal::SampleFormat::I16 => device.build_input_stream(
                &config.into(),
                move |data, _: &_| write_input_data::<i16, i16>(data, &writer_2),
                err_fn,
                None,
            )?,
            cpal::SampleFormat::I32 => device.build_input_stream(
                &config.into(),
                move |data, _: &_| write_input_data::<i32, i32>(data, &writer_2),
                err_fn,
                None,
            )?,
            cpal::SampleFormat::F32 => device.build_input_stream(
                &config.into(),
                move |data, _: &_| write_input_data::<f32, f32>(data, &writer_2),
                err_fn,
                None,
            )?,
            sample_format => {
                return Err(CaptureError::SampleFormatNotSupported(format!(
                    "{:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|_| anyhow!("failed to start input stream"))?;

        Ok(Box::new(MicStream {
            stream,
            writer,
            buffer: Some(buffer),
        }))
    }
}

/// Handle to the active capture. When dropped or finished, the capture ends
/// and the device is released. `finish` must be called to receive the data.
struct MicStream {
    stream: cpal::Stream,
    writer: WavWriterHandle,
    // The buffer the data is being written to. Presence of this buffer
    // indicates if the capture has been finalized or not.
    buffer: Option<MemoryWriter>,
}

impl MicStream {
    fn finish_inner(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(buffer) = self.buffer.take() else {
            return Ok(None);
        };
        info!("Ending capture.");
        self.stream.pause().ok();
        // Finalize the writer so it writes the proper framing information.
        self.writer
            .lock()
            .take()
            .ok_or_else(|| CaptureError::Anyhow(anyhow!("capture writer already finalized")))?
            .finalize()
            .map_err(|e| CaptureError::Anyhow(anyhow!("Failed to finalize writer: {}", e)))?;
        // Now that its ended, we can grab out the actual data and return it.
        let data = buffer.try_into_inner()?;
        Ok(Some(data))
    }
}

impl CaptureStream for MicStream {
    fn finish(mut self: Box<Self>) -> Result<Vec<Bytes>> {
        match self.finish_inner()? {
            Some(data) => Ok(vec![Bytes::from(data)]),
            None => Ok(Vec::new()),
        }
    }
}

impl Drop for MicStream {
    fn drop(&mut self) {
        if self.buffer.is_some() {
            if let Err(e) = self.finish_inner() {
                error!("failed to finalize capture: {}", e);
            }
        }
    }
}

fn wav_spec_from_config(config: &cpal::SupportedStreamConfig) -> hound::WavSpec {
    hound::WavSpec {
        channels: config.channels(),
        sample_rate: config.sample_rate().0,
        bits_per_sample: (config.sample_format().sample_size() * 8) as _,
        sample_format: sample_format(config.sample_format()),
    }
}

fn sample_format(format: cpal::SampleFormat) -> hound::SampleFormat {
    if format.is_float() {
        hound::SampleFormat::Float
    } else {
        hound::SampleFormat::Int
    }
}

fn write_input_data<T, U>(input: &[T], writer: &WavWriterHandle)
where
    T: Sample,
    U: Sample + hound::Sample + FromSample<T>,
{
    if let Some(mut guard) = writer.try_lock() {
        if let Some(writer) = guard.as_mut() {
            for &sample in input.iter() {
                let sample: U = U::from_sample(sample);
                writer.write_sample(sample).ok();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_writer_produces_wav_framing() {
        let buffer = MemoryWriter::new();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = WavWriter::new(buffer.clone(), spec).unwrap();
        for i in 0..160i16 {
            writer.write_sample(i).unwrap();
        }
        writer.finalize().unwrap();

        let data = buffer.try_into_inner().unwrap();
        assert_eq!(&data[..4], b"RIFF");
        assert_eq!(&data[8..12], b"WAVE");
        assert!(data.len() > 44);
    }

    #[test]
    fn test_memory_writer_refuses_unwrap_while_shared() {
        let buffer = MemoryWriter::new();
        let clone = buffer.clone();
        assert!(buffer.try_into_inner().is_err());
        drop(clone);
    }
}
