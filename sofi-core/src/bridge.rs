//! Duplex audio plumbing around the realtime callbacks.
//!
//! cpal exposes no single duplex stream, so the bridge opens paired mono
//! f32 input and output streams at the configured rate. The output callback
//! runs the modulator; the input callback copies captured samples into the
//! receiver's ring, but only while the modulator is idle so the endpoint
//! does not decode its own transmission on a shared device. Both callbacks
//! touch nothing but the rings and one atomic flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use log::error;

use crate::config::Config;
use crate::errors::InitError;
use crate::modulator::Modulator;
use crate::ring::Producer;

/// Owns the live streams; dropping it stops the callbacks.
pub struct AudioBridge {
    _output: Option<cpal::Stream>,
    _input: Option<cpal::Stream>,
}

impl AudioBridge {
    pub fn start(
        config: &Config,
        modulator: Option<Modulator>,
        samples: Option<Producer<f32>>,
    ) -> Result<Self, InitError> {
        let host = cpal::default_host();
        let stream_config = StreamConfig {
            channels: 1,
            sample_rate: SampleRate(config.sample_rate),
            buffer_size: BufferSize::Default,
        };
        let idle = Arc::new(AtomicBool::new(true));

        let output = match modulator {
            Some(mut modulator) => {
                let device = host
                    .default_output_device()
                    .ok_or(InitError::NoOutputDevice)?;
                let idle = Arc::clone(&idle);
                let stream = device.build_output_stream(
                    &stream_config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        modulator.fill(data);
                        idle.store(modulator.is_idle(), Ordering::Release);
                    },
                    |err| error!("audio output stream error: {err}"),
                    None,
                )?;
                stream.play()?;
                Some(stream)
            }
            None => None,
        };

        let input = match samples {
            Some(mut samples) => {
                let device = host
                    .default_input_device()
                    .ok_or(InitError::NoInputDevice)?;
                let idle = Arc::clone(&idle);
                let stream = device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if idle.load(Ordering::Acquire) {
                            // Upstream sizing keeps the ring ahead of the
                            // device for any sane callback period.
                            let written = samples.write(data);
                            debug_assert_eq!(written, data.len(), "sample ring overrun");
                        }
                    },
                    |err| error!("audio input stream error: {err}"),
                    None,
                )?;
                stream.play()?;
                Some(stream)
            }
            None => None,
        };

        Ok(Self {
            _output: output,
            _input: input,
        })
    }
}
