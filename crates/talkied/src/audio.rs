//! cpal-backed capture and playback devices.
//!
//! cpal drives audio through callbacks on a thread it owns, while the
//! intercom's device contract is blocking frame reads and writes. These
//! adapters bridge the two with bounded sample channels: the capture
//! callback feeds a channel the reader drains, and the writer fills a
//! channel the playback callback drains. The channel bounds are what
//! pace the blocking side at the device's real-time rate.
//!
//! cpal streams are not Send, so each stream lives on a dedicated thread
//! that parks for the life of the process.

use std::sync::mpsc::{channel, sync_channel, Receiver, SyncSender};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};

use talkie_services::{CaptureDevice, DeviceError, PlaybackDevice};

fn stream_config(sample_rate: u32) -> StreamConfig {
    StreamConfig {
        channels: 1,
        sample_rate: SampleRate(sample_rate),
        buffer_size: BufferSize::Default,
    }
}

/// Microphone capture through the default cpal input device.
pub struct CpalCapture {
    samples: Receiver<i16>,
}

impl CpalCapture {
    pub fn open(sample_rate: u32, frame_samples: usize) -> Result<Self, DeviceError> {
        let (tx, rx) = sync_channel::<i16>(frame_samples * 8);
        let (ready_tx, ready_rx) = channel::<Result<(), DeviceError>>();

        std::thread::spawn(move || {
            let host = cpal::default_host();
            let device = match host.default_input_device() {
                Some(device) => device,
                None => {
                    let _ = ready_tx.send(Err(DeviceError::Unavailable(
                        "no default input device".into(),
                    )));
                    return;
                }
            };

            let stream = device.build_input_stream(
                &stream_config(sample_rate),
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    for &sample in data {
                        // Drop samples when the reader falls behind; the
                        // callback must never stall the audio thread.
                        if tx.try_send(sample).is_err() {
                            break;
                        }
                    }
                },
                |e| tracing::warn!(error = %e, "capture stream error"),
                None,
            );
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(DeviceError::Unavailable(e.to_string())));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(DeviceError::Unavailable(e.to_string())));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            // Keep the stream alive for the life of the process.
            loop {
                std::thread::park();
            }
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { samples: rx }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DeviceError::StreamClosed),
        }
    }
}

impl CaptureDevice for CpalCapture {
    fn read_frame(&mut self, frame: &mut [i16]) -> Result<(), DeviceError> {
        for slot in frame.iter_mut() {
            *slot = self
                .samples
                .recv()
                .map_err(|_| DeviceError::StreamClosed)?;
        }
        Ok(())
    }
}

/// Speaker playback through the default cpal output device.
pub struct CpalPlayback {
    samples: SyncSender<i16>,
}

impl CpalPlayback {
    pub fn open(sample_rate: u32, frame_samples: usize) -> Result<Self, DeviceError> {
        // A few frames of slack: enough that writes pace at the device
        // rate, little enough to keep latency low.
        let (tx, rx) = sync_channel::<i16>(frame_samples * 4);
        let (ready_tx, ready_rx) = channel::<Result<(), DeviceError>>();

        std::thread::spawn(move || {
            let host = cpal::default_host();
            let device = match host.default_output_device() {
                Some(device) => device,
                None => {
                    let _ = ready_tx.send(Err(DeviceError::Unavailable(
                        "no default output device".into(),
                    )));
                    return;
                }
            };

            let stream = device.build_output_stream(
                &stream_config(sample_rate),
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    for slot in data.iter_mut() {
                        // Underrun at the device level plays out as zeros.
                        *slot = rx.try_recv().unwrap_or(0);
                    }
                },
                |e| tracing::warn!(error = %e, "playback stream error"),
                None,
            );
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(DeviceError::Unavailable(e.to_string())));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(DeviceError::Unavailable(e.to_string())));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            loop {
                std::thread::park();
            }
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { samples: tx }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DeviceError::StreamClosed),
        }
    }
}

impl PlaybackDevice for CpalPlayback {
    fn write_frame(&mut self, frame: &[i16]) -> Result<(), DeviceError> {
        for &sample in frame {
            self.samples
                .send(sample)
                .map_err(|_| DeviceError::StreamClosed)?;
        }
        Ok(())
    }
}
