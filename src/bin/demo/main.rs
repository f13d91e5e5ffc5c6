//! modweave-demo - audible tour of runtime rewiring
//!
//! Run with: cargo run --bin modweave-demo --features demo
//!
//! Plays a sine tone whose pitch is modulated by the engine, then rewires
//! the slot from pitch to level while the stream keeps running. The audio
//! callback only ever talks to the engine; all rewiring goes through the
//! control handle from the main thread.

use std::f32::consts::TAU;
use std::thread;
use std::time::Duration;

use color_eyre::eyre::{eyre, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};

use modweave::engine::{EngineBuilder, ModEngine};
use modweave::params::ParamRange;
use modweave::MAX_BLOCK_SIZE;

fn main() -> Result<()> {
    color_eyre::install()?;

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| eyre!("no output device available"))?;
    let config = device.default_output_config()?;
    let sample_rate = config.sample_rate().0 as f32;

    let mut builder = EngineBuilder::new();
    builder.param("Pitch", ParamRange::linear(110.0, 880.0), 220.0);
    builder.param("Level", ParamRange::linear(0.0, 0.5), 0.3);
    builder.slots(2);
    builder.bind_slot(0, "Pitch", 1, 0.2); // LFO Sine on pitch
    let (mut engine, mut handle) = builder.build();
    engine.prepare(sample_rate, MAX_BLOCK_SIZE);

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => run::<f32>(&device, &config.into(), engine)?,
        cpal::SampleFormat::I16 => run::<i16>(&device, &config.into(), engine)?,
        cpal::SampleFormat::U16 => run::<u16>(&device, &config.into(), engine)?,
        format => return Err(eyre!("unsupported sample format {:?}", format)),
    };
    stream.play()?;

    println!("vibrato on pitch...");
    thread::sleep(Duration::from_secs(4));

    // Choice list: None, Pitch, Level, Amount 1, Amount 2 -> Level is 2/4
    println!("rewiring slot 0 to level (tremolo)...");
    handle.set_slot_target(0, 0.5);
    handle.set_slot_source(0, 4.0 / 5.0); // LFO Square out of 6 sources
    thread::sleep(Duration::from_secs(4));

    println!("unbinding...");
    handle.set_slot_target(0, 0.0);
    thread::sleep(Duration::from_secs(2));

    Ok(())
}

fn run<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut engine: ModEngine,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let pitch = engine
        .lookup("Pitch")
        .ok_or_else(|| eyre!("missing Pitch parameter"))?;
    let level = engine
        .lookup("Level")
        .ok_or_else(|| eyre!("missing Level parameter"))?;
    let sample_rate = config.sample_rate.0 as f32;
    let mut phase = 0.0f32;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            for chunk in data.chunks_mut(MAX_BLOCK_SIZE * channels) {
                let frames = chunk.len() / channels;
                engine.run_block(frames);
                let pitches = engine.values(pitch);
                let levels = engine.values(level);

                for (frame_idx, frame) in chunk.chunks_mut(channels).enumerate() {
                    phase = (phase + pitches[frame_idx] / sample_rate).fract();
                    let sample = (phase * TAU).sin() * levels[frame_idx];
                    for out in frame.iter_mut() {
                        *out = T::from_sample(sample);
                    }
                }
            }
        },
        |err| eprintln!("stream error: {}", err),
        None,
    )?;

    Ok(stream)
}
