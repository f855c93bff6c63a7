//! Scripted instruments shared by the sweep integration tests.

#![allow(dead_code)]

use bode_common::instrument::{
    BandwidthMode, Channel, InstrumentError, ResponseSampler, StimulusController, Waveform,
};
use bode_sweep::CancelToken;
use std::collections::{HashMap, VecDeque};

/// Command seen by the recording generator.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorCommand {
    Waveform(Channel, Waveform),
    Frequency(Channel, f64),
    Amplitude(Channel, f64),
    Enabled(Channel, bool),
}

/// Generator that records every command.
#[derive(Default)]
pub struct RecordingGenerator {
    pub commands: Vec<GeneratorCommand>,
    /// Cancel this token when a frequency equal to `cancel_at_hz` is set.
    pub cancel_on: Option<(f64, CancelToken)>,
    /// Fail once this many frequency commands have succeeded.
    pub fail_after_frequency_commands: Option<usize>,
    pub max_hz: Option<f64>,
}

impl RecordingGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frequencies(&self) -> Vec<f64> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                GeneratorCommand::Frequency(_, hz) => Some(*hz),
                _ => None,
            })
            .collect()
    }
}

impl StimulusController for RecordingGenerator {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn set_waveform(&mut self, channel: Channel, waveform: Waveform) -> Result<(), InstrumentError> {
        self.commands.push(GeneratorCommand::Waveform(channel, waveform));
        Ok(())
    }

    fn set_frequency(&mut self, channel: Channel, hz: f64) -> Result<(), InstrumentError> {
        if let Some(limit) = self.fail_after_frequency_commands {
            if self.frequencies().len() >= limit {
                return Err(InstrumentError::Communication("serial write timed out".to_string()));
            }
        }
        self.commands.push(GeneratorCommand::Frequency(channel, hz));
        if let Some((at, token)) = &self.cancel_on {
            if *at == hz {
                token.cancel();
            }
        }
        Ok(())
    }

    fn set_amplitude(&mut self, channel: Channel, volts: f64) -> Result<(), InstrumentError> {
        self.commands.push(GeneratorCommand::Amplitude(channel, volts));
        Ok(())
    }

    fn set_channel_enabled(&mut self, channel: Channel, enabled: bool) -> Result<(), InstrumentError> {
        self.commands.push(GeneratorCommand::Enabled(channel, enabled));
        Ok(())
    }

    fn max_frequency_hz(&self) -> Option<f64> {
        self.max_hz
    }
}

/// Oscilloscope answering from per-channel scripts.
///
/// Each read pops the next scripted value; once a script has a single
/// value left, that value repeats forever.
#[derive(Default)]
pub struct ScriptedSampler {
    pub vpp: HashMap<Channel, VecDeque<f64>>,
    pub phase: VecDeque<f64>,
    pub scales: Vec<(Channel, f64)>,
    pub timebases: Vec<f64>,
    pub bandwidths: Vec<(Channel, BandwidthMode)>,
    pub reads: HashMap<Channel, usize>,
    pub fail_reads: bool,
}

impl ScriptedSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vpp(mut self, channel: Channel, values: &[f64]) -> Self {
        self.vpp.insert(channel, values.iter().copied().collect());
        self
    }

    pub fn with_phase(mut self, values: &[f64]) -> Self {
        self.phase = values.iter().copied().collect();
        self
    }

    pub fn reads_of(&self, channel: Channel) -> usize {
        self.reads.get(&channel).copied().unwrap_or(0)
    }

    pub fn scales_of(&self, channel: Channel) -> Vec<f64> {
        self.scales
            .iter()
            .filter(|(ch, _)| *ch == channel)
            .map(|(_, s)| *s)
            .collect()
    }
}

fn next_scripted(queue: &mut VecDeque<f64>) -> Option<f64> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().copied()
    }
}

impl ResponseSampler for ScriptedSampler {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn read_vpp(&mut self, channel: Channel) -> Result<f64, InstrumentError> {
        if self.fail_reads {
            return Err(InstrumentError::Communication("socket closed".to_string()));
        }
        *self.reads.entry(channel).or_insert(0) += 1;
        let queue = self
            .vpp
            .get_mut(&channel)
            .ok_or_else(|| InstrumentError::Unsupported(format!("no script for {channel}")))?;
        Ok(next_scripted(queue).unwrap_or(9.9e37))
    }

    fn read_phase(&mut self, _reference: Channel, _channel: Channel) -> Result<f64, InstrumentError> {
        Ok(next_scripted(&mut self.phase).unwrap_or(9.9e37))
    }

    fn set_vertical_scale(&mut self, channel: Channel, volts_per_div: f64) -> Result<(), InstrumentError> {
        self.scales.push((channel, volts_per_div));
        Ok(())
    }

    fn set_timebase_scale(&mut self, seconds_per_div: f64) -> Result<(), InstrumentError> {
        self.timebases.push(seconds_per_div);
        Ok(())
    }

    fn set_bandwidth_limit(&mut self, channel: Channel, mode: BandwidthMode) -> Result<(), InstrumentError> {
        self.bandwidths.push((channel, mode));
        Ok(())
    }
}

/// Oscilloscope whose readings follow a fixed true amplitude per channel.
///
/// A signal larger than `divisions * scale` reads as the window edge.
pub struct WindowSampler {
    pub amplitude: HashMap<Channel, f64>,
    pub scale: HashMap<Channel, f64>,
    pub divisions: f64,
}

impl WindowSampler {
    pub fn new(divisions: f64) -> Self {
        Self {
            amplitude: HashMap::new(),
            scale: HashMap::new(),
            divisions,
        }
    }

    pub fn with_signal(mut self, channel: Channel, volts: f64) -> Self {
        self.amplitude.insert(channel, volts);
        self
    }
}

impl ResponseSampler for WindowSampler {
    fn name(&self) -> &'static str {
        "window"
    }

    fn read_vpp(&mut self, channel: Channel) -> Result<f64, InstrumentError> {
        let signal = self.amplitude.get(&channel).copied().unwrap_or(0.0);
        let scale = self.scale.get(&channel).copied().unwrap_or(1.0);
        Ok(signal.min(self.divisions * scale))
    }

    fn read_phase(&mut self, _reference: Channel, _channel: Channel) -> Result<f64, InstrumentError> {
        Ok(0.0)
    }

    fn set_vertical_scale(&mut self, channel: Channel, volts_per_div: f64) -> Result<(), InstrumentError> {
        self.scale.insert(channel, volts_per_div);
        Ok(())
    }

    fn set_timebase_scale(&mut self, _seconds_per_div: f64) -> Result<(), InstrumentError> {
        Ok(())
    }

    fn set_bandwidth_limit(&mut self, _channel: Channel, _mode: BandwidthMode) -> Result<(), InstrumentError> {
        Ok(())
    }
}
