//! Sweep orchestration tests with scripted instruments and virtual time.

mod common;

use bode_common::instrument::{BandwidthMode, Channel, ResponseSampler, Waveform};
use bode_common::sweep::{ChannelMap, PhaseConvention, RangeConstraints, Spacing, SweepOptions};
use bode_sweep::{
    CancelToken, FrequencyPlan, SweepError, SweepOrchestrator, SweepReport, SweepStatus,
    VirtualClock,
};
use common::{GeneratorCommand, RecordingGenerator, ScriptedSampler};

const CH1: Channel = Channel(0);
const CH2: Channel = Channel(1);

fn sweep(
    generator: &mut RecordingGenerator,
    sampler: &mut dyn ResponseSampler,
    plan: &FrequencyPlan,
    channels: &ChannelMap,
    options: &SweepOptions,
    cancel: CancelToken,
) -> SweepReport {
    let mut clock = VirtualClock::new();
    let mut orchestrator = SweepOrchestrator::new(
        generator,
        sampler,
        &mut clock,
        RangeConstraints::default(),
        cancel,
    );
    orchestrator.run(plan, channels, options)
}

fn linear_plan(min: f64, max: f64, count: usize) -> FrequencyPlan {
    FrequencyPlan::generate(min, max, count, Spacing::Linear).unwrap()
}

#[test]
fn logarithmic_sweep_measures_every_point_in_order() {
    let plan = FrequencyPlan::generate(100.0, 10_000.0, 5, Spacing::Logarithmic).unwrap();
    let mut generator = RecordingGenerator::new();
    let mut sampler = ScriptedSampler::new().with_vpp(CH2, &[0.7]);

    let report = sweep(
        &mut generator,
        &mut sampler,
        &plan,
        &ChannelMap::default(),
        &SweepOptions::default(),
        CancelToken::new(),
    );

    assert_eq!(report.status(), SweepStatus::Completed);
    assert_eq!(report.points.len(), 5);
    assert!(
        report
            .points
            .windows(2)
            .all(|w| w[0].frequency_hz < w[1].frequency_hz)
    );
    for (point, f) in report.points.iter().zip(plan.iter()) {
        assert_eq!(point.frequency_hz, f);
        assert!(point.raw_amplitude.is_finite() && point.raw_amplitude > 0.0);
        assert_eq!(point.raw_amplitude, 0.7);
        assert_eq!(point.normalized_amplitude, None);
        assert_eq!(point.phase_deg, None);
    }

    // One timebase per point: a period over three divisions
    assert_eq!(sampler.timebases.len(), 5);
    assert!((sampler.timebases[0] - 1.0 / 100.0 / 3.0).abs() < 1e-15);
}

#[test]
fn stimulus_is_configured_before_the_first_point() {
    let plan = linear_plan(100.0, 200.0, 2);
    let mut generator = RecordingGenerator::new();
    let mut sampler = ScriptedSampler::new().with_vpp(CH2, &[0.7]);
    let options = SweepOptions {
        stimulus_amplitude_v: 2.0,
        ..Default::default()
    };

    let report = sweep(
        &mut generator,
        &mut sampler,
        &plan,
        &ChannelMap::default(),
        &options,
        CancelToken::new(),
    );
    assert!(report.is_complete());

    assert_eq!(
        &generator.commands[..4],
        &[
            GeneratorCommand::Waveform(CH1, Waveform::Sine),
            GeneratorCommand::Amplitude(CH1, 2.0),
            GeneratorCommand::Frequency(CH1, 100.0),
            GeneratorCommand::Enabled(CH1, true),
        ]
    );
    // Both monitored channels start at amplitude / 2.5
    assert_eq!(sampler.scales_of(CH1), vec![0.8]);
    assert_eq!(sampler.scales_of(CH2).first(), Some(&0.8));
    assert_eq!(
        sampler.bandwidths,
        vec![
            (CH1, BandwidthMode::Unrestricted),
            (CH2, BandwidthMode::Unrestricted)
        ]
    );
}

#[test]
fn overflow_at_third_point_grows_scale_once() {
    let plan = FrequencyPlan::generate(1000.0, 4000.0, 3, Spacing::Logarithmic).unwrap();
    let mut generator = RecordingGenerator::new();
    let mut sampler = ScriptedSampler::new().with_vpp(CH2, &[0.5, 1.0, 11.0, 9.0]);
    let mut clock = VirtualClock::new();
    let constraints = RangeConstraints {
        target_ratio: 0.25,
        ..Default::default()
    };
    let options = SweepOptions {
        stimulus_amplitude_v: 5.0,
        ..Default::default()
    };

    let (report, final_scale) = {
        let mut orchestrator = SweepOrchestrator::new(
            &mut generator,
            &mut sampler,
            &mut clock,
            constraints,
            CancelToken::new(),
        );
        let report = orchestrator.run(&plan, &ChannelMap::default(), &options);
        let scale = orchestrator.engine().state(CH2).map(|s| s.scale);
        (report, scale)
    };

    assert_eq!(report.status(), SweepStatus::Completed);
    let amplitudes: Vec<f64> = report.points.iter().map(|p| p.raw_amplitude).collect();
    assert_eq!(amplitudes, vec![0.5, 1.0, 9.0]);
    assert!((report.points[1].frequency_hz - 2000.0).abs() < 1e-9);
    assert_eq!(sampler.scales_of(CH2), vec![2.0, 6.0]);
    assert_eq!(final_scale, Some(6.0));
}

#[test]
fn normalization_divides_by_reference() {
    let plan = linear_plan(1000.0, 2000.0, 2);
    let mut generator = RecordingGenerator::new();
    let mut sampler = ScriptedSampler::new()
        .with_vpp(CH1, &[1.0])
        .with_vpp(CH2, &[0.5]);
    let options = SweepOptions {
        normalize: true,
        ..Default::default()
    };

    let report = sweep(
        &mut generator,
        &mut sampler,
        &plan,
        &ChannelMap::default(),
        &options,
        CancelToken::new(),
    );

    assert!(report.is_complete());
    for point in &report.points {
        assert_eq!(point.raw_amplitude, 0.5);
        assert_eq!(point.normalized_amplitude, Some(0.5));
        assert_eq!(point.amplitude(), 0.5);
    }
}

#[test]
fn invalid_reference_is_a_sampling_error() {
    let plan = linear_plan(1000.0, 2000.0, 2);
    let mut generator = RecordingGenerator::new();
    let mut sampler = ScriptedSampler::new()
        .with_vpp(CH1, &[9.9e37])
        .with_vpp(CH2, &[0.5]);
    let options = SweepOptions {
        normalize: true,
        ..Default::default()
    };

    let report = sweep(
        &mut generator,
        &mut sampler,
        &plan,
        &ChannelMap::default(),
        &options,
        CancelToken::new(),
    );

    assert_eq!(report.status(), SweepStatus::Failed);
    assert!(report.points.is_empty());
    assert_eq!(
        report.error(),
        Some(&SweepError::Sampling {
            channel: CH1,
            attempts: 5
        })
    );
}

#[test]
fn cancellation_keeps_committed_points() {
    let plan = linear_plan(100.0, 500.0, 5);
    let cancel = CancelToken::new();
    let mut generator = RecordingGenerator {
        cancel_on: Some((300.0, cancel.clone())),
        ..Default::default()
    };
    let mut sampler = ScriptedSampler::new().with_vpp(CH2, &[0.7]);

    let report = sweep(
        &mut generator,
        &mut sampler,
        &plan,
        &ChannelMap::default(),
        &SweepOptions::default(),
        cancel,
    );

    assert_eq!(report.status(), SweepStatus::Cancelled);
    assert_eq!(report.points.len(), 2);
    assert_eq!(report.points[0].frequency_hz, 100.0);
    assert_eq!(report.points[1].frequency_hz, 200.0);
    assert!(!generator.frequencies().contains(&400.0));
}

#[test]
fn communication_failure_returns_partial_results() {
    let plan = linear_plan(100.0, 500.0, 5);
    // One frequency command during setup, then one per point
    let mut generator = RecordingGenerator {
        fail_after_frequency_commands: Some(4),
        ..Default::default()
    };
    let mut sampler = ScriptedSampler::new().with_vpp(CH2, &[0.7]);

    let report = sweep(
        &mut generator,
        &mut sampler,
        &plan,
        &ChannelMap::default(),
        &SweepOptions::default(),
        CancelToken::new(),
    );

    assert_eq!(report.status(), SweepStatus::Failed);
    assert_eq!(report.points.len(), 3);
    assert!(matches!(
        report.error(),
        Some(SweepError::DeviceCommunication(_))
    ));
}

#[test]
fn invalid_parameters_fail_before_any_io() {
    let plan = linear_plan(100.0, 500.0, 5);
    let mut generator = RecordingGenerator::new();
    let mut sampler = ScriptedSampler::new().with_vpp(CH2, &[0.7]);
    let channels = ChannelMap {
        reference: CH2,
        response: CH2,
        ..Default::default()
    };

    let report = sweep(
        &mut generator,
        &mut sampler,
        &plan,
        &channels,
        &SweepOptions::default(),
        CancelToken::new(),
    );

    assert!(matches!(report.error(), Some(SweepError::InvalidRange(_))));
    assert!(report.points.is_empty());
    assert!(generator.commands.is_empty());
    assert!(sampler.scales.is_empty());
    assert!(sampler.bandwidths.is_empty());
}

#[test]
fn plan_beyond_generator_limit_is_rejected() {
    let plan = linear_plan(1000.0, 100_000.0, 3);
    let mut generator = RecordingGenerator {
        max_hz: Some(50_000.0),
        ..Default::default()
    };
    let mut sampler = ScriptedSampler::new().with_vpp(CH2, &[0.7]);

    let report = sweep(
        &mut generator,
        &mut sampler,
        &plan,
        &ChannelMap::default(),
        &SweepOptions::default(),
        CancelToken::new(),
    );

    assert!(matches!(report.error(), Some(SweepError::InvalidRange(_))));
    assert!(generator.commands.is_empty());
}

#[test]
fn unrepresentable_settle_wait_is_rejected_before_io() {
    let cases = [
        (
            FrequencyPlan::generate(1.0e-20, 1.0, 2, Spacing::Logarithmic).unwrap(),
            SweepOptions::default(),
        ),
        (
            linear_plan(100.0, 500.0, 3),
            SweepOptions {
                settle_cycles: 1.0e300,
                ..Default::default()
            },
        ),
    ];

    for (plan, options) in cases {
        let mut generator = RecordingGenerator::new();
        let mut sampler = ScriptedSampler::new().with_vpp(CH2, &[0.7]);

        let report = sweep(
            &mut generator,
            &mut sampler,
            &plan,
            &ChannelMap::default(),
            &options,
            CancelToken::new(),
        );

        assert_eq!(report.status(), SweepStatus::Failed);
        assert!(matches!(report.error(), Some(SweepError::InvalidRange(_))));
        assert!(report.points.is_empty());
        assert!(generator.commands.is_empty());
        assert!(sampler.scales.is_empty());
    }
}

#[test]
fn single_point_runs_a_full_cycle() {
    let plan = linear_plan(1000.0, 2000.0, 1);
    let mut generator = RecordingGenerator::new();
    let mut sampler = ScriptedSampler::new().with_vpp(CH2, &[0.7]);
    let options = SweepOptions {
        measure_phase: true,
        ..Default::default()
    };
    sampler.phase = [12.0].into_iter().collect();

    let report = sweep(
        &mut generator,
        &mut sampler,
        &plan,
        &ChannelMap::default(),
        &options,
        CancelToken::new(),
    );

    assert!(report.is_complete());
    assert_eq!(report.points.len(), 1);
    assert_eq!(report.points[0].frequency_hz, 1000.0);
    assert_eq!(report.points[0].phase_deg, Some(-12.0));
    assert_eq!(generator.frequencies(), vec![1000.0, 1000.0]);
    assert_eq!(sampler.timebases.len(), 1);
}

#[test]
fn manual_settings_leave_scale_and_timebase_alone() {
    let plan = linear_plan(100.0, 300.0, 3);
    let mut generator = RecordingGenerator::new();
    // Far below what autorange would accept at any scale
    let mut sampler = ScriptedSampler::new().with_vpp(CH2, &[0.0004]);
    let options = SweepOptions {
        auto_range: false,
        bandwidth: BandwidthMode::BandLimited,
        ..Default::default()
    };

    let report = sweep(
        &mut generator,
        &mut sampler,
        &plan,
        &ChannelMap::default(),
        &options,
        CancelToken::new(),
    );

    assert!(report.is_complete());
    assert!(report.points.iter().all(|p| p.raw_amplitude == 0.0004));
    assert!(sampler.scales.is_empty());
    assert!(sampler.timebases.is_empty());
    assert_eq!(
        sampler.bandwidths,
        vec![
            (CH1, BandwidthMode::BandLimited),
            (CH2, BandwidthMode::BandLimited)
        ]
    );
}

#[test]
fn unreadable_phase_is_absent_not_zero() {
    let plan = linear_plan(100.0, 300.0, 3);
    let mut generator = RecordingGenerator::new();
    let mut sampler = ScriptedSampler::new()
        .with_vpp(CH2, &[0.7])
        .with_phase(&[30.0, 9.9e37, -10.0]);
    let options = SweepOptions {
        measure_phase: true,
        ..Default::default()
    };

    let report = sweep(
        &mut generator,
        &mut sampler,
        &plan,
        &ChannelMap::default(),
        &options,
        CancelToken::new(),
    );

    let phases: Vec<Option<f64>> = report.points.iter().map(|p| p.phase_deg).collect();
    assert_eq!(phases, vec![Some(-30.0), None, Some(10.0)]);
}

#[test]
fn as_measured_phase_keeps_instrument_sign() {
    let plan = linear_plan(100.0, 200.0, 2);
    let mut generator = RecordingGenerator::new();
    let mut sampler = ScriptedSampler::new()
        .with_vpp(CH2, &[0.7])
        .with_phase(&[45.0]);
    let options = SweepOptions {
        measure_phase: true,
        phase_convention: PhaseConvention::AsMeasured,
        ..Default::default()
    };

    let report = sweep(
        &mut generator,
        &mut sampler,
        &plan,
        &ChannelMap::default(),
        &options,
        CancelToken::new(),
    );

    assert!(report.points.iter().all(|p| p.phase_deg == Some(45.0)));
}

#[test]
fn every_stimulus_channel_follows_the_plan() {
    let plan = linear_plan(100.0, 200.0, 2);
    let mut generator = RecordingGenerator::new();
    let mut sampler = ScriptedSampler::new().with_vpp(Channel(2), &[0.7]);
    let channels = ChannelMap {
        stimulus: vec![CH1, CH2],
        reference: CH1,
        response: Channel(2),
    };

    let report = sweep(
        &mut generator,
        &mut sampler,
        &plan,
        &channels,
        &SweepOptions::default(),
        CancelToken::new(),
    );

    assert!(report.is_complete());
    let per_channel = |ch: Channel| {
        generator
            .commands
            .iter()
            .filter(|c| matches!(c, GeneratorCommand::Frequency(c2, _) if *c2 == ch))
            .count()
    };
    // Setup plus one per point
    assert_eq!(per_channel(CH1), 3);
    assert_eq!(per_channel(CH2), 3);
}
