//! Open-loop periodic gait controller.
//!
//! Every leg is driven by two joints: a horizontal swing joint and a vertical
//! lift joint. Each joint follows a smoothed square wave described by three
//! parameters (amplitude, phase, duty cycle), giving 6 parameters per leg.

use super::SimulationError;

/// Samples per gait period.
pub const SIGNAL_SAMPLES: usize = 100;

/// Parameters per leg: (amplitude, phase, duty cycle) for swing then lift.
pub const PARAMS_PER_LEG: usize = 6;

/// Precomputed joint command tables for one leg.
#[derive(Debug, Clone)]
struct LegSignals {
    swing: Vec<f64>,
    lift: Vec<f64>,
}

/// Periodic controller built from a parameter vector.
#[derive(Debug, Clone)]
pub struct GaitController {
    legs: Vec<LegSignals>,
    period: f64,
}

impl GaitController {
    /// Build the controller. Amplitudes in `[0, 1]` are scaled to `max_joint_angle`.
    pub fn new(
        params: &[f64],
        leg_count: usize,
        max_joint_angle: f64,
        period: f64,
    ) -> Result<Self, SimulationError> {
        let expected = leg_count * PARAMS_PER_LEG;
        if params.len() != expected {
            return Err(SimulationError::InvalidParameters {
                expected,
                actual: params.len(),
            });
        }
        if let Some(index) = params.iter().position(|p| !p.is_finite()) {
            return Err(SimulationError::NonFiniteParameter { index });
        }

        let legs = params
            .chunks_exact(PARAMS_PER_LEG)
            .map(|p| LegSignals {
                swing: control_signal(p[0] * max_joint_angle, p[1], p[2]),
                lift: control_signal(p[3] * max_joint_angle, p[4], p[5]),
            })
            .collect();

        Ok(Self { legs, period })
    }

    /// Swing and lift angles of `leg` at time `t`.
    pub fn joint_angles(&self, leg: usize, t: f64) -> (f64, f64) {
        let signals = &self.legs[leg];
        let idx = self.sample_index(t);
        (signals.swing[idx], signals.lift[idx])
    }

    fn sample_index(&self, t: f64) -> usize {
        let phase = (t / self.period).rem_euclid(1.0);
        ((phase * SIGNAL_SAMPLES as f64).floor() as usize).min(SIGNAL_SAMPLES - 1)
    }
}

/// Smoothed, phase-shifted square wave sampled over one period.
///
/// The wave is `+amplitude` for the first `duty_cycle` fraction of the period
/// and `-amplitude` for the rest, convolved with a circular Gaussian kernel.
pub fn control_signal(amplitude: f64, phase: f64, duty_cycle: f64) -> Vec<f64> {
    let up_time =
        ((SIGNAL_SAMPLES as f64 * duty_cycle.clamp(0.0, 1.0)) as usize).min(SIGNAL_SAMPLES);
    let square: Vec<f64> = (0..SIGNAL_SAMPLES)
        .map(|i| if i < up_time { amplitude } else { -amplitude })
        .collect();

    let kernel = smoothing_kernel(SIGNAL_SAMPLES / 10);
    let half = (kernel.len() / 2) as isize;
    let n = SIGNAL_SAMPLES as isize;

    let smoothed: Vec<f64> = (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * square[(i + k as isize - half).rem_euclid(n) as usize])
                .sum()
        })
        .collect();

    let start =
        ((SIGNAL_SAMPLES as f64 * phase.clamp(0.0, 1.0)).floor() as usize) % SIGNAL_SAMPLES;
    let mut shifted = Vec::with_capacity(SIGNAL_SAMPLES);
    shifted.extend_from_slice(&smoothed[start..]);
    shifted.extend_from_slice(&smoothed[..start]);
    shifted
}

/// Normalized Gaussian kernel of half-width `radius`.
fn smoothing_kernel(radius: usize) -> Vec<f64> {
    let sigma = (radius as f64 / 3.0).max(1e-6);
    let raw: Vec<f64> = (0..=2 * radius)
        .map(|k| {
            let d = k as f64 - radius as f64;
            (-d * d / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let norm: f64 = raw.iter().sum();
    raw.into_iter().map(|w| w / norm).collect()
}
