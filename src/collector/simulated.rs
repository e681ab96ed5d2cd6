//! Synthetic reading producer for running without a wearable attached.

use crate::collector::types::SensorReading;
use crate::collector::{forward, ProducerHandle, READING_CHANNEL_CAPACITY};
use crossbeam_channel::{bounded, Receiver, Sender};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Standard gravity in m/s².
const GRAVITY: f64 = 9.81;

/// Resting heart-rate band the simulated wearer drifts within.
const HEART_RATE_RANGE: (f64, f64) = (52.0, 82.0);

/// Chance per tick that the wearer rolls over.
const MOVEMENT_PROBABILITY: f64 = 0.02;

/// Start a producer emitting one heart-rate and one acceleration reading per
/// `period`.
pub fn spawn_simulator(period: Duration, seed: u64) -> (ProducerHandle, Receiver<SensorReading>) {
    let (sender, receiver) = bounded(READING_CHANNEL_CAPACITY);
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();

    let thread = thread::spawn(move || {
        let mut wearer = SimulatedWearer::new(seed);
        while flag.load(Ordering::SeqCst) {
            if !wearer.emit(&sender) {
                break;
            }
            thread::sleep(period);
        }
        flag.store(false, Ordering::SeqCst);
    });

    (ProducerHandle::new(running, thread), receiver)
}

/// Random-walk model of a sleeping wearer.
struct SimulatedWearer {
    rng: StdRng,
    heart_rate: f64,
}

impl SimulatedWearer {
    fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            heart_rate: 62.0,
        }
    }

    /// Send one reading pair. Returns false once the receiver is gone.
    fn emit(&mut self, sender: &Sender<SensorReading>) -> bool {
        let (hr, accel) = self.next_readings();
        forward(sender, hr) && forward(sender, accel)
    }

    fn next_readings(&mut self) -> (SensorReading, SensorReading) {
        let drift: f64 = self.rng.gen_range(-1.5..1.5);
        self.heart_rate = (self.heart_rate + drift).clamp(HEART_RATE_RANGE.0, HEART_RATE_RANGE.1);

        let jitter = if self.rng.gen::<f64>() < MOVEMENT_PROBABILITY {
            3.0
        } else {
            0.05
        };
        let accel = SensorReading::Acceleration {
            x: self.rng.gen_range(-jitter..jitter),
            y: self.rng.gen_range(-jitter..jitter),
            z: GRAVITY + self.rng.gen_range(-jitter..jitter),
        };

        (
            SensorReading::HeartRate {
                bpm: self.heart_rate.round() as u16,
            },
            accel,
        )
    }
}
