//! Per-device accumulation of three-phase current samples across one
//! operating cycle.
//!
//! While the device reports "Running" every reading's samples are appended.
//! Leaving "Running" either aborts the cycle (synchronisation pulse set) or,
//! when every phase holds at least one sample, completes it and hands the
//! samples to the caller. Either way the buffer is empty afterwards.

use tracing::debug;

use super::payload::{ElectricalPayload, Samples};

/// Samples of one completed cycle, per phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleSamples {
    pub phases: [Vec<f64>; 3],
}

impl CycleSamples {
    pub fn phase(&self, index: usize) -> Option<&[f64]> {
        self.phases.get(index).map(Vec::as_slice)
    }
}

/// What one reading did to the buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleEvent {
    /// Device running; samples appended.
    Accumulating { buffered: usize },
    /// Cycle discarded on a synchronisation pulse.
    Aborted { discarded: usize },
    /// Cycle finished with samples on every phase.
    Completed(CycleSamples),
    /// Not running and nothing to complete.
    Idle,
}

#[derive(Debug, Default)]
pub struct SampleBuffer {
    phases: [Vec<f64>; 3],
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffered sample count per phase.
    pub fn counts(&self) -> [usize; 3] {
        [self.phases[0].len(), self.phases[1].len(), self.phases[2].len()]
    }

    pub fn is_empty(&self) -> bool {
        self.phases.iter().all(Vec::is_empty)
    }

    pub fn append(&mut self, l1: &Samples, l2: &Samples, l3: &Samples) {
        for (phase, samples) in self.phases.iter_mut().zip([l1, l2, l3]) {
            phase.extend_from_slice(samples.as_slice());
        }
    }

    pub fn clear(&mut self) {
        self.phases.iter_mut().for_each(Vec::clear);
    }

    /// Apply the state-transition contract for one reading.
    pub fn on_reading(&mut self, running: bool, synch_pulse: bool, currents: [&Samples; 3]) -> CycleEvent {
        if running {
            let [l1, l2, l3] = currents;
            self.append(l1, l2, l3);
            return CycleEvent::Accumulating {
                buffered: self.phases[0].len(),
            };
        }

        if synch_pulse {
            let discarded = self.phases.iter().map(Vec::len).sum();
            self.clear();
            if discarded > 0 {
                debug!(discarded, "Cycle aborted by synch pulse");
            }
            return CycleEvent::Aborted { discarded };
        }

        if self.phases.iter().all(|phase| !phase.is_empty()) {
            return CycleEvent::Completed(CycleSamples {
                phases: std::mem::take(&mut self.phases),
            });
        }

        CycleEvent::Idle
    }

    /// [`on_reading`](Self::on_reading) driven by a parsed payload.
    pub fn on_payload(&mut self, payload: &ElectricalPayload) -> CycleEvent {
        let data = &payload.electrical_data;
        self.on_reading(
            payload.is_running(),
            payload.synch_pulse,
            [&data.current_l1, &data.current_l2, &data.current_l3],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn many(values: &[f64]) -> Samples {
        Samples::Many(values.to_vec())
    }

    #[test]
    fn test_running_accumulates() {
        let mut buffer = SampleBuffer::new();
        let one = Samples::One(1.0);
        buffer.on_reading(true, false, [&one, &one, &one]);
        let event = buffer.on_reading(true, true, [&many(&[2.0, 3.0]), &one, &one]);
        // synch pulse while running does not abort
        assert_eq!(event, CycleEvent::Accumulating { buffered: 3 });
        assert_eq!(buffer.counts(), [3, 2, 2]);
    }

    #[test]
    fn test_synch_pulse_aborts() {
        let mut buffer = SampleBuffer::new();
        let one = Samples::One(1.0);
        buffer.on_reading(true, false, [&one, &one, &one]);
        let event = buffer.on_reading(false, true, [&one, &one, &one]);
        assert_eq!(event, CycleEvent::Aborted { discarded: 3 });
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_stop_completes_and_clears() {
        let mut buffer = SampleBuffer::new();
        buffer.on_reading(true, false, [&many(&[1.0, 2.0]), &many(&[3.0]), &many(&[4.0])]);
        let event = buffer.on_reading(false, false, [&many(&[9.0]), &many(&[9.0]), &many(&[9.0])]);
        let CycleEvent::Completed(cycle) = event else {
            panic!("expected completed cycle, got {event:?}");
        };
        assert_eq!(cycle.phase(0), Some(&[1.0, 2.0][..]));
        assert_eq!(cycle.phase(1), Some(&[3.0][..]));
        assert!(buffer.is_empty());

        // a second stop has nothing to complete
        let one = Samples::One(1.0);
        assert_eq!(buffer.on_reading(false, false, [&one, &one, &one]), CycleEvent::Idle);
    }

    #[test]
    fn test_missing_phase_does_not_complete() {
        let mut buffer = SampleBuffer::new();
        buffer.on_reading(true, false, [&many(&[1.0]), &many(&[1.0]), &many(&[])]);
        let one = Samples::One(1.0);
        assert_eq!(buffer.on_reading(false, false, [&one, &one, &one]), CycleEvent::Idle);
        assert_eq!(buffer.counts(), [1, 1, 0]);
    }
}
