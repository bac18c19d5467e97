//! Fixed-capacity, append-only recording of the state trajectory
//!
//! The buffer is sized once, up front, for the whole run: `ntime` slots
//! per recorded field, where `ntime = ceil(t_end / dt) + 1` counts the
//! initial record plus one per recording interval. Every write must match
//! the per-timestep shape its field was registered with; a write past the
//! last slot is an error, never a reallocation.

use crate::core_types::ThermodynamicState;
use crate::error::SimulationError;
use rustc_hash::FxHashMap;

/// One field's pre-allocated track
#[derive(Debug, Clone)]
struct FieldTrack {
    /// Per-timestep length of this field
    shape: usize,
    /// Row-major storage, `capacity * shape` slots
    data: Vec<f64>,
    /// Rows written so far
    cursor: usize,
}

/// Append-only trajectory buffer for one run
#[derive(Debug)]
pub struct OutputBuffer {
    capacity: usize,
    tracks: FxHashMap<&'static str, FieldTrack>,
    steps: Vec<u64>,
}

impl OutputBuffer {
    /// Number of record slots for a run of `t_end_steps` model steps
    /// recorded every `record_every` steps: one per interval plus the
    /// initial record.
    #[must_use]
    pub fn slots_for(t_end_steps: u64, record_every: u64) -> usize {
        (t_end_steps.div_ceil(record_every) + 1) as usize
    }

    /// Pre-size a buffer for `capacity` records of every field of
    /// `state`.
    #[must_use]
    pub fn new(capacity: usize, state: &ThermodynamicState) -> Self {
        let tracks = state
            .fields()
            .into_iter()
            .map(|(name, values)| {
                (
                    name,
                    FieldTrack {
                        shape: values.len(),
                        data: vec![0.0; capacity * values.len()],
                        cursor: 0,
                    },
                )
            })
            .collect();
        Self {
            capacity,
            tracks,
            steps: Vec::with_capacity(capacity),
        }
    }

    /// Records written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Total record capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append one record of every field of `state` at model step `step`.
    ///
    /// Records must arrive in strictly increasing step order (asserted:
    /// out-of-order recording is a driver logic bug, not a runtime
    /// condition).
    ///
    /// # Errors
    ///
    /// [`SimulationError::OutOfCapacity`] when the buffer is full;
    /// [`SimulationError::ShapeMismatch`] when a field's length differs
    /// from the shape it was registered with.
    pub fn record(
        &mut self,
        step: u64,
        state: &ThermodynamicState,
    ) -> Result<(), SimulationError> {
        assert!(
            self.steps.last().is_none_or(|&last| step > last),
            "OutputBuffer::record: steps must strictly increase"
        );

        // Validate every field before touching any track, so a failed
        // record never leaves the buffer half written
        for (name, values) in state.fields() {
            let track = self.tracks.get(name).ok_or_else(|| {
                SimulationError::InvalidConfig(format!("unregistered field '{name}'"))
            })?;
            if track.cursor >= self.capacity {
                return Err(SimulationError::OutOfCapacity {
                    field: name,
                    capacity: self.capacity,
                });
            }
            if values.len() != track.shape {
                return Err(SimulationError::ShapeMismatch {
                    field: name,
                    expected: track.shape,
                    actual: values.len(),
                });
            }
        }

        for (name, values) in state.fields() {
            if let Some(track) = self.tracks.get_mut(name) {
                let offset = track.cursor * track.shape;
                track.data[offset..offset + track.shape].copy_from_slice(values);
                track.cursor += 1;
            }
        }
        self.steps.push(step);
        Ok(())
    }

    /// Freeze the buffer into a read-only record of the run.
    #[must_use]
    pub fn finalize(self) -> OutputRecord {
        let fields = self
            .tracks
            .into_iter()
            .map(|(name, track)| {
                let rows = track.cursor;
                let mut data = track.data;
                data.truncate(rows * track.shape);
                (
                    name,
                    RecordedField {
                        shape: track.shape,
                        data,
                    },
                )
            })
            .collect();
        OutputRecord {
            steps: self.steps,
            fields,
        }
    }
}

/// A finalized field track
#[derive(Debug, Clone)]
pub struct RecordedField {
    shape: usize,
    data: Vec<f64>,
}

impl RecordedField {
    /// Rows as `(record index, values)` slices.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.shape)
    }

    /// One recorded row.
    #[must_use]
    pub fn row(&self, index: usize) -> &[f64] {
        &self.data[index * self.shape..(index + 1) * self.shape]
    }
}

/// Read-only, finalized trajectory of a completed run
#[derive(Debug)]
pub struct OutputRecord {
    steps: Vec<u64>,
    fields: FxHashMap<&'static str, RecordedField>,
}

impl OutputRecord {
    /// Model steps at which records were taken, strictly increasing.
    #[must_use]
    pub fn steps(&self) -> &[u64] {
        &self.steps
    }

    /// Number of records taken.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the run recorded nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// A recorded field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&RecordedField> {
        self.fields.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(n: usize) -> ThermodynamicState {
        ThermodynamicState::uniform(n, 1.0e5, 288.0, 1.2, 0.01).unwrap()
    }

    #[test]
    fn test_slots_formula() {
        assert_eq!(OutputBuffer::slots_for(4, 1), 5);
        assert_eq!(OutputBuffer::slots_for(10, 4), 4); // records at 0,4,8,(12>10→ceil)
        assert_eq!(OutputBuffer::slots_for(12, 4), 4);
    }

    #[test]
    fn test_exact_capacity_then_overflow() {
        let state = state(4);
        let mut buffer = OutputBuffer::new(3, &state);

        for step in 0..3 {
            buffer.record(step, &state).unwrap();
        }
        assert_eq!(buffer.len(), 3);

        let err = buffer.record(3, &state).unwrap_err();
        assert!(
            matches!(err, SimulationError::OutOfCapacity { capacity: 3, .. }),
            "fourth write into a 3-slot buffer must fail, got {err}"
        );
    }

    #[test]
    fn test_shape_mismatch_rejected_whole_record() {
        let state4 = state(4);
        let state5 = state(5);
        let mut buffer = OutputBuffer::new(2, &state4);
        buffer.record(0, &state4).unwrap();

        let err = buffer.record(1, &state5).unwrap_err();
        assert!(matches!(err, SimulationError::ShapeMismatch { .. }));
        assert_eq!(buffer.len(), 1, "failed record must not be half written");
    }

    #[test]
    #[should_panic(expected = "strictly increase")]
    fn test_out_of_order_record_asserts() {
        let state = state(2);
        let mut buffer = OutputBuffer::new(4, &state);
        buffer.record(5, &state).unwrap();
        let _ = buffer.record(5, &state);
    }

    #[test]
    fn test_finalized_record_round_trips_values() {
        let mut s = state(3);
        let mut buffer = OutputBuffer::new(2, &s);
        buffer.record(0, &s).unwrap();
        s.vapour.fill(0.042);
        buffer.record(7, &s).unwrap();

        let record = buffer.finalize();
        assert_eq!(record.steps(), &[0, 7]);
        let vapour = record.field("vapour").unwrap();
        assert_eq!(vapour.row(0), &[0.01, 0.01, 0.01]);
        assert_eq!(vapour.row(1), &[0.042, 0.042, 0.042]);
        assert_eq!(vapour.rows().count(), 2);
    }

    #[test]
    fn test_staggered_field_has_staggered_shape() {
        let s = state(4);
        let mut buffer = OutputBuffer::new(1, &s);
        buffer.record(0, &s).unwrap();
        let record = buffer.finalize();
        assert_eq!(record.field("velocity_w").unwrap().row(0).len(), 5);
    }
}
