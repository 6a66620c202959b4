use super::{Record, RecordValue, STEP_KEY};

/// Writes a record to an output destination with [`Recorder::write`].
pub trait Recorder {
    /// Write a record to the [`Recorder`].
    fn write(&mut self, record: Record);

    /// Writes a single scalar tagged with the optimization step.
    fn log(&mut self, key: &str, value: f32, step: usize) {
        let mut record = Record::from_scalar(key, value);
        record.insert(STEP_KEY, RecordValue::Scalar(step as f32));
        self.write(record);
    }
}
