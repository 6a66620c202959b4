use super::{Record, Recorder, STEP_KEY};

/// Buffered recorder.
///
/// Keeps every written record in memory, for inspecting the metrics of a short
/// run.
#[derive(Default)]
pub struct BufferedRecorder {
    buf: Vec<Record>,
}

impl BufferedRecorder {
    /// Construct the recorder.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Returns an iterator over the records.
    pub fn iter(&self) -> std::slice::Iter<Record> {
        self.buf.iter()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if no record has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns `(step, value)` of every record holding a scalar under `key`.
    ///
    /// Records without a step get `0`.
    pub fn scalars(&self, key: &str) -> Vec<(usize, f32)> {
        self.buf
            .iter()
            .filter_map(|record| {
                let v = record.get_scalar(key).ok()?;
                let step = record.get_scalar(STEP_KEY).map(|s| s as usize).unwrap_or(0);
                Some((step, v))
            })
            .collect()
    }
}

impl Recorder for BufferedRecorder {
    /// Write a [`Record`] to the buffer.
    fn write(&mut self, record: Record) {
        self.buf.push(record);
    }
}
