use time::{Duration, OffsetDateTime};

/// One slice of a report range.
///
/// Every chunk except the last is half-open (`start <= t < end`); the last one
/// also includes `end`, so walking all chunks covers `[from, to]` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeChunk {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
    pub includes_end: bool,
}

impl TimeChunk {
    pub fn contains(&self, ts: OffsetDateTime) -> bool {
        ts >= self.start && (ts < self.end || (self.includes_end && ts == self.end))
    }
}

/// Lazy split of `[from, to]` into chunks of at most `size`.
#[derive(Debug, Clone)]
pub struct TimeChunks {
    next_start: OffsetDateTime,
    to: OffsetDateTime,
    size: Duration,
    finished: bool,
}

impl TimeChunks {
    /// A non-positive `size` yields the whole range as a single chunk.
    pub fn new(from: OffsetDateTime, to: OffsetDateTime, size: Duration) -> Self {
        let size = if size.is_positive() { size } else { to - from };
        Self {
            next_start: from,
            to,
            size,
            finished: from > to,
        }
    }
}

impl Iterator for TimeChunks {
    type Item = TimeChunk;

    fn next(&mut self) -> Option<TimeChunk> {
        if self.finished {
            return None;
        }

        let start = self.next_start;
        let end = if self.to - start > self.size {
            start + self.size
        } else {
            self.to
        };
        let includes_end = end == self.to;

        self.next_start = end;
        self.finished = includes_end;

        Some(TimeChunk {
            start,
            end,
            includes_end,
        })
    }
}
