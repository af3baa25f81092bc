use quarry_common::Result;
use quarry_io::IndexInput;

use crate::format::VERSION_LONG_SKIP;

use super::num_skip_levels;

/// Reads the skip levels of one term and positions the caller's streams close to
/// a target document.
///
/// A reader is bound to a clone of the frequency stream and can be re-initialized
/// for any number of terms of the same segment.
#[derive(Debug)]
pub struct SkipReader {
    skip_interval: u32,
    max_skip_levels: u32,
    version: u32,
    /// Base stream; also reads level 0 once the levels are loaded.
    input: IndexInput,

    doc_count: u32,
    num_levels: usize,
    loaded: bool,
    store_payloads: bool,
    store_offsets: bool,

    streams: Vec<Option<IndexInput>>,
    /// Start of each level in the frequency stream.
    skip_pointer: Vec<u64>,
    /// Documents covered once the current entry of each level is consumed.
    num_skipped: Vec<u64>,
    /// Entries per level step: `skip_interval^(level + 1)`.
    level_interval: Vec<u64>,
    skip_doc: Vec<u32>,
    child_pointer: Vec<u64>,
    freq_pointer: Vec<u64>,
    prox_pointer: Vec<u64>,
    payload_length: Vec<i32>,
    offset_length: Vec<i32>,

    last_doc: u32,
    last_child_pointer: u64,
    last_freq_pointer: u64,
    last_prox_pointer: u64,
    last_payload_length: i32,
    last_offset_length: i32,
}

impl SkipReader {
    pub fn new(input: IndexInput, skip_interval: u32, max_skip_levels: u32, version: u32) -> Self {
        let max = max_skip_levels.max(1) as usize;
        let mut level_interval = Vec::with_capacity(max);
        let mut interval = skip_interval as u64;
        for _ in 0..max {
            level_interval.push(interval);
            interval = interval.saturating_mul(skip_interval as u64);
        }
        SkipReader {
            skip_interval,
            max_skip_levels,
            version,
            input,
            doc_count: 0,
            num_levels: 1,
            loaded: false,
            store_payloads: false,
            store_offsets: false,
            streams: vec![None; max],
            skip_pointer: vec![0; max],
            num_skipped: vec![0; max],
            level_interval,
            skip_doc: vec![0; max],
            child_pointer: vec![0; max],
            freq_pointer: vec![0; max],
            prox_pointer: vec![0; max],
            payload_length: vec![0; max],
            offset_length: vec![0; max],
            last_doc: 0,
            last_child_pointer: 0,
            last_freq_pointer: 0,
            last_prox_pointer: 0,
            last_payload_length: 0,
            last_offset_length: 0,
        }
    }

    /// Prepares for skipping over the postings of a term with `doc_count`
    /// documents whose skip data starts at `skip_pointer`. Levels are loaded
    /// lazily on the first [`SkipReader::skip_to`].
    #[allow(clippy::too_many_arguments)]
    pub fn init(
        &mut self,
        skip_pointer: u64,
        freq_base_pointer: u64,
        prox_base_pointer: u64,
        doc_count: u32,
        store_payloads: bool,
        store_offsets: bool,
    ) {
        self.skip_pointer[0] = skip_pointer;
        self.doc_count = doc_count;
        self.store_payloads = store_payloads;
        self.store_offsets = store_offsets;
        self.loaded = false;
        self.skip_doc.fill(0);
        self.num_skipped.fill(0);
        self.child_pointer.fill(0);
        self.freq_pointer.fill(freq_base_pointer);
        self.prox_pointer.fill(prox_base_pointer);
        self.payload_length.fill(0);
        self.offset_length.fill(0);
        self.streams.iter_mut().skip(1).for_each(|s| *s = None);
        self.last_doc = 0;
        self.last_child_pointer = 0;
        self.last_freq_pointer = freq_base_pointer;
        self.last_prox_pointer = prox_base_pointer;
        self.last_payload_length = 0;
        self.last_offset_length = 0;
    }

    /// Last document covered by the entry the reader is positioned on.
    pub fn doc(&self) -> u32 {
        self.last_doc
    }

    pub fn freq_pointer(&self) -> u64 {
        self.last_freq_pointer
    }

    pub fn prox_pointer(&self) -> u64 {
        self.last_prox_pointer
    }

    pub fn payload_length(&self) -> i32 {
        self.last_payload_length
    }

    pub fn offset_length(&self) -> i32 {
        self.last_offset_length
    }

    /// Moves to the last entry covering only documents below `target`.
    ///
    /// Returns the number of postings the caller skips by resuming decoding from
    /// [`SkipReader::freq_pointer`], or 0 when no entry qualifies (the caller
    /// then keeps its position).
    pub fn skip_to(&mut self, target: u32) -> Result<i64> {
        if !self.loaded {
            self.load_levels()?;
            self.loaded = true;
        }

        // Walk up to the highest level that has an entry before the target.
        let mut level = 0;
        while level + 1 < self.num_levels && target > self.skip_doc[level + 1] {
            level += 1;
        }

        loop {
            if target > self.skip_doc[level] {
                if !self.load_next_skip(level)? {
                    continue;
                }
            } else {
                // No more entries before the target on this level: go down.
                if level > 0 {
                    let below = self.stream_pointer(level - 1);
                    if self.last_child_pointer > below {
                        self.seek_child(level - 1)?;
                    }
                }
                if level == 0 {
                    break;
                }
                level -= 1;
            }
        }

        let skipped = (self.num_skipped[0] as i64 - self.skip_interval as i64 - 1).max(0);
        if skipped > 0 {
            log::trace!(
                "skipped to doc {} ({} postings) for target {target}",
                self.last_doc,
                skipped
            );
        }
        Ok(skipped)
    }

    fn stream_pointer(&self, level: usize) -> u64 {
        self.streams[level]
            .as_ref()
            .map_or(0, IndexInput::file_pointer)
    }

    fn stream(&mut self, level: usize) -> &mut IndexInput {
        self.streams[level].get_or_insert_with(|| self.input.clone())
    }

    fn load_next_skip(&mut self, level: usize) -> Result<bool> {
        self.set_last_skip_data(level);

        self.num_skipped[level] += self.level_interval[level];
        if self.num_skipped[level] > self.doc_count as u64 {
            // This level is exhausted.
            self.skip_doc[level] = u32::MAX;
            if self.num_levels > level {
                self.num_levels = level;
            }
            return Ok(false);
        }

        let delta = self.read_skip_data(level)?;
        self.skip_doc[level] = self.skip_doc[level].wrapping_add(delta);

        if level != 0 {
            let pointer = self.stream(level).read_vlong()?;
            self.child_pointer[level] = pointer + self.skip_pointer[level - 1];
        }
        Ok(true)
    }

    fn set_last_skip_data(&mut self, level: usize) {
        self.last_doc = self.skip_doc[level];
        self.last_child_pointer = self.child_pointer[level];
        self.last_freq_pointer = self.freq_pointer[level];
        self.last_prox_pointer = self.prox_pointer[level];
        self.last_payload_length = self.payload_length[level];
        self.last_offset_length = self.offset_length[level];
    }

    fn seek_child(&mut self, level: usize) -> Result<()> {
        let pointer = self.last_child_pointer;
        self.stream(level).seek(pointer)?;
        self.num_skipped[level] =
            self.num_skipped[level + 1].saturating_sub(self.level_interval[level + 1]);
        self.skip_doc[level] = self.last_doc;
        if level > 0 {
            let child = self.stream(level).read_vlong()?;
            self.child_pointer[level] = child + self.skip_pointer[level - 1];
        }
        self.freq_pointer[level] = self.last_freq_pointer;
        self.prox_pointer[level] = self.last_prox_pointer;
        self.payload_length[level] = self.last_payload_length;
        self.offset_length[level] = self.last_offset_length;
        Ok(())
    }

    fn read_skip_data(&mut self, level: usize) -> Result<u32> {
        let store_payloads = self.store_payloads;
        let store_offsets = self.store_offsets;
        let long_pointers = self.version >= VERSION_LONG_SKIP;
        let stream = self.stream(level);

        let delta;
        let mut payload_length = None;
        let mut offset_length = None;
        if store_payloads || store_offsets {
            let code = stream.read_vint()?;
            if code & 1 != 0 {
                if store_payloads {
                    payload_length = Some(stream.read_vint()? as i32);
                }
                if store_offsets {
                    offset_length = Some(stream.read_vint()? as i32);
                }
            }
            delta = code >> 1;
        } else {
            delta = stream.read_vint()?;
        }
        let (freq_delta, prox_delta) = if long_pointers {
            (stream.read_vlong()?, stream.read_vlong()?)
        } else {
            (stream.read_vint()? as u64, stream.read_vint()? as u64)
        };

        if let Some(len) = payload_length {
            self.payload_length[level] = len;
        }
        if let Some(len) = offset_length {
            self.offset_length[level] = len;
        }
        self.freq_pointer[level] += freq_delta;
        self.prox_pointer[level] += prox_delta;
        Ok(delta)
    }

    fn load_levels(&mut self) -> Result<()> {
        self.num_levels = num_skip_levels(self.skip_interval, self.max_skip_levels, self.doc_count);
        let mut base = self.input.clone();
        base.seek(self.skip_pointer[0])?;
        for level in (1..self.num_levels).rev() {
            let length = base.read_vlong()?;
            self.skip_pointer[level] = base.file_pointer();
            self.streams[level] = Some(base.clone());
            base.skip_bytes(length)?;
        }
        self.skip_pointer[0] = base.file_pointer();
        self.streams[0] = Some(base);
        log::trace!(
            "loaded {} skip levels for {} docs at {}",
            self.num_levels,
            self.doc_count,
            self.skip_pointer[0]
        );
        Ok(())
    }
}
