use quarry_common::Result;
use quarry_io::{IndexOutput, output::DataOutput};

use super::num_skip_levels;

/// Buffers the skip levels of the term being written and appends them to the
/// frequency stream when the term is finished.
#[derive(Debug)]
pub struct SkipWriter {
    skip_interval: u32,
    num_levels: usize,
    levels: Vec<Vec<u8>>,

    // Values of the entry about to be buffered.
    cur_doc: u32,
    cur_payload_length: i32,
    cur_offset_length: i32,
    cur_freq_pointer: u64,
    cur_prox_pointer: u64,
    store_payloads: bool,
    store_offsets: bool,

    // Values of the last entry written to each level.
    last_doc: Vec<u32>,
    last_payload_length: Vec<i32>,
    last_offset_length: Vec<i32>,
    last_freq_pointer: Vec<u64>,
    last_prox_pointer: Vec<u64>,
}

impl SkipWriter {
    /// Creates a writer for a segment of `max_doc` documents. The level count is
    /// the largest any term of the segment can need.
    pub fn new(skip_interval: u32, max_skip_levels: u32, max_doc: u32) -> SkipWriter {
        let num_levels = num_skip_levels(skip_interval, max_skip_levels, max_doc);
        SkipWriter {
            skip_interval,
            num_levels,
            levels: vec![Vec::new(); num_levels],
            cur_doc: 0,
            cur_payload_length: 0,
            cur_offset_length: 0,
            cur_freq_pointer: 0,
            cur_prox_pointer: 0,
            store_payloads: false,
            store_offsets: false,
            last_doc: vec![0; num_levels],
            last_payload_length: vec![-1; num_levels],
            last_offset_length: vec![-1; num_levels],
            last_freq_pointer: vec![0; num_levels],
            last_prox_pointer: vec![0; num_levels],
        }
    }

    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    /// Clears the buffered levels at the start of a term whose postings begin at
    /// the given stream pointers.
    pub fn reset(&mut self, freq_pointer: u64, prox_pointer: u64) {
        for level in &mut self.levels {
            level.clear();
        }
        self.last_doc.fill(0);
        self.last_payload_length.fill(-1);
        self.last_offset_length.fill(-1);
        self.last_freq_pointer.fill(freq_pointer);
        self.last_prox_pointer.fill(prox_pointer);
    }

    /// Records the values of the next entry. `doc` is the last document written
    /// before the entry.
    #[allow(clippy::too_many_arguments)]
    pub fn set_skip_data(
        &mut self,
        doc: u32,
        store_payloads: bool,
        payload_length: i32,
        store_offsets: bool,
        offset_length: i32,
        freq_pointer: u64,
        prox_pointer: u64,
    ) {
        self.cur_doc = doc;
        self.store_payloads = store_payloads;
        self.cur_payload_length = payload_length;
        self.store_offsets = store_offsets;
        self.cur_offset_length = offset_length;
        self.cur_freq_pointer = freq_pointer;
        self.cur_prox_pointer = prox_pointer;
    }

    /// Buffers the entry recorded by `set_skip_data` after `df` documents of the
    /// term. `df` must be a multiple of the skip interval.
    pub fn buffer_skip(&mut self, df: u32) -> Result<()> {
        debug_assert_eq!(df % self.skip_interval, 0);
        let mut num_levels = 1;
        let mut df = df / self.skip_interval;
        while df % self.skip_interval == 0 && num_levels < self.num_levels {
            num_levels += 1;
            df /= self.skip_interval;
        }

        let mut child_pointer = 0u64;
        for level in 0..num_levels {
            self.write_skip_data(level)?;
            let new_child_pointer = self.levels[level].len() as u64;
            if level != 0 {
                self.levels[level].write_vlong(child_pointer)?;
            }
            child_pointer = new_child_pointer;
        }
        Ok(())
    }

    fn write_skip_data(&mut self, level: usize) -> Result<()> {
        let delta = self.cur_doc - self.last_doc[level];
        let buf = &mut self.levels[level];
        if self.store_payloads || self.store_offsets {
            if self.cur_payload_length == self.last_payload_length[level]
                && self.cur_offset_length == self.last_offset_length[level]
            {
                buf.write_vint(delta << 1)?;
            } else {
                buf.write_vint((delta << 1) | 1)?;
                if self.store_payloads {
                    buf.write_vint(self.cur_payload_length as u32)?;
                    self.last_payload_length[level] = self.cur_payload_length;
                }
                if self.store_offsets {
                    buf.write_vint(self.cur_offset_length as u32)?;
                    self.last_offset_length[level] = self.cur_offset_length;
                }
            }
        } else {
            buf.write_vint(delta)?;
        }
        buf.write_vlong(self.cur_freq_pointer - self.last_freq_pointer[level])?;
        buf.write_vlong(self.cur_prox_pointer - self.last_prox_pointer[level])?;

        self.last_doc[level] = self.cur_doc;
        self.last_freq_pointer[level] = self.cur_freq_pointer;
        self.last_prox_pointer[level] = self.cur_prox_pointer;
        Ok(())
    }

    /// Appends the buffered levels to `out` and returns the pointer where they
    /// start. Writes nothing when no entry was buffered.
    pub fn write_skip(&mut self, out: &mut IndexOutput) -> Result<u64> {
        let skip_pointer = out.file_pointer();
        if self.levels.first().is_none_or(Vec::is_empty) {
            return Ok(skip_pointer);
        }
        for level in (1..self.num_levels).rev() {
            let buf = &self.levels[level];
            if !buf.is_empty() {
                out.write_vlong(buf.len() as u64)?;
                out.write_bytes(buf)?;
            }
        }
        out.write_bytes(&self.levels[0])?;
        log::trace!(
            "wrote skip data at {skip_pointer}: {} bytes in level 0",
            self.levels[0].len()
        );
        Ok(skip_pointer)
    }
}
