use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::ffi::OsString;
use std::mem;
use std::path::Path;
use std::path::PathBuf;

use crate::Addr;
use crate::AddrRange;


/// Source code location information for a range of addresses, as
/// recorded in a compile unit's line table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineEntry {
    /// The directory in which the source file resides.
    pub dir: Option<PathBuf>,
    /// The file whose compiled code covers the entry's address range.
    pub file: OsString,
    /// The line number of the covered instructions, if known.
    ///
    /// This is the line number of the instructions covered by the
    /// entry, not the line number defining the enclosing function.
    pub line: Option<u32>,
    /// The column number of the covered instructions, if known.
    pub column: Option<u16>,
    /// The address range covered by the entry.
    pub range: AddrRange,
    /// The struct is non-exhaustive and open to extension.
    #[doc(hidden)]
    pub(crate) _non_exhaustive: (),
}

impl LineEntry {
    /// Check whether the entry carries any information.
    ///
    /// An entry that does not name a file is considered absent.
    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.file.is_empty()
    }

    /// Helper method to retrieve the path to the represented source
    /// file, on a best-effort basis. Whether this path is absolute or
    /// relative depends on the data the line table was built from. In
    /// general this path is mostly intended for displaying purposes.
    #[inline]
    pub fn to_path(&self) -> Cow<'_, Path> {
        self.dir.as_ref().map_or_else(
            || Cow::Borrowed(Path::new(&self.file)),
            |dir| Cow::Owned(dir.join(&self.file)),
        )
    }
}


#[derive(Clone, Debug)]
pub(crate) struct LineRow {
    pub(crate) address: Addr,
    pub(crate) file_index: usize,
    /// The row's line number, with `0` meaning that no line information
    /// is available.
    pub(crate) line: u32,
    pub(crate) column: u16,
}


#[derive(Clone, Debug)]
pub(crate) struct LineSequence {
    pub(crate) start: Addr,
    pub(crate) end: Addr,
    pub(crate) rows: Box<[LineRow]>,
}


#[derive(Clone, Debug, Default)]
pub(crate) struct LineTable {
    /// Interned source file names referenced by rows.
    pub(crate) files: Box<[(Option<PathBuf>, OsString)]>,
    /// Line sequences, sorted by start address.
    pub(crate) sequences: Box<[LineSequence]>,
}

impl LineTable {
    /// Find the line entry covering `probe`.
    ///
    /// Within a sequence the row at or before the probe applies; gaps
    /// between sequences are not covered by any entry.
    pub(crate) fn find_entry(&self, probe: Addr) -> Option<LineEntry> {
        let seq_idx = self
            .sequences
            .binary_search_by(|sequence| {
                if probe < sequence.start {
                    Ordering::Greater
                } else if probe >= sequence.end {
                    Ordering::Less
                } else {
                    Ordering::Equal
                }
            })
            .ok()?;
        let sequence = &self.sequences[seq_idx];

        let idx = sequence
            .rows
            .binary_search_by(|row| row.address.cmp(&probe));
        let idx = match idx {
            Ok(x) => x,
            Err(0) => return None,
            Err(x) => x - 1,
        };
        let row = &sequence.rows[idx];
        let end = sequence
            .rows
            .get(idx + 1)
            .map(|next| next.address)
            .unwrap_or(sequence.end);
        // SANITY: Rows only ever reference interned files.
        let (dir, file) = self.files.get(row.file_index).unwrap();

        Some(LineEntry {
            dir: dir.clone(),
            file: file.clone(),
            line: (row.line != 0).then_some(row.line),
            // If the line is specified then the column always has
            // meaning as well.
            column: if row.line != 0 { Some(row.column) } else { None },
            range: AddrRange::new(row.address, end),
            _non_exhaustive: (),
        })
    }
}


/// Accumulator for a compile unit's line table, fed row by row the way
/// a line program emits them.
#[derive(Debug, Default)]
pub(crate) struct LineTableBuilder {
    files: Vec<(Option<PathBuf>, OsString)>,
    indexes: HashMap<PathBuf, usize>,
    sequence_rows: Vec<LineRow>,
    sequences: Vec<LineSequence>,
}

impl LineTableBuilder {
    /// Append a row to the current sequence. Rows are expected in
    /// ascending address order; a row at the address of the previous
    /// one overwrites it.
    pub(crate) fn row(&mut self, addr: Addr, file: &Path, line: u32, column: u16) {
        let file_index = self.intern(file);
        if let Some(last) = self.sequence_rows.last_mut() {
            debug_assert!(last.address <= addr, "{:#x} > {addr:#x}", last.address);
            if last.address == addr {
                *last = LineRow {
                    address: addr,
                    file_index,
                    line,
                    column,
                };
                return
            }
        }

        self.sequence_rows.push(LineRow {
            address: addr,
            file_index,
            line,
            column,
        });
    }

    /// Terminate the current sequence at `addr` (exclusive).
    pub(crate) fn end_sequence(&mut self, addr: Addr) {
        if let Some(start) = self.sequence_rows.first().map(|row| row.address) {
            let rows = mem::take(&mut self.sequence_rows);
            self.sequences.push(LineSequence {
                start,
                end: addr,
                rows: rows.into_boxed_slice(),
            });
        }
    }

    fn intern(&mut self, file: &Path) -> usize {
        if let Some(idx) = self.indexes.get(file) {
            return *idx
        }

        let dir = file
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf);
        let name = file.file_name().unwrap_or(OsStr::new("")).to_os_string();
        let idx = self.files.len();
        self.files.push((dir, name));
        let _prev = self.indexes.insert(file.to_path_buf(), idx);
        idx
    }

    /// Finalize the table, rebasing all addresses by `bias`. Rows
    /// handed in without a terminating `end_sequence` are discarded.
    pub(crate) fn build(self, bias: Addr) -> LineTable {
        let Self {
            files,
            indexes: _,
            sequence_rows: _,
            mut sequences,
        } = self;

        for sequence in sequences.iter_mut() {
            sequence.start += bias;
            sequence.end += bias;
            for row in sequence.rows.iter_mut() {
                row.address += bias;
            }
        }
        sequences.sort_by_key(|sequence| sequence.start);

        LineTable {
            files: files.into_boxed_slice(),
            sequences: sequences.into_boxed_slice(),
        }
    }
}
