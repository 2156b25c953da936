//! Growable word-addressed memory backing a machine's code and data.

use crate::vm::errors::ExecError;

/// Number of cells a machine's memory is pre-sized to by default.
///
/// Programs routinely address well past their own length; pre-sizing keeps
/// the common case free of reallocation.
pub const DEFAULT_MEMORY: usize = 4096;

/// A mutable, growable array of signed 64-bit words addressed from zero.
///
/// Both code and data live here: programs freely overwrite their own
/// instructions. Reads and writes past the current length extend the store
/// with zero-filled cells; the store never shrinks. Negative addresses are
/// fatal. Memory is owned by exactly one machine and never shared between
/// instances.
#[derive(Debug, Clone)]
pub struct Memory {
    cells: Vec<i64>,
}

impl Memory {
    /// Creates a store holding `image` at address zero, zero-padded to at
    /// least `min_cells` cells.
    pub fn new(image: &[i64], min_cells: usize) -> Self {
        let mut cells = vec![0; image.len().max(min_cells)];
        cells[..image.len()].copy_from_slice(image);
        Self { cells }
    }

    /// Reads the word at `addr`, extending the store if `addr` is past the
    /// current length.
    ///
    /// Returns [`ExecError::NegativeAddress`] if `addr` is below zero.
    pub fn read(&mut self, addr: i64) -> Result<i64, ExecError> {
        let idx = self.index(addr)?;
        Ok(self.cells[idx])
    }

    /// Writes `value` at `addr`, extending the store if `addr` is past the
    /// current length.
    ///
    /// Returns [`ExecError::NegativeAddress`] if `addr` is below zero.
    pub fn write(&mut self, addr: i64, value: i64) -> Result<(), ExecError> {
        let idx = self.index(addr)?;
        self.cells[idx] = value;
        Ok(())
    }

    /// Validates `addr` and grows the backing store to cover it.
    fn index(&mut self, addr: i64) -> Result<usize, ExecError> {
        if addr < 0 {
            return Err(ExecError::NegativeAddress { addr });
        }
        let idx = addr as usize;
        if idx >= self.cells.len() {
            self.cells.resize(idx + 1, 0);
        }
        Ok(idx)
    }

    /// The current contents as a flat slice.
    pub fn cells(&self) -> &[i64] {
        &self.cells
    }

    /// Number of cells currently allocated.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no cells are allocated.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
