//! Fixed-Size Sample Window with Running Sum
//!
//! ## Overview
//!
//! Each measured quantity keeps the last `N` raw readings in a ring buffer
//! and a running sum of those readings. The moving average is then a single
//! division instead of an `O(N)` pass on every publish.
//!
//! ## Design Rationale
//!
//! ### Why a Ring Buffer?
//!
//! The window slides by one reading per poll tick. A ring buffer gives:
//! - O(1) insertion (overwrites the oldest slot when full)
//! - O(1) mean (running sum divided by length)
//! - Zero heap allocations, storage sized by a const generic
//!
//! ### Evict, Then Insert
//!
//! When the window is full, the slot at `write_pos` holds the oldest
//! reading. `push()` subtracts that value from the sum *before* the slot is
//! overwritten, so the sum always tracks exactly the readings held:
//!
//! ```text
//! SampleWindow<4>, full, write_pos = 1
//! ┌──────┬──────┬──────┬──────┐
//! │  E   │  B   │  C   │  D   │   sum = E + B + C + D
//! └──────┴──────┴──────┴──────┘
//!           ↑ oldest
//!
//! push(F):  sum -= B;  slot[1] = F;  sum += F;  write_pos = 2
//! ```
//!
//! ## Usage Example
//!
//! ```rust
//! use weatherguard_core::window::SampleWindow;
//!
//! let mut window = SampleWindow::<3>::new();
//! window.push(1.0);
//! window.push(2.0);
//! window.push(3.0);
//! assert!(window.is_full());
//! assert_eq!(window.mean(), Some(2.0));
//!
//! // The fourth reading evicts the first
//! window.push(7.0);
//! assert_eq!(window.sum(), 12.0);
//! ```

use crate::constants::WINDOW_CAPACITY;

/// Ring buffer of raw readings with an incrementally maintained sum
///
/// ## Type Parameter
///
/// - `N`: The maximum number of readings held. Defaults to
///   [`WINDOW_CAPACITY`].
///
/// ## Internal Invariants
///
/// - `write_pos < N`
/// - `len <= N`
/// - `sum` equals the sum of the `len` readings currently held
///
/// ## Thread Safety
///
/// Not designed for concurrent access. Each window has exactly one owner,
/// its `MeasurementChannel`.
#[derive(Debug, Clone)]
pub struct SampleWindow<const N: usize = WINDOW_CAPACITY> {
    /// Reading storage; slots past `len` are unused until the first wrap
    data: [f64; N],

    /// Index where the next write will occur
    write_pos: usize,

    /// Current number of valid readings
    len: usize,

    /// Sum of the readings currently held
    sum: f64,
}

impl<const N: usize> SampleWindow<N> {
    /// Creates an empty window
    pub const fn new() -> Self {
        Self {
            data: [0.0; N],
            write_pos: 0,
            len: 0,
            sum: 0.0,
        }
    }

    /// Adds a reading, evicting the oldest one first when the window is full
    pub fn push(&mut self, reading: f64) {
        if self.len == N {
            self.sum -= self.data[self.write_pos];
        } else {
            self.len += 1;
        }

        self.data[self.write_pos] = reading;
        self.sum += reading;
        self.write_pos = (self.write_pos + 1) % N;
    }

    /// Arithmetic mean of the held readings, `None` when empty
    ///
    /// Only the mean of a full window is ever published.
    pub fn mean(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }

        Some(self.sum / self.len as f64)
    }

    /// Running sum of the held readings
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Number of held readings
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the window holds no readings
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if the window holds `N` readings
    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Maximum number of readings held
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Most recent reading
    pub fn last(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }

        let idx = if self.write_pos == 0 { N - 1 } else { self.write_pos - 1 };
        Some(self.data[idx])
    }

    /// Iterate over readings from oldest to newest
    pub fn iter(&self) -> SampleWindowIter<'_, N> {
        SampleWindowIter {
            window: self,
            index: 0,
        }
    }

    /// Reading by logical index (0 = oldest, len-1 = newest)
    ///
    /// Before the first wrap the data starts at slot 0. Once full, the
    /// oldest reading sits at `write_pos`:
    ///
    /// ```text
    /// Physical:  [D, E, A, B, C]  (write_pos = 2)
    /// Logical:   [A, B, C, D, E]
    /// ```
    fn get(&self, index: usize) -> Option<f64> {
        if index >= self.len {
            return None;
        }

        let actual_index = if self.len < N {
            index
        } else {
            (self.write_pos + index) % N
        };

        Some(self.data[actual_index])
    }
}

/// Iterator over window contents, oldest first
pub struct SampleWindowIter<'a, const N: usize> {
    window: &'a SampleWindow<N>,
    index: usize,
}

impl<'a, const N: usize> Iterator for SampleWindowIter<'a, N> {
    type Item = f64;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.window.get(self.index)?;
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.window.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl<const N: usize> Default for SampleWindow<N> {
    fn default() -> Self {
        Self::new()
    }
}
