//! Size classes for small allocations.
//!
//! Requests of `1..=MAX_SMALL_BYTES` bytes are rounded up within one of six
//! alignment bands and mapped to one of [`CLASS_COUNT`] classes:
//!
//! | Band            | Alignment | Classes | Block sizes         |
//! |-----------------|-----------|---------|---------------------|
//! | `1..=128`       | 8         | 0..16   | 8, 16, .., 128      |
//! | `129..=256`     | 16        | 16..24  | 144, 160, .., 256   |
//! | `257..=512`     | 32        | 24..32  | 288, 320, .., 512   |
//! | `513..=1024`    | 64        | 32..40  | 576, 640, .., 1024  |
//! | `1025..=2048`   | 128       | 40..48  | 1152, 1280, .., 2048|
//! | `2049..=4096`   | 256       | 48..56  | 2304, 2560, .., 4096|
//!
//! Every block size is a multiple of 8, so every block carved from a
//! 16-byte aligned region is [`BLOCK_ALIGN`]-aligned.

use core::fmt;

/// Requests larger than this bypass the pool entirely.
pub const MAX_SMALL_BYTES: usize = 4096;

/// Number of size classes (and free lists).
pub const CLASS_COUNT: usize = 56;

/// Alignment step of each band, smallest band first.
pub const BAND_ALIGNS: [usize; 6] = [8, 16, 32, 64, 128, 256];

/// Alignment guaranteed for every block handed out by the pool.
pub const BLOCK_ALIGN: usize = BAND_ALIGNS[0];

/// Upper bound (inclusive) of each band.
const BAND_LIMITS: [usize; 6] = [128, 256, 512, 1024, 2048, MAX_SMALL_BYTES];

/// Index of the first class in each band.
const BAND_FIRST_CLASS: [usize; 6] = [0, 16, 24, 32, 40, 48];

const _: () = assert!(BAND_FIRST_CLASS[5] + 8 == CLASS_COUNT);
const _: () = assert!(size_of::<usize>() <= BLOCK_ALIGN);

/// Returns the index of the band containing `bytes`.
///
/// Values above [`MAX_SMALL_BYTES`] belong to the widest band.
const fn band(bytes: usize) -> usize {
    let mut band = 0;
    while band < BAND_LIMITS.len() - 1 && bytes > BAND_LIMITS[band] {
        band += 1;
    }
    band
}

/// Returns the alignment step of the band containing `bytes`.
#[must_use]
pub const fn band_align(bytes: usize) -> usize {
    BAND_ALIGNS[band(bytes)]
}

/// Rounds `bytes` up to the next multiple of its band alignment.
///
/// For `bytes` in `1..=MAX_SMALL_BYTES` this is the block size of the class
/// serving the request. Larger values are rounded to 256 bytes.
///
/// # Examples
///
/// ```
/// use pool_alloc::size_class::round_up;
///
/// assert_eq!(round_up(64), 64);
/// assert_eq!(round_up(200), 208);
/// assert_eq!(round_up(4000), 4096);
/// ```
#[must_use]
pub const fn round_up(bytes: usize) -> usize {
    let align = band_align(bytes);
    (bytes + align - 1) & !(align - 1)
}

/// Maps a request size to its class index.
///
/// # Panics
///
/// Panics if `bytes` is zero or larger than [`MAX_SMALL_BYTES`].
#[must_use]
pub const fn class_index(bytes: usize) -> usize {
    assert!(bytes > 0 && bytes <= MAX_SMALL_BYTES);
    let band = band(bytes);
    let band_start = if band == 0 { 0 } else { BAND_LIMITS[band - 1] };
    let align = BAND_ALIGNS[band];
    BAND_FIRST_CLASS[band] + (bytes - band_start).div_ceil(align) - 1
}

/// Returns the block size served by the class at `index`.
///
/// # Panics
///
/// Panics if `index >= CLASS_COUNT`.
#[must_use]
pub const fn class_size(index: usize) -> usize {
    assert!(index < CLASS_COUNT);
    let mut band = BAND_FIRST_CLASS.len() - 1;
    while BAND_FIRST_CLASS[band] > index {
        band -= 1;
    }
    let band_start = if band == 0 { 0 } else { BAND_LIMITS[band - 1] };
    band_start + (index - BAND_FIRST_CLASS[band] + 1) * BAND_ALIGNS[band]
}

/// A size class served by its own free list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SizeClass(u8);

const _: () = assert!(CLASS_COUNT <= u8::MAX as usize);

impl SizeClass {
    /// The smallest class (8-byte blocks).
    pub const MIN: Self = Self(0);
    /// The largest class (`MAX_SMALL_BYTES`-byte blocks).
    #[expect(clippy::cast_possible_truncation)]
    pub const MAX: Self = Self((CLASS_COUNT - 1) as u8);

    /// Returns the class serving requests of `bytes` bytes.
    ///
    /// Returns `None` for zero-sized requests and for requests larger than
    /// [`MAX_SMALL_BYTES`], which are not served by the pool.
    #[must_use]
    pub const fn for_size(bytes: usize) -> Option<Self> {
        if bytes == 0 || bytes > MAX_SMALL_BYTES {
            return None;
        }
        Self::from_index(class_index(bytes))
    }

    /// Returns the class at `index`, if it exists.
    #[must_use]
    #[expect(clippy::cast_possible_truncation)]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index >= CLASS_COUNT {
            return None;
        }
        Some(Self(index as u8))
    }

    /// Returns the largest class whose blocks fit in `bytes` bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use pool_alloc::size_class::SizeClass;
    ///
    /// assert_eq!(SizeClass::largest_fitting(200).unwrap().block_size(), 192);
    /// assert_eq!(SizeClass::largest_fitting(9000), Some(SizeClass::MAX));
    /// assert_eq!(SizeClass::largest_fitting(7), None);
    /// ```
    #[must_use]
    pub const fn largest_fitting(bytes: usize) -> Option<Self> {
        if bytes < BLOCK_ALIGN {
            return None;
        }
        if bytes >= MAX_SMALL_BYTES {
            return Some(Self::MAX);
        }
        let index = class_index(bytes);
        if class_size(index) == bytes {
            Self::from_index(index)
        } else {
            // The class below always has a block size smaller than `bytes`
            // because `bytes >= 8` and `class_size(0) == 8`.
            Self::from_index(index - 1)
        }
    }

    /// Returns the index of this class in the free-list table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the size of every block in this class.
    #[must_use]
    pub const fn block_size(self) -> usize {
        class_size(self.index())
    }

    /// Returns the next larger class, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    /// Iterates over all classes in increasing block size order.
    #[expect(clippy::cast_possible_truncation)]
    pub fn iter() -> impl DoubleEndedIterator<Item = Self> + ExactSizeIterator {
        (0..CLASS_COUNT).map(|index| Self(index as u8))
    }

    /// Iterates over this class and every larger class.
    pub fn and_larger(self) -> impl Iterator<Item = Self> {
        (self.index()..CLASS_COUNT).filter_map(Self::from_index)
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class {} ({} bytes)", self.0, self.block_size())
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_band_align() {
        assert_eq!(band_align(1), 8);
        assert_eq!(band_align(128), 8);
        assert_eq!(band_align(129), 16);
        assert_eq!(band_align(256), 16);
        assert_eq!(band_align(257), 32);
        assert_eq!(band_align(512), 32);
        assert_eq!(band_align(513), 64);
        assert_eq!(band_align(1024), 64);
        assert_eq!(band_align(1025), 128);
        assert_eq!(band_align(2048), 128);
        assert_eq!(band_align(2049), 256);
        assert_eq!(band_align(4096), 256);
        assert_eq!(band_align(1 << 20), 256);
    }

    #[test]
    fn test_round_up() {
        assert_eq!(round_up(0), 0);
        assert_eq!(round_up(1), 8);
        assert_eq!(round_up(8), 8);
        assert_eq!(round_up(9), 16);
        assert_eq!(round_up(64), 64);
        assert_eq!(round_up(100), 104);
        assert_eq!(round_up(129), 144);
        assert_eq!(round_up(200), 208);
        assert_eq!(round_up(257), 288);
        assert_eq!(round_up(1000), 1024);
        assert_eq!(round_up(1025), 1152);
        assert_eq!(round_up(2049), 2304);
        assert_eq!(round_up(4095), 4096);
        assert_eq!(round_up(4097), 4352);
    }

    #[test]
    fn test_class_index_boundaries() {
        assert_eq!(class_index(1), 0);
        assert_eq!(class_index(8), 0);
        assert_eq!(class_index(9), 1);
        assert_eq!(class_index(128), 15);
        assert_eq!(class_index(129), 16);
        assert_eq!(class_index(256), 23);
        assert_eq!(class_index(257), 24);
        assert_eq!(class_index(512), 31);
        assert_eq!(class_index(513), 32);
        assert_eq!(class_index(1024), 39);
        assert_eq!(class_index(1025), 40);
        assert_eq!(class_index(2048), 47);
        assert_eq!(class_index(2049), 48);
        assert_eq!(class_index(4096), 55);
    }

    #[test]
    fn test_class_size_is_inverse() {
        for index in 0..CLASS_COUNT {
            let size = class_size(index);
            assert_eq!(class_index(size), index);
            assert!(size.is_multiple_of(band_align(size)));
        }
        assert_eq!(class_size(0), 8);
        assert_eq!(class_size(16), 144);
        assert_eq!(class_size(CLASS_COUNT - 1), MAX_SMALL_BYTES);
    }

    #[test]
    fn test_class_sizes_strictly_increase() {
        let sizes = SizeClass::iter().map(SizeClass::block_size);
        let mut prev = 0;
        for size in sizes {
            assert!(size > prev);
            prev = size;
        }
        assert_eq!(SizeClass::iter().len(), CLASS_COUNT);
    }

    #[test]
    fn test_for_size() {
        assert_eq!(SizeClass::for_size(0), None);
        assert_eq!(SizeClass::for_size(4097), None);
        assert_eq!(SizeClass::for_size(1), Some(SizeClass::MIN));
        assert_eq!(SizeClass::for_size(4096), Some(SizeClass::MAX));
        assert_eq!(SizeClass::for_size(200).unwrap().block_size(), 208);
    }

    #[test]
    fn test_largest_fitting() {
        assert_eq!(SizeClass::largest_fitting(0), None);
        assert_eq!(SizeClass::largest_fitting(8), Some(SizeClass::MIN));
        assert_eq!(SizeClass::largest_fitting(15).unwrap().block_size(), 8);
        assert_eq!(SizeClass::largest_fitting(136).unwrap().block_size(), 128);
        assert_eq!(SizeClass::largest_fitting(144).unwrap().block_size(), 144);
        assert_eq!(SizeClass::largest_fitting(4088).unwrap().block_size(), 3840);
    }

    #[test]
    fn test_next_and_larger() {
        assert_eq!(SizeClass::MIN.next().unwrap().block_size(), 16);
        assert_eq!(SizeClass::MAX.next(), None);
        assert_eq!(SizeClass::MAX.and_larger().count(), 1);
        assert_eq!(SizeClass::MIN.and_larger().count(), CLASS_COUNT);
    }

    #[test]
    fn test_display() {
        let class = SizeClass::for_size(64).unwrap();
        assert_eq!(format!("{class}"), "class 7 (64 bytes)");
    }

    proptest! {
        #[test]
        fn round_up_is_monotonic(a in 1..=MAX_SMALL_BYTES, b in 1..=MAX_SMALL_BYTES) {
            let (a, b) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(round_up(a) <= round_up(b));
            prop_assert!(class_index(a) <= class_index(b));
        }

        #[test]
        fn round_up_matches_class(bytes in 1..=MAX_SMALL_BYTES) {
            let class = SizeClass::for_size(bytes).unwrap();
            prop_assert_eq!(class.block_size(), round_up(bytes));
            prop_assert!(class.block_size() >= bytes);
            prop_assert!(class.block_size().is_multiple_of(BLOCK_ALIGN));
            prop_assert!(class.block_size() - bytes < band_align(bytes));
        }

        #[test]
        fn largest_fitting_fits(bytes in BLOCK_ALIGN..=MAX_SMALL_BYTES) {
            let class = SizeClass::largest_fitting(bytes).unwrap();
            prop_assert!(class.block_size() <= bytes);
            if let Some(next) = class.next() {
                prop_assert!(next.block_size() > bytes);
            }
        }
    }
}
