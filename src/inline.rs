//! Fixed-width inline storage for small slot values.
//!
//! Inline slots hold at most [`INLINE_WIDTH`] bytes. A type can be stored
//! inline only if it implements [`Inline`]. The trait is sealed: it is
//! implemented here for the primitive scalars, and each use is checked
//! against the width at compile time, so oversized values are rejected
//! before they can reach a slot.
//!
//! Wider types do not compile:
//!
//! ```compile_fail
//! use proto_table::InlineValue;
//!
//! let v = InlineValue::new(1u128);
//! ```
//!
//! Nor can a downstream crate add its own implementation:
//!
//! ```compile_fail
//! use proto_table::Inline;
//!
//! #[derive(Clone, Copy)]
//! struct Wide(u128);
//!
//! impl Inline for Wide {
//!     const WIDTH: usize = 16;
//!     fn write(self, out: &mut [u8]) {
//!         out.copy_from_slice(&self.0.to_ne_bytes());
//!     }
//!     fn read(bytes: &[u8]) -> Self {
//!         let mut buf = [0u8; 16];
//!         buf.copy_from_slice(bytes);
//!         Wide(u128::from_ne_bytes(buf))
//!     }
//! }
//! ```

use core::fmt;
use core::marker::PhantomData;

/// Maximum width, in bytes, of a value stored inline.
pub const INLINE_WIDTH: usize = 8;

/// Raw inline slot contents. Unused trailing bytes are zero.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct InlineValue([u8; INLINE_WIDTH]);

impl InlineValue {
    pub const ZERO: InlineValue = InlineValue([0; INLINE_WIDTH]);

    pub fn new<T: Inline>(value: T) -> Self {
        let mut slot = Self::ZERO;
        slot.set(value);
        slot
    }

    pub fn from_bytes(bytes: [u8; INLINE_WIDTH]) -> Self {
        InlineValue(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; INLINE_WIDTH] {
        &self.0
    }

    /// Read the slot as `T`. The caller picks `T`; the bytes are not tagged.
    #[inline]
    pub fn get<T: Inline>(&self) -> T {
        T::read(&self.0[..Fits::<T>::WIDTH])
    }

    /// Overwrite the slot with `value`, zeroing any bytes beyond its width.
    #[inline]
    pub fn set<T: Inline>(&mut self, value: T) {
        self.0 = [0; INLINE_WIDTH];
        value.write(&mut self.0[..Fits::<T>::WIDTH]);
    }
}

// Evaluated once per `T` used with a slot; a width over INLINE_WIDTH fails
// the build instead of panicking on the slice.
struct Fits<T>(PhantomData<T>);

impl<T: Inline> Fits<T> {
    const WIDTH: usize = {
        assert!(T::WIDTH <= INLINE_WIDTH, "type too wide for an inline slot");
        T::WIDTH
    };
}

impl fmt::Debug for InlineValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InlineValue({:02x?})", self.0)
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Types that fit in an [`InlineValue`]. Sealed; implemented for the
/// integer and float primitives, `bool` and `char`.
pub trait Inline: sealed::Sealed + Copy + 'static {
    /// Encoded width in bytes; never more than [`INLINE_WIDTH`].
    const WIDTH: usize;

    fn write(self, out: &mut [u8]);
    fn read(bytes: &[u8]) -> Self;
}

macro_rules! impl_inline_ne {
    ($($t:ty),* $(,)?) => {$(
        const _: () = assert!(core::mem::size_of::<$t>() <= INLINE_WIDTH);

        impl sealed::Sealed for $t {}

        impl Inline for $t {
            const WIDTH: usize = core::mem::size_of::<$t>();

            #[inline]
            fn write(self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_ne_bytes());
            }

            #[inline]
            fn read(bytes: &[u8]) -> Self {
                let mut buf = [0u8; core::mem::size_of::<$t>()];
                buf.copy_from_slice(bytes);
                <$t>::from_ne_bytes(buf)
            }
        }
    )*};
}

impl_inline_ne!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f32, f64);

impl sealed::Sealed for bool {}

impl Inline for bool {
    const WIDTH: usize = 1;

    fn write(self, out: &mut [u8]) {
        out[0] = u8::from(self);
    }

    fn read(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

impl sealed::Sealed for char {}

impl Inline for char {
    const WIDTH: usize = 4;

    fn write(self, out: &mut [u8]) {
        u32::from(self).write(out);
    }

    // Slots written as another type may not hold a scalar value.
    fn read(bytes: &[u8]) -> Self {
        char::from_u32(u32::read(bytes)).unwrap_or(char::REPLACEMENT_CHARACTER)
    }
}
