//! Multi-bit four-state logic values.
//!
//! A [`Value`] is an immutable vector of up to 64 bits where each bit is
//! `0`, `1`, unknown (`x`), or error (`E`). It is stored as three masks
//! normalised so that every bit is in exactly one state, which makes
//! structural equality the same as logical equality.
//!
//! [`Value::combine`] resolves several drivers of the same point. It is
//! commutative and associative: a bit is an error if any driver asserts an
//! error or two drivers assert different known levels; otherwise it takes
//! the single known level, and is unknown only if every driver is unknown.

use std::fmt;

/// The state of a single bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Bit {
    /// Logic low.
    Zero,
    /// Logic high.
    One,
    /// Not driven, or driven with an unknown level.
    Unknown,
    /// Conflicting drivers.
    Error,
}

impl Bit {
    /// Convert a boolean level.
    pub fn from_bool(level: bool) -> Self {
        if level {
            Self::One
        } else {
            Self::Zero
        }
    }

    /// Single-character rendering: `0`, `1`, `x`, `E`.
    pub fn as_char(self) -> char {
        match self {
            Self::Zero => '0',
            Self::One => '1',
            Self::Unknown => 'x',
            Self::Error => 'E',
        }
    }
}

/// Width of a [`Value`] in bits, `0..=64`.
///
/// Width zero is reserved for [`Value::NIL`], the "nothing driven" value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BitWidth(u8);

impl BitWidth {
    /// Largest supported width.
    pub const MAX_BITS: u8 = 64;
    /// Zero width (nil).
    pub const ZERO: BitWidth = BitWidth(0);
    /// Single bit.
    pub const ONE: BitWidth = BitWidth(1);

    /// Create a width, returning `None` above [`BitWidth::MAX_BITS`].
    pub fn new(bits: u8) -> Option<Self> {
        (bits <= Self::MAX_BITS).then_some(Self(bits))
    }

    /// Number of bits.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Mask with the low `bits()` bits set.
    pub fn mask(self) -> u64 {
        if self.0 >= Self::MAX_BITS {
            u64::MAX
        } else {
            (1u64 << self.0) - 1
        }
    }
}

impl fmt::Display for BitWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable multi-bit logic value.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Value {
    width: BitWidth,
    value: u64,
    unknown: u64,
    error: u64,
}

impl Value {
    /// Zero-width value: nothing is driving the point.
    pub const NIL: Value = Value {
        width: BitWidth::ZERO,
        value: 0,
        unknown: 0,
        error: 0,
    };
    /// Single-bit logic low.
    pub const FALSE: Value = Value {
        width: BitWidth::ONE,
        value: 0,
        unknown: 0,
        error: 0,
    };
    /// Single-bit logic high.
    pub const TRUE: Value = Value {
        width: BitWidth::ONE,
        value: 1,
        unknown: 0,
        error: 0,
    };
    /// Single-bit unknown.
    pub const UNKNOWN: Value = Value {
        width: BitWidth::ONE,
        value: 0,
        unknown: 1,
        error: 0,
    };
    /// Single-bit error.
    pub const ERROR: Value = Value {
        width: BitWidth::ONE,
        value: 0,
        unknown: 0,
        error: 1,
    };

    fn normalized(width: BitWidth, value: u64, unknown: u64, error: u64) -> Self {
        let mask = width.mask();
        let error = error & mask;
        let unknown = unknown & mask & !error;
        let value = value & mask & !error & !unknown;
        Self {
            width,
            value,
            unknown,
            error,
        }
    }

    /// A fully defined value; bits above `width` are discarded.
    pub fn known(width: BitWidth, bits: u64) -> Self {
        Self::normalized(width, bits, 0, 0)
    }

    /// A value whose every bit is unknown.
    pub fn unknown(width: BitWidth) -> Self {
        Self::normalized(width, 0, u64::MAX, 0)
    }

    /// A value whose every bit is an error.
    pub fn error(width: BitWidth) -> Self {
        Self::normalized(width, 0, 0, u64::MAX)
    }

    /// Single-bit value from a [`Bit`].
    pub fn from_bit(bit: Bit) -> Self {
        match bit {
            Bit::Zero => Self::FALSE,
            Bit::One => Self::TRUE,
            Bit::Unknown => Self::UNKNOWN,
            Bit::Error => Self::ERROR,
        }
    }

    /// Build a value from bits, least significant first.
    ///
    /// Bits beyond [`BitWidth::MAX_BITS`] are ignored.
    pub fn from_bits(bits: &[Bit]) -> Self {
        let count = bits.len().min(BitWidth::MAX_BITS as usize);
        let (mut value, mut unknown, mut error) = (0u64, 0u64, 0u64);
        for (i, bit) in bits.iter().take(count).enumerate() {
            match bit {
                Bit::Zero => {}
                Bit::One => value |= 1 << i,
                Bit::Unknown => unknown |= 1 << i,
                Bit::Error => error |= 1 << i,
            }
        }
        Self::normalized(BitWidth(count as u8), value, unknown, error)
    }

    /// Width in bits.
    pub fn width(&self) -> BitWidth {
        self.width
    }

    /// Whether this is the zero-width nil value.
    pub fn is_nil(&self) -> bool {
        self.width.0 == 0
    }

    /// State of bit `index`. Bits outside the width read as unknown.
    pub fn bit(&self, index: u8) -> Bit {
        if index >= self.width.0 {
            return Bit::Unknown;
        }
        let m = 1u64 << index;
        if self.error & m != 0 {
            Bit::Error
        } else if self.unknown & m != 0 {
            Bit::Unknown
        } else if self.value & m != 0 {
            Bit::One
        } else {
            Bit::Zero
        }
    }

    /// All bits, least significant first.
    pub fn bits(&self) -> Vec<Bit> {
        (0..self.width.0).map(|i| self.bit(i)).collect()
    }

    /// Every bit is `0` or `1` (nil is not fully defined).
    pub fn is_fully_defined(&self) -> bool {
        !self.is_nil() && self.unknown == 0 && self.error == 0
    }

    /// Every bit is unknown (nil is not unknown).
    pub fn is_unknown(&self) -> bool {
        !self.is_nil() && self.unknown == self.width.mask()
    }

    /// At least one bit is an error.
    pub fn has_error(&self) -> bool {
        self.error != 0
    }

    /// The integer value, if every bit is defined.
    pub fn to_u64(&self) -> Option<u64> {
        self.is_fully_defined().then_some(self.value)
    }

    /// Widen (or narrow) to `width`; added bits are unknown.
    pub fn extend_to(&self, width: BitWidth) -> Self {
        let added = width.mask() & !self.width.mask();
        Self::normalized(width, self.value, self.unknown | added, self.error)
    }

    /// Resolve two drivers of the same point.
    ///
    /// Nil is the identity. Values of different widths are compared after
    /// widening the narrower one with unknown bits.
    pub fn combine(&self, other: &Value) -> Value {
        if self.is_nil() {
            return *other;
        }
        if other.is_nil() {
            return *self;
        }
        let width = self.width.max(other.width);
        let a = self.extend_to(width);
        let b = other.extend_to(width);
        let disagree = (a.value ^ b.value) & !(a.unknown | b.unknown);
        Self::normalized(
            width,
            a.value | b.value,
            a.unknown & b.unknown,
            a.error | b.error | disagree,
        )
    }

    /// Bitwise inversion; unknown and error bits are preserved.
    pub fn not(&self) -> Value {
        Self::normalized(self.width, !self.value, self.unknown, self.error)
    }

    /// Bitwise AND. A known `0` dominates every other state.
    pub fn and(&self, other: &Value) -> Value {
        let width = self.width.max(other.width);
        let a = self.extend_to(width);
        let b = other.extend_to(width);
        let zeros = (a.known_zeros() | b.known_zeros()) & width.mask();
        let error = (a.error | b.error) & !zeros;
        let unknown = (a.unknown | b.unknown) & !zeros & !error;
        Self::normalized(width, a.value & b.value, unknown, error)
    }

    /// Bitwise OR. A known `1` dominates every other state.
    pub fn or(&self, other: &Value) -> Value {
        let width = self.width.max(other.width);
        let a = self.extend_to(width);
        let b = other.extend_to(width);
        let ones = a.value | b.value;
        let error = (a.error | b.error) & !ones;
        let unknown = (a.unknown | b.unknown) & !ones & !error;
        Self::normalized(width, ones, unknown, error)
    }

    fn known_zeros(&self) -> u64 {
        self.width.mask() & !(self.value | self.unknown | self.error)
    }
}

impl From<bool> for Value {
    fn from(level: bool) -> Self {
        if level {
            Self::TRUE
        } else {
            Self::FALSE
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            return write!(f, "-");
        }
        for i in (0..self.width.0).rev() {
            write!(f, "{}", self.bit(i).as_char())?;
        }
        Ok(())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({self})")
    }
}
