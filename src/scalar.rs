//! Element datatypes.
//!
//! Buffers carry a runtime [`DataType`] tag; host-side element types implement
//! [`Scalar`], which ties a Rust type to its tag.

use std::fmt;

/// Runtime element type of a backend buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl DataType {
    /// Size of one element in bytes.
    pub fn size_of(self) -> usize {
        match self {
            DataType::I8 | DataType::U8 => 1,
            DataType::I16 | DataType::U16 => 2,
            DataType::I32 | DataType::U32 | DataType::F32 => 4,
            DataType::I64 | DataType::U64 | DataType::F64 => 8,
        }
    }

    /// Whether this is an integer type (usable for index tensors).
    pub fn is_integer(self) -> bool {
        !self.is_float()
    }

    /// Whether this is a floating point type.
    pub fn is_float(self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::I8 => "i8",
            DataType::U8 => "u8",
            DataType::I16 => "i16",
            DataType::U16 => "u16",
            DataType::I32 => "i32",
            DataType::U32 => "u32",
            DataType::I64 => "i64",
            DataType::U64 => "u64",
            DataType::F32 => "f32",
            DataType::F64 => "f64",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Marker trait for host element types that can be moved in and out of buffers.
pub trait Scalar:
    Copy
    + Clone
    + Send
    + Sync
    + Default
    + PartialOrd
    + fmt::Debug
    + 'static
    + bytemuck::Pod
    + num_traits::NumCast
{
    /// Runtime tag of this type.
    const DATATYPE: DataType;
}

macro_rules! impl_scalar {
    ($($ty:ty => $dt:ident),* $(,)?) => {
        $(
            impl Scalar for $ty {
                const DATATYPE: DataType = DataType::$dt;
            }
        )*
    };
}

impl_scalar! {
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
}

/// Invoke `$body` with `$T` bound to the Rust type matching a runtime [`DataType`].
///
/// Backends use this to monomorphize a generic kernel over the buffer datatype.
#[macro_export]
macro_rules! with_datatype {
    ($dtype:expr, $T:ident => $body:expr) => {
        match $dtype {
            $crate::DataType::I8 => {
                type $T = i8;
                $body
            }
            $crate::DataType::U8 => {
                type $T = u8;
                $body
            }
            $crate::DataType::I16 => {
                type $T = i16;
                $body
            }
            $crate::DataType::U16 => {
                type $T = u16;
                $body
            }
            $crate::DataType::I32 => {
                type $T = i32;
                $body
            }
            $crate::DataType::U32 => {
                type $T = u32;
                $body
            }
            $crate::DataType::I64 => {
                type $T = i64;
                $body
            }
            $crate::DataType::U64 => {
                type $T = u64;
                $body
            }
            $crate::DataType::F32 => {
                type $T = f32;
                $body
            }
            $crate::DataType::F64 => {
                type $T = f64;
                $body
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_match_rust_types() {
        assert_eq!(DataType::F32.size_of(), std::mem::size_of::<f32>());
        assert_eq!(DataType::U16.size_of(), std::mem::size_of::<u16>());
        assert_eq!(DataType::I64.size_of(), std::mem::size_of::<i64>());
    }

    #[test]
    fn test_integer_predicate() {
        assert!(DataType::I32.is_integer());
        assert!(DataType::U8.is_integer());
        assert!(!DataType::F64.is_integer());
        assert!(DataType::F32.is_float());
    }

    #[test]
    fn test_with_datatype_binds_type() {
        let size = with_datatype!(DataType::I16, T => std::mem::size_of::<T>());
        assert_eq!(size, 2);
        assert_eq!(<u64 as Scalar>::DATATYPE, DataType::U64);
    }
}
