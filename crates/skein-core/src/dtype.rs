use std::fmt;
use std::ops::{Add, AddAssign};

// DType — Element types a tensor buffer may hold
//
// Buffers are typed statically through the `WithDType` parameter of
// `Tensor<T>`; `DType` is the runtime tag of that parameter, used in
// diagnostics and by callers that need to branch on element kind.
//
//   F16 / BF16 — half precision (via the `half` crate)
//   F32 / F64  — the usual floating types
//   U8 / U32 / I64 — integer buffers (masks, counts, labels)

/// Runtime tag of an element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F16,
    BF16,
    F32,
    F64,
    U8,
    U32,
    I64,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::F16 => "f16",
            DType::BF16 => "bf16",
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::U8 => "u8",
            DType::U32 => "u32",
            DType::I64 => "i64",
        };
        write!(f, "{}", s)
    }
}

/// Trait implemented by Rust types that can be stored in a tensor.
///
/// `Add`/`AddAssign` are what reductions and gradient accumulation need;
/// anything else (scaling by a mean divisor, broadcasting a scaled gradient)
/// goes through the f64 conversions.
pub trait WithDType:
    Copy
    + Send
    + Sync
    + 'static
    + num_traits::NumCast
    + fmt::Debug
    + PartialEq
    + Add<Output = Self>
    + AddAssign
{
    /// The corresponding DType enum variant.
    const DTYPE: DType;

    /// Convert this value to f64 (for generic numeric code).
    fn to_f64(self) -> f64;

    /// Create a value of this type from f64.
    fn from_f64(v: f64) -> Self;

    /// The zero value.
    fn zero() -> Self {
        Self::from_f64(0.0)
    }

    /// The one value.
    fn one() -> Self {
        Self::from_f64(1.0)
    }
}

macro_rules! impl_with_dtype_primitive {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl WithDType for $ty {
                const DTYPE: DType = DType::$dtype;
                fn to_f64(self) -> f64 {
                    self as f64
                }
                fn from_f64(v: f64) -> Self {
                    v as $ty
                }
            }
        )*
    };
}

impl_with_dtype_primitive!(f32 => F32, f64 => F64, u8 => U8, u32 => U32, i64 => I64);

impl WithDType for half::f16 {
    const DTYPE: DType = DType::F16;
    fn to_f64(self) -> f64 {
        self.to_f32() as f64
    }
    fn from_f64(v: f64) -> Self {
        half::f16::from_f64(v)
    }
}

impl WithDType for half::bf16 {
    const DTYPE: DType = DType::BF16;
    fn to_f64(self) -> f64 {
        self.to_f32() as f64
    }
    fn from_f64(v: f64) -> Self {
        half::bf16::from_f64(v)
    }
}
