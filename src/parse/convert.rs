//! Typed destinations for cleaned fields.
//!
//! A [`FieldSink`] turns one field into a value; a [`RowSinks`] addresses a
//! whole row of sinks by slot. Tuples and slices of sinks are row sinks, so
//! dispatch is resolved per call site.

use simdutf8::basic::from_utf8;
use thiserror::Error;

use crate::encoding::EncodingError;
use crate::policy::Overflow;

/// Why a single field could not be stored. The reader adds file, line and
/// column context when turning this into a [`CsvError`](crate::CsvError).
#[derive(Error, Debug)]
pub enum FieldError {
    #[error("value is larger than the destination type allows")]
    Overflow,
    #[error("value is smaller than the destination type allows")]
    Underflow,
    #[error("value cannot be parsed for the destination type")]
    Invalid,
    #[error("value is not valid UTF-8")]
    InvalidUtf8,
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// A destination for one field.
pub trait FieldSink {
    /// Store `field` (already trimmed and unquoted).
    fn accept(&mut self, field: &[u8], overflow: Overflow) -> Result<(), FieldError>;
}

impl<T: FieldSink + ?Sized> FieldSink for &mut T {
    #[inline]
    fn accept(&mut self, field: &[u8], overflow: Overflow) -> Result<(), FieldError> {
        (**self).accept(field, overflow)
    }
}

impl FieldSink for String {
    fn accept(&mut self, field: &[u8], _: Overflow) -> Result<(), FieldError> {
        let text = from_utf8(field).map_err(|_| FieldError::InvalidUtf8)?;
        self.clear();
        self.push_str(text);
        Ok(())
    }
}

impl FieldSink for Vec<u8> {
    fn accept(&mut self, field: &[u8], _: Overflow) -> Result<(), FieldError> {
        self.clear();
        self.extend_from_slice(field);
        Ok(())
    }
}

impl FieldSink for char {
    fn accept(&mut self, field: &[u8], _: Overflow) -> Result<(), FieldError> {
        let text = from_utf8(field).map_err(|_| FieldError::InvalidUtf8)?;
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                *self = c;
                Ok(())
            }
            _ => Err(FieldError::Invalid),
        }
    }
}

impl FieldSink for bool {
    fn accept(&mut self, field: &[u8], _: Overflow) -> Result<(), FieldError> {
        *self = if field == b"1" || field.eq_ignore_ascii_case(b"true") {
            true
        } else if field == b"0" || field.eq_ignore_ascii_case(b"false") {
            false
        } else {
            return Err(FieldError::Invalid);
        };
        Ok(())
    }
}

/// Empty fields become `None`; anything else goes through `T`.
impl<T: FieldSink + Default> FieldSink for Option<T> {
    fn accept(&mut self, field: &[u8], overflow: Overflow) -> Result<(), FieldError> {
        if field.is_empty() {
            *self = None;
            return Ok(());
        }
        let mut value = T::default();
        value.accept(field, overflow)?;
        *self = Some(value);
        Ok(())
    }
}

/// Parse an optionally signed decimal integer and fit it into `[min, max]`.
///
/// An empty field is 0.
fn parse_integer(
    field: &[u8],
    min: i128,
    max: i128,
    overflow: Overflow,
) -> Result<i128, FieldError> {
    if field.is_empty() {
        return Ok(0);
    }
    let (negative, digits) = match field {
        [b'-', rest @ ..] => (true, rest),
        [b'+', rest @ ..] => (false, rest),
        _ => (false, field),
    };
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(FieldError::Invalid);
    }

    // saturating is enough: every supported type fits well inside i128
    let magnitude = digits.iter().fold(0i128, |acc, &d| {
        acc.saturating_mul(10).saturating_add(i128::from(d - b'0'))
    });
    let value = if negative { -magnitude } else { magnitude };

    if value > max {
        match overflow {
            Overflow::Fail => Err(FieldError::Overflow),
            Overflow::Clamp => Ok(max),
        }
    } else if value < min {
        match overflow {
            Overflow::Fail => Err(FieldError::Underflow),
            Overflow::Clamp => Ok(min),
        }
    } else {
        Ok(value)
    }
}

// `as i128` because isize and usize have no `From` into i128; it never truncates
macro_rules! integer_sinks {
    ($($t:ty),+) => {$(
        impl FieldSink for $t {
            fn accept(&mut self, field: &[u8], overflow: Overflow) -> Result<(), FieldError> {
                let value =
                    parse_integer(field, <$t>::MIN as i128, <$t>::MAX as i128, overflow)?;
                *self = <$t>::try_from(value).map_err(|_| FieldError::Overflow)?;
                Ok(())
            }
        }
    )+};
}

integer_sinks!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! float_sinks {
    ($($t:ty),+) => {$(
        impl FieldSink for $t {
            fn accept(&mut self, field: &[u8], overflow: Overflow) -> Result<(), FieldError> {
                if field.is_empty() {
                    *self = 0.0;
                    return Ok(());
                }
                let text = std::str::from_utf8(field).map_err(|_| FieldError::Invalid)?;
                let value: $t = text.parse().map_err(|_| FieldError::Invalid)?;
                // a finite literal that parsed to infinity is out of range
                if value.is_infinite() && !text.to_ascii_lowercase().contains("inf") {
                    return match (overflow, value.is_sign_positive()) {
                        (Overflow::Fail, true) => Err(FieldError::Overflow),
                        (Overflow::Fail, false) => Err(FieldError::Underflow),
                        (Overflow::Clamp, true) => {
                            *self = <$t>::MAX;
                            Ok(())
                        }
                        (Overflow::Clamp, false) => {
                            *self = <$t>::MIN;
                            Ok(())
                        }
                    };
                }
                *self = value;
                Ok(())
            }
        }
    )+};
}

float_sinks!(f32, f64);

/// A row of sinks addressed by slot.
pub trait RowSinks {
    /// Number of slots; must equal the reader's column count.
    fn width(&self) -> usize;

    /// Store `field` into slot `slot`.
    fn accept(&mut self, slot: usize, field: &[u8], overflow: Overflow) -> Result<(), FieldError>;
}

impl<T: FieldSink> RowSinks for &mut [T] {
    fn width(&self) -> usize {
        self.len()
    }

    fn accept(&mut self, slot: usize, field: &[u8], overflow: Overflow) -> Result<(), FieldError> {
        self[slot].accept(field, overflow)
    }
}

impl<T: FieldSink> RowSinks for &mut Vec<T> {
    fn width(&self) -> usize {
        self.len()
    }

    fn accept(&mut self, slot: usize, field: &[u8], overflow: Overflow) -> Result<(), FieldError> {
        self[slot].accept(field, overflow)
    }
}

macro_rules! tuple_sinks {
    ($width:expr => $($idx:tt $T:ident),+) => {
        impl<$($T: FieldSink),+> RowSinks for ($($T,)+) {
            #[inline]
            fn width(&self) -> usize {
                $width
            }

            fn accept(
                &mut self,
                slot: usize,
                field: &[u8],
                overflow: Overflow,
            ) -> Result<(), FieldError> {
                match slot {
                    $($idx => self.$idx.accept(field, overflow),)+
                    _ => unreachable!("slot {slot} out of range for a row of {}", $width),
                }
            }
        }
    };
}

tuple_sinks!(1 => 0 A);
tuple_sinks!(2 => 0 A, 1 B);
tuple_sinks!(3 => 0 A, 1 B, 2 C);
tuple_sinks!(4 => 0 A, 1 B, 2 C, 3 D);
tuple_sinks!(5 => 0 A, 1 B, 2 C, 3 D, 4 E);
tuple_sinks!(6 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F);
tuple_sinks!(7 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G);
tuple_sinks!(8 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H);
tuple_sinks!(9 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H, 8 I);
tuple_sinks!(10 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H, 8 I, 9 J);
tuple_sinks!(11 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H, 8 I, 9 J, 10 K);
tuple_sinks!(12 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H, 8 I, 9 J, 10 K, 11 L);
tuple_sinks!(13 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H, 8 I, 9 J, 10 K, 11 L, 12 M);
tuple_sinks!(14 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H, 8 I, 9 J, 10 K, 11 L, 12 M, 13 N);
tuple_sinks!(15 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H, 8 I, 9 J, 10 K, 11 L, 12 M, 13 N,
    14 O);
tuple_sinks!(16 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H, 8 I, 9 J, 10 K, 11 L, 12 M, 13 N,
    14 O, 15 P);

#[cfg(test)]
mod tests {
    use super::*;

    fn store<T: FieldSink + Default>(field: &str, overflow: Overflow) -> Result<T, FieldError> {
        let mut value = T::default();
        value.accept(field.as_bytes(), overflow)?;
        Ok(value)
    }

    #[test]
    fn test_integer_parse() {
        assert_eq!(store::<i32>("42", Overflow::Fail).unwrap(), 42);
        assert_eq!(store::<i32>("-42", Overflow::Fail).unwrap(), -42);
        assert_eq!(store::<i32>("+7", Overflow::Fail).unwrap(), 7);
        assert_eq!(store::<i32>("", Overflow::Fail).unwrap(), 0);
        assert_eq!(store::<u8>("255", Overflow::Fail).unwrap(), 255);
        assert_eq!(store::<i64>("-9223372036854775808", Overflow::Fail).unwrap(), i64::MIN);
        assert_eq!(store::<u64>("18446744073709551615", Overflow::Fail).unwrap(), u64::MAX);
    }

    #[test]
    fn test_integer_invalid() {
        for bad in ["abc", "1.5", "-", "+", "1 2", "0x10", "12a"] {
            assert!(
                matches!(store::<i32>(bad, Overflow::Clamp), Err(FieldError::Invalid)),
                "{bad:?} should be invalid"
            );
        }
    }

    #[test]
    fn test_integer_overflow_policy() {
        assert!(matches!(
            store::<i32>("99999999999", Overflow::Fail),
            Err(FieldError::Overflow)
        ));
        assert_eq!(store::<i32>("99999999999", Overflow::Clamp).unwrap(), i32::MAX);
        assert!(matches!(
            store::<i32>("-99999999999", Overflow::Fail),
            Err(FieldError::Underflow)
        ));
        assert_eq!(store::<i32>("-99999999999", Overflow::Clamp).unwrap(), i32::MIN);
        assert!(matches!(store::<u16>("-1", Overflow::Fail), Err(FieldError::Underflow)));
        assert_eq!(store::<u16>("-1", Overflow::Clamp).unwrap(), 0);
        let huge = "9".repeat(60);
        assert_eq!(store::<u64>(&huge, Overflow::Clamp).unwrap(), u64::MAX);
        assert_eq!(store::<usize>(&huge, Overflow::Clamp).unwrap(), usize::MAX);
        assert_eq!(store::<isize>("-3", Overflow::Fail).unwrap(), -3);
    }

    #[test]
    fn test_pointer_width_integers() {
        let above = (isize::MAX as i128 + 1).to_string();
        let below = (isize::MIN as i128 - 1).to_string();
        assert!(matches!(store::<isize>(&above, Overflow::Fail), Err(FieldError::Overflow)));
        assert!(matches!(store::<isize>(&below, Overflow::Fail), Err(FieldError::Underflow)));
        assert_eq!(store::<isize>(&above, Overflow::Clamp).unwrap(), isize::MAX);
        assert_eq!(store::<isize>(&below, Overflow::Clamp).unwrap(), isize::MIN);

        let above = (usize::MAX as i128 + 1).to_string();
        assert!(matches!(store::<usize>(&above, Overflow::Fail), Err(FieldError::Overflow)));
        assert_eq!(store::<usize>(&above, Overflow::Clamp).unwrap(), usize::MAX);
        assert!(matches!(store::<usize>("-1", Overflow::Fail), Err(FieldError::Underflow)));
        assert_eq!(store::<usize>("-1", Overflow::Clamp).unwrap(), 0);
    }

    #[test]
    fn test_float_parse() {
        assert_eq!(store::<f64>("2.5", Overflow::Fail).unwrap(), 2.5);
        assert_eq!(store::<f64>("-1e3", Overflow::Fail).unwrap(), -1000.0);
        assert_eq!(store::<f32>("", Overflow::Fail).unwrap(), 0.0);
        assert!(store::<f64>("inf", Overflow::Fail).unwrap().is_infinite());
        assert!(matches!(store::<f64>("x1", Overflow::Fail), Err(FieldError::Invalid)));
        assert!(matches!(store::<f32>("1e60", Overflow::Fail), Err(FieldError::Overflow)));
        assert!(matches!(store::<f32>("-1e60", Overflow::Fail), Err(FieldError::Underflow)));
        assert_eq!(store::<f32>("1e60", Overflow::Clamp).unwrap(), f32::MAX);
    }

    #[test]
    fn test_text_sinks() {
        assert_eq!(store::<String>("zhao", Overflow::Fail).unwrap(), "zhao");
        let mut text = String::from("kept");
        assert!(matches!(
            text.accept(b"\xCC\xCC", Overflow::Fail),
            Err(FieldError::InvalidUtf8)
        ));
        assert_eq!(text, "kept");
        assert_eq!(store::<Vec<u8>>("raw", Overflow::Fail).unwrap(), b"raw");
        assert_eq!(store::<char>("赵", Overflow::Fail).unwrap(), '赵');
        assert!(matches!(store::<char>("ab", Overflow::Fail), Err(FieldError::Invalid)));
        assert!(matches!(store::<char>("", Overflow::Fail), Err(FieldError::Invalid)));
    }

    #[test]
    fn test_bool_and_option() {
        assert!(store::<bool>("TRUE", Overflow::Fail).unwrap());
        assert!(!store::<bool>("0", Overflow::Fail).unwrap());
        assert!(matches!(store::<bool>("yes", Overflow::Fail), Err(FieldError::Invalid)));
        assert_eq!(store::<Option<i32>>("", Overflow::Fail).unwrap(), None);
        assert_eq!(store::<Option<i32>>("5", Overflow::Fail).unwrap(), Some(5));
    }

    #[test]
    fn test_tuple_and_slice_rows() {
        let mut id = 0i32;
        let mut name = String::new();
        let mut row = (&mut id, &mut name);
        assert_eq!(row.width(), 2);
        row.accept(1, b"qian", Overflow::Fail).unwrap();
        row.accept(0, b"2", Overflow::Fail).unwrap();
        assert_eq!((id, name.as_str()), (2, "qian"));

        let mut values = vec![String::new(); 3];
        let mut slots = &mut values[..];
        assert_eq!(slots.width(), 3);
        slots.accept(2, b"z", Overflow::Fail).unwrap();
        assert_eq!(values[2], "z");
    }
}
