//! Scalar field encodings.
//!
//! Every scalar is persisted as text in the entity's hash. Decoding honours
//! the Rust type's width, so `"300"` fails for a `u8` field, and treats an
//! empty string as the type's zero value.

use chrono::{DateTime, Utc};

use crate::schema::FieldKind;

/// A value stored as a single hash field.
pub trait Scalar: Sized + Send + Sync + 'static {
    /// Classification reported by the schema descriptor.
    const KIND: FieldKind = FieldKind::Scalar;

    /// Text to store, or `None` when there is nothing to write.
    fn encode(&self) -> Option<String>;

    /// Parse stored text. An empty string decodes to the zero value.
    fn decode(raw: &str) -> Result<Self, String>;

    /// Whether this is the type's zero value.
    fn is_zero(&self) -> bool;
}

macro_rules! integer_scalar {
    ($($t:ty),* $(,)?) => {$(
        impl Scalar for $t {
            fn encode(&self) -> Option<String> {
                Some(self.to_string())
            }

            fn decode(raw: &str) -> Result<Self, String> {
                if raw.is_empty() {
                    return Ok(0);
                }
                raw.parse::<$t>().map_err(|e| e.to_string())
            }

            fn is_zero(&self) -> bool {
                *self == 0
            }
        }
    )*};
}

integer_scalar!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! float_scalar {
    ($($t:ty),* $(,)?) => {$(
        impl Scalar for $t {
            fn encode(&self) -> Option<String> {
                Some(self.to_string())
            }

            fn decode(raw: &str) -> Result<Self, String> {
                if raw.is_empty() {
                    return Ok(0.0);
                }
                raw.parse::<$t>().map_err(|e| e.to_string())
            }

            fn is_zero(&self) -> bool {
                *self == 0.0
            }
        }
    )*};
}

float_scalar!(f32, f64);

impl Scalar for bool {
    const KIND: FieldKind = FieldKind::BooleanScalar;

    fn encode(&self) -> Option<String> {
        Some(self.to_string())
    }

    fn decode(raw: &str) -> Result<Self, String> {
        match raw {
            "" | "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
            "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
            other => Err(format!("invalid boolean {other:?}")),
        }
    }

    fn is_zero(&self) -> bool {
        !*self
    }
}

impl Scalar for String {
    fn encode(&self) -> Option<String> {
        Some(self.clone())
    }

    fn decode(raw: &str) -> Result<Self, String> {
        Ok(raw.to_string())
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

/// Timestamps are stored as whole epoch seconds.
impl Scalar for DateTime<Utc> {
    const KIND: FieldKind = FieldKind::Timestamp;

    fn encode(&self) -> Option<String> {
        Some(self.timestamp().to_string())
    }

    fn decode(raw: &str) -> Result<Self, String> {
        let secs = if raw.is_empty() {
            0
        } else {
            raw.parse::<i64>().map_err(|e| e.to_string())?
        };
        DateTime::from_timestamp(secs, 0).ok_or_else(|| format!("timestamp {secs} out of range"))
    }

    fn is_zero(&self) -> bool {
        self.timestamp() == 0 && self.timestamp_subsec_nanos() == 0
    }
}

/// A nullable scalar: `None` is never written, and any stored text decodes
/// to `Some`.
impl<S: Scalar> Scalar for Option<S> {
    const KIND: FieldKind = FieldKind::NullableScalar;

    fn encode(&self) -> Option<String> {
        self.as_ref().and_then(S::encode)
    }

    fn decode(raw: &str) -> Result<Self, String> {
        S::decode(raw).map(Some)
    }

    fn is_zero(&self) -> bool {
        self.is_none()
    }
}

/// Implement [`Scalar`] for single-field tuple structs by delegating to the
/// wrapped type. Newtypes of newtypes resolve down to the base
/// representation.
///
/// ```ignore
/// struct Sku(String);
/// struct Cents(i64);
/// larder_model::scalar_newtype!(Sku(String), Cents(i64));
/// ```
#[macro_export]
macro_rules! scalar_newtype {
    ($($name:ident($inner:ty)),* $(,)?) => {$(
        impl $crate::Scalar for $name {
            const KIND: $crate::FieldKind = <$inner as $crate::Scalar>::KIND;

            fn encode(&self) -> ::std::option::Option<::std::string::String> {
                <$inner as $crate::Scalar>::encode(&self.0)
            }

            fn decode(raw: &str) -> ::std::result::Result<Self, ::std::string::String> {
                <$inner as $crate::Scalar>::decode(raw).map($name)
            }

            fn is_zero(&self) -> bool {
                <$inner as $crate::Scalar>::is_zero(&self.0)
            }
        }
    )*};
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roundtrip<S: Scalar>(value: &S) -> S {
        let text = value.encode().expect("scalar encodes to text");
        S::decode(&text).expect("encoded text decodes")
    }

    macro_rules! roundtrip_test {
        ($name:ident, $t:ty, [$($v:expr),* $(,)?]) => {
            #[test]
            fn $name() {
                for v in [$($v),*] {
                    let v: $t = v;
                    assert_eq!(roundtrip(&v), v);
                }
            }
        };
    }

    roundtrip_test!(i8_roundtrip, i8, [i8::MIN, -34, 0, i8::MAX]);
    roundtrip_test!(i16_roundtrip, i16, [i16::MIN, -5432, 0, i16::MAX]);
    roundtrip_test!(i32_roundtrip, i32, [i32::MIN, -235873, 0, i32::MAX]);
    roundtrip_test!(i64_roundtrip, i64, [i64::MIN, -4_300_000_000, 0, i64::MAX]);
    roundtrip_test!(isize_roundtrip, isize, [isize::MIN, -4, 0, isize::MAX]);
    roundtrip_test!(u8_roundtrip, u8, [0, 34, u8::MAX]);
    roundtrip_test!(u16_roundtrip, u16, [0, 65432, u16::MAX]);
    roundtrip_test!(u32_roundtrip, u32, [0, 235873, u32::MAX]);
    roundtrip_test!(u64_roundtrip, u64, [0, 4_300_000_000, u64::MAX]);
    roundtrip_test!(usize_roundtrip, usize, [0, 4, usize::MAX]);
    roundtrip_test!(f32_roundtrip, f32, [f32::MIN, -2190.3895, 0.0, 329.14, f32::MAX]);
    roundtrip_test!(f64_roundtrip, f64, [f64::MIN, -2190.3895, 0.0, 3.9, f64::MAX]);
    roundtrip_test!(bool_roundtrip, bool, [true, false]);
    roundtrip_test!(
        string_roundtrip,
        String,
        [String::new(), "hello world".to_string(), "-42".to_string()]
    );

    #[test]
    fn empty_text_decodes_to_zero() {
        assert_eq!(i32::decode("").unwrap(), 0);
        assert_eq!(u64::decode("").unwrap(), 0);
        assert_eq!(f64::decode("").unwrap(), 0.0);
        assert!(!bool::decode("").unwrap());
        assert_eq!(String::decode("").unwrap(), "");
        assert!(DateTime::<Utc>::decode("").unwrap().is_zero());
    }

    #[test]
    fn width_is_enforced() {
        assert!(u8::decode("256").is_err());
        assert!(i8::decode("-129").is_err());
        assert!(u16::decode("-1").is_err());
        assert!(i32::decode("4300000000").is_err());
        assert!(i64::decode("4300000000").is_ok());
    }

    #[test]
    fn malformed_text_fails() {
        assert!(i32::decode("four").is_err());
        assert!(f64::decode("3.9.1").is_err());
        assert!(bool::decode("yes").is_err());
        assert!(DateTime::<Utc>::decode("yesterday").is_err());
    }

    #[test]
    fn bool_accepts_numeric_and_letter_forms() {
        assert!(bool::decode("1").unwrap());
        assert!(bool::decode("T").unwrap());
        assert!(bool::decode("True").unwrap());
        assert!(!bool::decode("0").unwrap());
        assert!(!bool::decode("FALSE").unwrap());
    }

    #[test]
    fn timestamps_store_epoch_seconds() {
        let t = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(t.encode().as_deref(), Some("1700000000"));
        assert_eq!(roundtrip(&t), t);

        let negative = DateTime::from_timestamp(-86_400, 0).unwrap();
        assert_eq!(roundtrip(&negative), negative);
    }

    #[test]
    fn option_is_nullable() {
        assert_eq!(<Option<String> as Scalar>::KIND, FieldKind::NullableScalar);
        assert!(None::<i32>.is_zero());
        assert_eq!(None::<i32>.encode(), None);
        // Some(zero) is a value, not an absence.
        assert!(!Some(0i32).is_zero());
        assert_eq!(<Option<String> as Scalar>::decode("asdfg").unwrap().as_deref(), Some("asdfg"));
    }

    #[test]
    fn kinds() {
        assert_eq!(<i32 as Scalar>::KIND, FieldKind::Scalar);
        assert_eq!(<bool as Scalar>::KIND, FieldKind::BooleanScalar);
        assert_eq!(<DateTime<Utc> as Scalar>::KIND, FieldKind::Timestamp);
    }

    #[derive(Debug, PartialEq)]
    struct CustomString(String);
    #[derive(Debug, PartialEq)]
    struct CustomInt(i64);
    #[derive(Debug, PartialEq)]
    struct Nested(CustomInt);
    #[derive(Debug, PartialEq)]
    struct Flag(bool);

    crate::scalar_newtype!(CustomString(String), CustomInt(i64), Nested(CustomInt), Flag(bool));

    #[test]
    fn newtypes_follow_the_alias_chain() {
        let s = CustomString("asdf".into());
        assert_eq!(s.encode().as_deref(), Some("asdf"));
        assert_eq!(roundtrip(&s), s);

        let n = Nested(CustomInt(5));
        assert_eq!(n.encode().as_deref(), Some("5"));
        assert_eq!(roundtrip(&n), n);
        assert!(Nested(CustomInt(0)).is_zero());

        assert_eq!(<Flag as Scalar>::KIND, FieldKind::BooleanScalar);
    }

    proptest! {
        #[test]
        fn prop_i64_roundtrip(v in any::<i64>()) {
            prop_assert_eq!(roundtrip(&v), v);
        }

        #[test]
        fn prop_u32_roundtrip(v in any::<u32>()) {
            prop_assert_eq!(roundtrip(&v), v);
        }

        #[test]
        fn prop_f64_roundtrip(v in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
            prop_assert_eq!(roundtrip(&v), v);
        }

        #[test]
        fn prop_string_roundtrip(v in ".*") {
            prop_assert_eq!(roundtrip(&v), v);
        }
    }
}
