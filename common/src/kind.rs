//! Closed kind enums stored as small integers.

use derive_more::{Display, Error};

/// Macro for defining a kind enum.
///
/// Every generated enum is a closed set of variants with a stable [`u8`]
/// discriminant. Decoding from storage goes through [`TryFrom<u8>`], so an
/// unknown discriminant is rejected instead of being trusted.
///
/// # Example
///
/// ```rust
/// # use common::define_kind;
///
/// define_kind! {
///     #[doc = "Shape kind."]
///     enum Kind {
///         #[doc = "A cube"]
///         Cube = 1,
///
///         #[doc = "A sphere"]
///         Sphere = 2,
///     }
/// }
///
/// assert_eq!(Kind::try_from(2_u8), Ok(Kind::Sphere));
/// assert!(Kind::try_from(3_u8).is_err());
/// ```
#[expect(clippy::module_name_repetitions, reason = "more readable")]
#[macro_export]
macro_rules! define_kind {
    (
        #[doc = $doc:literal]
        enum $name:ident {
            $(
                #[doc = $variant_doc:literal]
                $variant:ident = $value:expr
            ),* $(,)?
        }
    ) => {
        #[derive(
            Clone,
            Copy,
            Debug,
            $crate::private::strum::Display,
            $crate::private::strum::EnumString,
            Eq,
            Hash,
            PartialEq,
        )]
        #[cfg_attr(
            feature = "serde",
            derive(
                $crate::private::serde::Deserialize,
                $crate::private::serde::Serialize,
            ),
            serde(rename_all = "SCREAMING_SNAKE_CASE"),
        )]
        #[doc = $doc]
        #[repr(u8)]
        #[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $(
                 #[doc = $variant_doc]
                 $variant = $value,
            )*
        }

        impl $name {
            /// All the variants of this kind.
            pub const ALL: &'static [Self] = &[$(Self::$variant),*];

            /// Converts this into its [`u8`] representation.
            #[must_use]
            pub const fn u8(self) -> u8 {
                self as u8
            }
        }

        impl ::core::convert::TryFrom<u8> for $name {
            type Error = $crate::UnknownDiscriminant;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $(
                        v if Self::$variant.u8() == v => Ok(Self::$variant),
                    )*
                    v => Err($crate::UnknownDiscriminant {
                        kind: ::core::stringify!($name),
                        value: v,
                    }),
                }
            }
        }

        #[cfg(feature = "postgres")]
        impl<'a> $crate::private::postgres_types::FromSql<'a> for $name {
            $crate::private::postgres_types::accepts!(INT2);

            fn from_sql(
                ty: &$crate::private::postgres_types::Type,
                raw: &[u8],
            ) -> Result<
                $name,
                Box<dyn ::std::error::Error
                    + ::core::marker::Sync
                    + ::core::marker::Send>,
            > {
                let v = u8::try_from(i16::from_sql(ty, raw)?)?;
                Self::try_from(v).map_err(Into::into)
            }
        }

        #[cfg(feature = "postgres")]
        impl $crate::private::postgres_types::ToSql for $name {
            $crate::private::postgres_types::accepts!(INT2);
            $crate::private::postgres_types::to_sql_checked!();

            fn to_sql(
                &self,
                ty: &$crate::private::postgres_types::Type,
                w: &mut $crate::private::postgres_types::private::BytesMut,
            ) -> Result<
                $crate::private::postgres_types::IsNull,
                ::std::boxed::Box<
                    dyn ::std::error::Error
                        + ::core::marker::Sync
                        + ::core::marker::Send
                >,
            > {
                i16::from(self.u8()).to_sql(ty, w)
            }
        }
    };
}

/// Error of decoding a kind enum from an unknown discriminant.
#[derive(Clone, Copy, Debug, Display, Eq, Error, PartialEq)]
#[display("invalid `{kind}` value: {value}")]
pub struct UnknownDiscriminant {
    /// Name of the kind enum.
    pub kind: &'static str,

    /// Rejected discriminant.
    pub value: u8,
}

#[cfg(test)]
mod spec {
    define_kind! {
        #[doc = "Test kind."]
        enum Light {
            #[doc = "Red."]
            Red = 1,

            #[doc = "Green."]
            Green = 2,
        }
    }

    #[test]
    fn decodes_known_discriminants() {
        for kind in Light::ALL {
            assert_eq!(Light::try_from(kind.u8()), Ok(*kind));
        }
    }

    #[test]
    fn rejects_unknown_discriminants() {
        let err = Light::try_from(7_u8).unwrap_err();

        assert_eq!(err.kind, "Light");
        assert_eq!(err.value, 7);
        assert_eq!(err.to_string(), "invalid `Light` value: 7");
    }

    #[test]
    fn uses_screaming_snake_case_names() {
        assert_eq!(Light::Green.to_string(), "GREEN");
        assert_eq!("RED".parse::<Light>(), Ok(Light::Red));
    }
}
