use std::num::NonZeroU32;
use thiserror::Error;
use time::{Duration, UtcDateTime, macros::utc_datetime};

pub const UNIX_EPOCH: UtcDateTime = utc_datetime!(1970-01-01 00:00);

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Default, Hash)]
pub struct PositiveDuration(Duration);

impl PositiveDuration {
    #[must_use]
    pub fn new(duration: Duration) -> Option<Self> {
        duration.is_positive().then_some(Self(duration))
    }

    #[must_use]
    pub fn from_seconds(seconds: i64) -> Option<Self> {
        Self::new(Duration::seconds(seconds))
    }

    #[must_use]
    pub fn get(&self) -> Duration {
        self.0
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The duration is not positive: {0}")]
pub struct NonPositiveDurationError(Duration);

impl TryFrom<Duration> for PositiveDuration {
    type Error = NonPositiveDurationError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(NonPositiveDurationError(value))
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unix millisecond timestamp out of range: {0}")]
pub struct InvalidTimestampError(pub i64);

/// Milliseconds since the unix epoch, truncating sub-millisecond precision.
#[must_use]
pub fn to_unix_millis(time: UtcDateTime) -> i64 {
    // UtcDateTime spans +-9999 years, which fits comfortably in i64 millis.
    #[allow(clippy::cast_possible_truncation)]
    let millis = (time - UNIX_EPOCH).whole_milliseconds() as i64;
    millis
}

pub fn from_unix_millis(millis: i64) -> Result<UtcDateTime, InvalidTimestampError> {
    UNIX_EPOCH
        .checked_add(Duration::milliseconds(millis))
        .ok_or(InvalidTimestampError(millis))
}

/// Serde adapter writing [`UtcDateTime`] as unix milliseconds.
pub mod unix_millis {
    use crate::util::{from_unix_millis, to_unix_millis};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use time::UtcDateTime;

    pub fn serialize<S: Serializer>(time: &UtcDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(to_unix_millis(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<UtcDateTime, D::Error> {
        let millis = i64::deserialize(deserializer)?;
        from_unix_millis(millis).map_err(D::Error::custom)
    }

    pub mod option {
        use crate::util::{from_unix_millis, to_unix_millis};
        use serde::{Deserialize, Deserializer, Serializer, de::Error};
        use time::UtcDateTime;

        #[allow(clippy::ref_option)]
        pub fn serialize<S: Serializer>(
            time: &Option<UtcDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match time {
                Some(time) => serializer.serialize_some(&to_unix_millis(*time)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<UtcDateTime>, D::Error> {
            Option::<i64>::deserialize(deserializer)?
                .map(from_unix_millis)
                .transpose()
                .map_err(D::Error::custom)
        }
    }
}

/// A 1-based page of a listing.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct Page {
    pub number: NonZeroU32,
    pub size: NonZeroU32,
}

impl Page {
    #[must_use]
    pub fn new(number: NonZeroU32, size: NonZeroU32) -> Self {
        Self { number, size }
    }

    #[must_use]
    pub fn first(size: NonZeroU32) -> Self {
        Self::new(NonZeroU32::MIN, size)
    }

    #[must_use]
    pub fn limit(self) -> i64 {
        self.size.get().into()
    }

    /// Saturates instead of overflowing; such a page is simply empty.
    #[must_use]
    pub fn offset(self) -> i64 {
        i64::from(self.number.get() - 1).saturating_mul(i64::from(self.size.get()))
    }
}

/// Declares a `String` newtype that can only be constructed through a
/// validation predicate, together with its error type.
macro_rules! validated_string {
    ($(#[$meta:meta])* $name:ident, $error:ident, $description:literal, |$text:ident| $valid:expr) => {
        $(#[$meta])*
        #[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, ::serde::Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        #[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, ::thiserror::Error)]
        #[error("The {} is invalid: {:?}", $description, .0)]
        pub struct $error(pub String);

        impl $name {
            pub fn new(text: String) -> Result<Self, $error> {
                let $text: &str = &text;
                if $valid {
                    Ok(Self(text))
                } else {
                    Err($error(text))
                }
            }

            #[must_use]
            pub fn get(&self) -> &str {
                &self.0
            }

            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = $error;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                let inner = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                Self::new(inner).map_err(|err| {
                    <D::Error as ::serde::de::Error>::invalid_value(
                        ::serde::de::Unexpected::Str(&err.0),
                        &stringify!($name),
                    )
                })
            }
        }
    };
}

pub(crate) use validated_string;
