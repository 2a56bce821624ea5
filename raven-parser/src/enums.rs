//! Enumerations reported by the gateway
//!
//! Each enumeration carries its wire codes in a `CODES` table so that the
//! generic [`decode_enum`](crate::codec::decode_enum) can map raw text to a
//! variant without per-type parsing code.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::codec::decode_enum;
use crate::error::{DecodeError, DecodeResult};

/// Defines an enumeration whose wire representation is a fixed string
macro_rules! text_coded {
    (
        $(#[$meta:meta])*
        $name:ident as $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident = $code:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const CODES: &'static [(&'static str, $name)] = &[$(($code, $name::$variant)),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $code),+
                }
            }
        }

        impl FromStr for $name {
            type Err = DecodeError;

            fn from_str(raw: &str) -> DecodeResult<Self> {
                decode_enum(raw.trim(), $kind, Self::CODES)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Defines an enumeration whose wire representation is a small integer
macro_rules! number_coded {
    (
        $(#[$meta:meta])*
        $name:ident as $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident = $code:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const CODES: &'static [(u64, $name)] = &[$(($code, $name::$variant)),+];

            pub fn code(self) -> u64 {
                match self {
                    $($name::$variant => $code),+
                }
            }

            pub fn from_code(code: u64) -> DecodeResult<Self> {
                decode_enum(code, $kind, Self::CODES)
            }
        }
    };
}

text_coded! {
    /// Join progress of the gateway on the meter's network
    ConnectionState as "connection state" {
        Initializing = "Initializing",
        NetworkDiscovery = "Network Discovery",
        Joining = "Joining",
        JoinFailed = "Join: Fail",
        JoinSucceeded = "Join: Success",
        Authenticating = "Authenticating",
        AuthenticationSucceeded = "Authenticating: Success",
        AuthenticationFailed = "Authenticating: Fail",
        Connected = "Connected",
        Disconnected = "Disconnected",
        Rejoining = "Rejoining",
    }
}

text_coded! {
    /// Direction of an interval data channel
    IntervalChannel as "interval channel" {
        Delivered = "Delivered",
        Received = "Received",
    }
}

text_coded! {
    MessageQueue as "message queue" {
        Active = "Active",
        CancelPending = "Cancel Pending",
    }
}

text_coded! {
    MeterType as "meter type" {
        Electric = "electric",
        Gas = "gas",
        Water = "water",
        Other = "other",
    }
}

text_coded! {
    /// Kinds of periodic reads the gateway can schedule
    ScheduledEvent as "scheduled event" {
        Time = "time",
        Price = "price",
        Demand = "demand",
        Summation = "summation",
        Message = "message",
    }
}

number_coded! {
    /// Outcome code attached to profile data replies
    DataStatus as "data status" {
        Success = 0,
        UndefinedInterval = 1,
        NotSupported = 2,
        InvalidEndTime = 3,
        TooManyPeriods = 4,
        NoneAvailable = 5,
    }
}

number_coded! {
    IntervalPeriod as "interval period" {
        Daily = 0,
        SixtyMinutes = 1,
        ThirtyMinutes = 2,
        FifteenMinutes = 3,
        TenMinutes = 4,
        SevenAndHalfMinutes = 5,
        FiveMinutes = 6,
        TwoAndHalfMinutes = 7,
    }
}

impl IntervalPeriod {
    pub fn as_duration(self) -> Duration {
        let seconds = match self {
            IntervalPeriod::Daily => 86_400,
            IntervalPeriod::SixtyMinutes => 3_600,
            IntervalPeriod::ThirtyMinutes => 1_800,
            IntervalPeriod::FifteenMinutes => 900,
            IntervalPeriod::TenMinutes => 600,
            IntervalPeriod::SevenAndHalfMinutes => 450,
            IntervalPeriod::FiveMinutes => 300,
            IntervalPeriod::TwoAndHalfMinutes => 150,
        };
        Duration::from_secs(seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Join: Success", ConnectionState::JoinSucceeded)]
    #[case("Connected", ConnectionState::Connected)]
    #[case(" Rejoining ", ConnectionState::Rejoining)]
    fn test_connection_state_from_wire(#[case] raw: &str, #[case] expected: ConnectionState) {
        assert_eq!(raw.parse::<ConnectionState>().unwrap(), expected);
    }

    #[test]
    fn test_text_coded_round_trip_through_display() {
        for (code, variant) in MeterType::CODES {
            assert_eq!(variant.to_string(), *code);
            assert_eq!(code.parse::<MeterType>().unwrap(), *variant);
        }
    }

    #[test]
    fn test_unknown_text_code() {
        let err = "steam".parse::<MeterType>().unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnknownValue {
                kind: "meter type",
                value: "steam".to_string()
            }
        );
    }

    #[test]
    fn test_number_coded() {
        assert_eq!(DataStatus::from_code(5).unwrap(), DataStatus::NoneAvailable);
        assert_eq!(IntervalPeriod::FiveMinutes.code(), 6);
        assert!(DataStatus::from_code(6).is_err());
    }

    #[test]
    fn test_interval_period_duration() {
        assert_eq!(
            IntervalPeriod::SevenAndHalfMinutes.as_duration(),
            Duration::from_secs(450)
        );
        assert_eq!(IntervalPeriod::from_code(0).unwrap().as_duration().as_secs(), 86_400);
    }
}
