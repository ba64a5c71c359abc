use logos::{Lexer, Logos};
use std::{fmt, str::FromStr, time::Duration};
use thiserror::Error;

const NANOS_PER_SEC: u128 = 1_000_000_000;

const K: u64 = 1_000;
const M: u64 = 1_000_000;
const G: u64 = 1_000_000_000;

/// A data rate, in bits per second.
///
/// Multipliers are decimal (SI): `1kbps` is `1_000` bits per second and
/// `100Mbps` is `100_000_000` bits per second.
///
/// # Example
///
/// ```
/// # use pacesim_core::measure::DataRate;
/// # use std::time::Duration;
/// let rate: DataRate = "100Mbps".parse().unwrap();
/// assert_eq!(rate.bits_per_sec(), 100_000_000);
///
/// // time it takes to put 1460 bytes on the wire at this rate
/// assert_eq!(rate.transmission_time(1460), Duration::from_nanos(116_800));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataRate(u64);

impl DataRate {
    pub const ZERO: Self = Self(0);

    pub const fn from_bits_per_sec(bps: u64) -> Self {
        Self(bps)
    }

    pub const fn from_kbps(kbps: u64) -> Self {
        Self(kbps * K)
    }

    pub const fn from_mbps(mbps: u64) -> Self {
        Self(mbps * M)
    }

    #[inline]
    pub const fn bits_per_sec(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Time needed to transmit `bytes` at this rate.
    ///
    /// This is `bytes * 8 / rate` seconds, rounded to the nearest
    /// nanosecond. The computation is done in integer arithmetic so the
    /// same inputs always give the same [`Duration`].
    ///
    /// A zero rate never completes a transmission and returns
    /// [`Duration::MAX`].
    pub fn transmission_time(self, bytes: u64) -> Duration {
        if self.0 == 0 {
            return Duration::MAX;
        }

        let rate = self.0 as u128;
        let bits = bytes as u128 * 8;
        let nanos = (bits * NANOS_PER_SEC + rate / 2) / rate;

        match u64::try_from(nanos) {
            Ok(nanos) => Duration::from_nanos(nanos),
            Err(_) => Duration::MAX,
        }
    }
}

impl fmt::Display for DataRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;

        if v >= G && v % G == 0 {
            write!(f, "{}Gbps", v / G)
        } else if v >= M && v % M == 0 {
            write!(f, "{}Mbps", v / M)
        } else if v >= K && v % K == 0 {
            write!(f, "{}kbps", v / K)
        } else {
            write!(f, "{v}bps")
        }
    }
}

/// Error returned when a [`DataRate`] cannot be parsed from a string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataRateParseError {
    #[error("Failed to parse `{input}': expecting a number")]
    ExpectingNumber { input: String },
    #[error("Failed to parse `{input}': expecting one of bps, kbps, Mbps, Gbps")]
    ExpectingUnit { input: String },
    #[error("Failed to parse `{input}': unexpected trailing input")]
    TrailingInput { input: String },
    #[error("Failed to parse `{input}': value out of range")]
    OutOfRange { input: String },
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")]
enum DataRateToken {
    #[token("bps", ignore(ascii_case))]
    Bps,
    #[token("kbps", ignore(ascii_case))]
    Kbps,
    #[token("mbps", ignore(ascii_case))]
    Mbps,
    #[token("gbps", ignore(ascii_case))]
    Gbps,

    #[regex("[0-9]+")]
    Value,
}

impl FromStr for DataRate {
    type Err = DataRateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::<'_, DataRateToken>::new(s);

        let Some(Ok(DataRateToken::Value)) = lex.next() else {
            return Err(DataRateParseError::ExpectingNumber {
                input: s.to_owned(),
            });
        };
        let value: u64 = lex
            .slice()
            .parse()
            .map_err(|_| DataRateParseError::OutOfRange {
                input: s.to_owned(),
            })?;

        let multiplier = match lex.next() {
            Some(Ok(DataRateToken::Bps)) => 1,
            Some(Ok(DataRateToken::Kbps)) => K,
            Some(Ok(DataRateToken::Mbps)) => M,
            Some(Ok(DataRateToken::Gbps)) => G,
            _ => {
                return Err(DataRateParseError::ExpectingUnit {
                    input: s.to_owned(),
                });
            }
        };

        if lex.next().is_some() {
            return Err(DataRateParseError::TrailingInput {
                input: s.to_owned(),
            });
        }

        value
            .checked_mul(multiplier)
            .map(Self)
            .ok_or_else(|| DataRateParseError::OutOfRange {
                input: s.to_owned(),
            })
    }
}
