use rand_core::Rng;
use std::{fmt, str::FromStr};

/// Granularity at which an [`ErrorModel`] applies its rate.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorUnit {
    /// every bit of the packet can be corrupted independently
    Bit,
    /// every byte of the packet can be corrupted independently (default)
    #[default]
    Byte,
    /// the rate is the probability the whole packet is corrupted
    Packet,
}

/// Stochastic receive error model attached to a device.
///
/// A packet that is found corrupt on reception is discarded before it
/// reaches the transport layer.
///
/// # Example
///
/// ```
/// use pacesim_core::measure::{ErrorModel, ErrorUnit};
///
/// // No errors
/// let none = ErrorModel::None;
///
/// // one packet in a thousand is corrupted
/// let lossy = ErrorModel::rate(0.001, ErrorUnit::Packet).unwrap();
/// assert_eq!(lossy.to_string(), "0.001 per packet");
/// ```
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub enum ErrorModel {
    /// No corruption. All packets are received (default).
    #[default]
    None,
    /// Random corruption at the given rate per [`ErrorUnit`].
    Rate { rate: ErrorRate, unit: ErrorUnit },
}

/// A validated error rate in the range `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorRate(f64);

impl ErrorModel {
    /// Create an [`ErrorModel::Rate`] with a validated error probability.
    ///
    /// # Errors
    ///
    /// Returns an error if `rate` is not in `[0.0, 1.0]` (including NaN).
    pub fn rate(rate: f64, unit: ErrorUnit) -> Result<Self, ErrorRateError> {
        Ok(ErrorModel::Rate {
            rate: ErrorRate::new(rate)?,
            unit,
        })
    }

    /// Probability that a packet of `bytes_size` bytes is corrupted.
    pub fn packet_error_probability(&self, bytes_size: u64) -> f64 {
        match self {
            ErrorModel::None => 0.0,
            ErrorModel::Rate { rate, unit } => {
                let units = match unit {
                    ErrorUnit::Packet => return rate.0,
                    ErrorUnit::Byte => bytes_size,
                    ErrorUnit::Bit => bytes_size.saturating_mul(8),
                };
                let units = i32::try_from(units).unwrap_or(i32::MAX);
                1.0 - (1.0 - rate.0).powi(units)
            }
        }
    }

    /// Returns `true` if a packet of `bytes_size` bytes should be dropped.
    ///
    /// The caller provides `rng` so that all simulation randomness comes
    /// from a single seedable source.
    pub fn is_corrupt<R: Rng>(&self, rng: &mut R, bytes_size: u64) -> bool {
        match self {
            ErrorModel::None => false,
            ErrorModel::Rate { .. } => {
                let probability = self.packet_error_probability(bytes_size);
                let bits = rng.next_u64();
                let sample = (bits as f64) * (1.0 / (u64::MAX as f64 + 1.0));
                sample < probability
            }
        }
    }
}

impl fmt::Display for ErrorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorModel::None => write!(f, "none"),
            ErrorModel::Rate { rate, unit } => write!(f, "{rate} per {unit}"),
        }
    }
}

impl fmt::Display for ErrorUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorUnit::Bit => write!(f, "bit"),
            ErrorUnit::Byte => write!(f, "byte"),
            ErrorUnit::Packet => write!(f, "packet"),
        }
    }
}

impl FromStr for ErrorUnit {
    type Err = ErrorUnitParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bit" | "bits" => Ok(Self::Bit),
            "byte" | "bytes" => Ok(Self::Byte),
            "packet" | "packets" => Ok(Self::Packet),
            _ => Err(ErrorUnitParseError(s.to_owned())),
        }
    }
}

impl fmt::Display for ErrorRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl ErrorRate {
    /// Create a new validated rate.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorRateError`] if `rate` is NaN, negative, or
    /// greater than `1.0`.
    pub fn new(rate: f64) -> Result<Self, ErrorRateError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(ErrorRateError(rate));
        }
        Ok(Self(rate))
    }

    /// Clamp `rate` into `[0.0, 1.0]`, NaN becomes `0.0`.
    pub const fn saturating(rate: f64) -> Self {
        if rate >= 1.0 {
            Self(1.0)
        } else if rate > 0.0 {
            Self(rate)
        } else {
            Self(0.0)
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl FromStr for ErrorRate {
    type Err = ErrorRateParseError;

    /// Parses either a probability (`"0.001"`, `"1e-6"`) or a percentage
    /// (`"5%"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let rate = match s.strip_suffix('%') {
            Some(pct) => {
                let pct: f64 = pct
                    .trim()
                    .parse()
                    .map_err(|_| ErrorRateParseError::InvalidNumber)?;
                pct / 100.0
            }
            None => s.parse().map_err(|_| ErrorRateParseError::InvalidNumber)?,
        };
        Ok(Self::new(rate)?)
    }
}

/// Error returned when constructing an [`ErrorRate`] with a value
/// outside `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("error rate must be in [0.0, 1.0], got {0}")]
pub struct ErrorRateError(f64);

/// Error returned when parsing an [`ErrorRate`] from a string.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ErrorRateParseError {
    #[error("invalid error rate, expecting a number or a percentage")]
    InvalidNumber,
    #[error("{0}")]
    OutOfRange(#[from] ErrorRateError),
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown error unit `{0}', expecting bit, byte or packet")]
pub struct ErrorUnitParseError(String);

#[cfg(test)]
mod tests {
    use rand_chacha::ChaChaRng;
    use rand_core::SeedableRng as _;

    use super::*;

    fn rng() -> ChaChaRng {
        ChaChaRng::seed_from_u64(42)
    }

    #[test]
    fn none_never_corrupts() {
        let mut rng = rng();
        for _ in 0..1000 {
            assert!(!ErrorModel::None.is_corrupt(&mut rng, 1460));
        }
    }

    #[test]
    fn rate_one_always_corrupts() {
        let mut rng = rng();
        let model = ErrorModel::rate(1.0, ErrorUnit::Packet).unwrap();
        for _ in 0..1000 {
            assert!(model.is_corrupt(&mut rng, 1460));
        }
    }

    #[test]
    fn rate_zero_never_corrupts() {
        let mut rng = rng();
        let model = ErrorModel::rate(0.0, ErrorUnit::Byte).unwrap();
        for _ in 0..1000 {
            assert!(!model.is_corrupt(&mut rng, 1460));
        }
    }

    #[test]
    fn packet_rate_approximately() {
        let model = ErrorModel::rate(0.1, ErrorUnit::Packet).unwrap();
        let mut rng = rng();
        let drops = (0..10_000).filter(|_| model.is_corrupt(&mut rng, 1460)).count();
        assert!(drops > 800 && drops < 1200, "drop rate was {drops}/10000");
    }

    #[test]
    fn byte_unit_compounds_over_packet_size() {
        let model = ErrorModel::rate(0.001, ErrorUnit::Byte).unwrap();
        let p = model.packet_error_probability(1000);
        // 1 - 0.999^1000
        assert!((p - 0.6323).abs() < 1e-3, "probability was {p}");

        let bit = ErrorModel::rate(0.001, ErrorUnit::Bit).unwrap();
        assert!(bit.packet_error_probability(1000) > p);
    }

    #[test]
    fn empty_packet_with_byte_unit_is_never_corrupt() {
        let model = ErrorModel::rate(0.5, ErrorUnit::Byte).unwrap();
        assert_eq!(model.packet_error_probability(0), 0.0);
    }

    #[test]
    fn reproducible_with_same_seed() {
        let model = ErrorModel::rate(0.3, ErrorUnit::Packet).unwrap();
        let results_a: Vec<bool> = {
            let mut rng = ChaChaRng::seed_from_u64(99);
            (0..100).map(|_| model.is_corrupt(&mut rng, 100)).collect()
        };
        let results_b: Vec<bool> = {
            let mut rng = ChaChaRng::seed_from_u64(99);
            (0..100).map(|_| model.is_corrupt(&mut rng, 100)).collect()
        };
        assert_eq!(results_a, results_b);
    }

    #[test]
    fn invalid_rates_rejected() {
        assert!(ErrorModel::rate(f64::NAN, ErrorUnit::Packet).is_err());
        assert!(ErrorModel::rate(-0.1, ErrorUnit::Packet).is_err());
        assert!(ErrorModel::rate(1.5, ErrorUnit::Packet).is_err());
        assert_eq!(
            ErrorRate::new(2.0).unwrap_err().to_string(),
            "error rate must be in [0.0, 1.0], got 2"
        );
    }

    #[test]
    fn parse_rate() {
        assert_eq!("0.001".parse::<ErrorRate>().unwrap().value(), 0.001);
        assert_eq!("1e-6".parse::<ErrorRate>().unwrap().value(), 0.000001);
        assert_eq!("5%".parse::<ErrorRate>().unwrap().value(), 0.05);
        assert!("abc".parse::<ErrorRate>().is_err());
        assert!("150%".parse::<ErrorRate>().is_err());
    }

    #[test]
    fn parse_unit() {
        assert_eq!("packet".parse::<ErrorUnit>().unwrap(), ErrorUnit::Packet);
        assert_eq!("Bytes".parse::<ErrorUnit>().unwrap(), ErrorUnit::Byte);
        assert_eq!("bit".parse::<ErrorUnit>().unwrap(), ErrorUnit::Bit);
        assert!("frame".parse::<ErrorUnit>().is_err());
    }

    #[test]
    fn display() {
        assert_eq!(ErrorModel::None.to_string(), "none");
        assert_eq!(
            ErrorModel::rate(0.000001, ErrorUnit::Byte).unwrap().to_string(),
            "0.000001 per byte"
        );
    }
}
