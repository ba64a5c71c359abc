use logos::{Lexer, Logos};
use std::{fmt, ops::Add, str::FromStr, time::Duration};
use thiserror::Error;

/// An instant on the simulation's virtual clock.
///
/// The clock starts at [`SimTime::ZERO`] and is only ever advanced by the
/// [`Scheduler`] as it processes events. It has nothing to do with the
/// wall clock.
///
/// The value is stored with nanosecond precision and displayed as decimal
/// seconds with the trailing zeros trimmed so that it can be written
/// verbatim in trace files:
///
/// ```
/// # use pacesim_core::SimTime;
/// # use std::time::Duration;
/// assert_eq!(SimTime::from_millis(2_500).to_string(), "2.5");
/// assert_eq!(SimTime::from_secs(1).to_string(), "1");
/// assert_eq!(
///     (SimTime::from_secs(1) + Duration::from_nanos(116_800)).to_string(),
///     "1.0001168"
/// );
/// ```
///
/// [`Scheduler`]: crate::scheduler::Scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(Duration);

impl SimTime {
    pub const ZERO: Self = Self(Duration::ZERO);

    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    pub const fn from_nanos(nanos: u64) -> Self {
        Self(Duration::from_nanos(nanos))
    }

    /// time elapsed since the start of the simulation
    #[inline]
    pub const fn since_start(self) -> Duration {
        self.0
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0.as_secs_f64()
    }

    /// Duration between `earlier` and `self`, zero if `earlier` is later.
    pub fn saturating_duration_since(self, earlier: SimTime) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl From<Duration> for SimTime {
    fn from(value: Duration) -> Self {
        Self(value)
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0.saturating_add(rhs))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs();
        let nanos = self.0.subsec_nanos();

        if nanos == 0 {
            return write!(f, "{secs}");
        }

        let fraction = format!("{nanos:09}");
        write!(f, "{secs}.{}", fraction.trim_end_matches('0'))
    }
}

impl FromStr for SimTime {
    type Err = DurationParseError;

    /// Parses an offset from the start of the simulation, e.g. `"1s"` or
    /// `"1s 500ms"`. See [`parse_duration`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_duration(s).map(Self)
    }
}

/// Error returned when a human readable duration cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
    #[error("Failed to parse `{input}': unexpected token")]
    UnexpectedToken { input: String },
    #[error("Failed to parse `{input}': expecting duration to start with a number")]
    ExpectingNumber { input: String },
    #[error("Failed to parse `{input}': expecting a measure after the number")]
    ExpectingMeasure { input: String },
    #[error("Failed to parse `{input}': number out of range")]
    OutOfRange { input: String },
    #[error("Empty duration")]
    Empty,
}

/// Parse a human readable duration.
///
/// The measures `ns`, `us` (or `μs`), `ms`, `s` and `m` are supported.
/// Multiple components are summed:
///
/// ```
/// # use pacesim_core::time::parse_duration;
/// # use std::time::Duration;
/// assert_eq!(parse_duration("6560ns").unwrap(), Duration::from_nanos(6_560));
/// assert_eq!(parse_duration("1s 500ms").unwrap(), Duration::from_millis(1_500));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, DurationParseError> {
    let mut lex = Lexer::<'_, Token>::new(s);
    let mut total = Duration::ZERO;
    let mut components = 0usize;

    while let Some(next) = lex.next() {
        let token = next.map_err(|()| DurationParseError::UnexpectedToken {
            input: s.to_owned(),
        })?;

        if token != Token::Value {
            return Err(DurationParseError::ExpectingNumber {
                input: s.to_owned(),
            });
        }
        let number: u64 = lex
            .slice()
            .parse()
            .map_err(|_| DurationParseError::OutOfRange {
                input: s.to_owned(),
            })?;

        let Some(Ok(measure)) = lex.next() else {
            return Err(DurationParseError::ExpectingMeasure {
                input: s.to_owned(),
            });
        };
        let duration = match measure {
            Token::NanoSeconds => Duration::from_nanos(number),
            Token::MicroSeconds => Duration::from_micros(number),
            Token::MilliSeconds => Duration::from_millis(number),
            Token::Seconds => Duration::from_secs(number),
            Token::Minutes => Duration::from_secs(number.saturating_mul(60)),
            Token::Value => {
                return Err(DurationParseError::ExpectingMeasure {
                    input: s.to_owned(),
                });
            }
        };
        total = total.saturating_add(duration);
        components += 1;
    }

    if components == 0 {
        return Err(DurationParseError::Empty);
    }

    Ok(total)
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")]
enum Token {
    #[token("ns")]
    NanoSeconds,
    #[regex("us|μs")]
    MicroSeconds,
    #[token("ms")]
    MilliSeconds,
    #[token("s")]
    Seconds,
    #[token("m")]
    Minutes,

    #[regex("[0-9]+")]
    Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logos_lexer() {
        let mut lex = Token::lexer("6560ns");

        assert_eq!(lex.next(), Some(Ok(Token::Value)));
        assert_eq!(lex.slice(), "6560");

        assert_eq!(lex.next(), Some(Ok(Token::NanoSeconds)));
        assert_eq!(lex.span(), 4..6);
    }

    #[test]
    fn parse() {
        assert_eq!(parse_duration("5ms").unwrap(), Duration::from_millis(5));
        assert_eq!(
            parse_duration("1s 2000ms 3000000us").unwrap(),
            Duration::from_secs(6)
        );
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn parse_errors() {
        assert_eq!(parse_duration(""), Err(DurationParseError::Empty));
        assert!(matches!(
            parse_duration("10"),
            Err(DurationParseError::ExpectingMeasure { .. })
        ));
        assert!(matches!(
            parse_duration("ms"),
            Err(DurationParseError::ExpectingNumber { .. })
        ));
        assert!(matches!(
            parse_duration("10 parsecs"),
            Err(DurationParseError::UnexpectedToken { .. })
                | Err(DurationParseError::ExpectingMeasure { .. })
        ));
    }

    #[test]
    fn display_trims_trailing_zeros() {
        assert_eq!(SimTime::ZERO.to_string(), "0");
        assert_eq!(SimTime::from_millis(2_700).to_string(), "2.7");
        assert_eq!(SimTime::from_nanos(1_000_233_600).to_string(), "1.0002336");
        assert_eq!(SimTime::from_nanos(1).to_string(), "0.000000001");
    }

    #[test]
    fn parse_sim_time() {
        let time: SimTime = "1s".parse().unwrap();
        assert_eq!(time, SimTime::from_secs(1));
    }

    #[test]
    fn add_and_since() {
        let start = SimTime::from_secs(1);
        let later = start + Duration::from_millis(250);
        assert_eq!(later.saturating_duration_since(start), Duration::from_millis(250));
        assert_eq!(start.saturating_duration_since(later), Duration::ZERO);
    }

    #[test]
    fn offset_from_start() {
        let at = SimTime::from_secs(1) + Duration::from_nanos(116_800);
        assert_eq!(at.since_start(), Duration::from_nanos(1_000_116_800));
        assert_eq!(SimTime::from(at.since_start()), at);
    }
}
