use std::{fmt, str};

/// The identifier of an application installed in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AppId(u64);

impl AppId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl str::FromStr for AppId {
    type Err = std::num::ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "app#{}", self.0)
    }
}

/// Timer event an application asks the [`Scheduler`] to deliver back
/// to it.
///
/// The timer only names the application: the simulation looks the
/// application up when the timer fires, so an application that is gone
/// simply never receives it.
///
/// [`Scheduler`]: crate::scheduler::Scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AppTimer {
    pub app: AppId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print() {
        assert_eq!(AppId::new(3).to_string(), "app#3")
    }

    #[test]
    fn parse() {
        assert_eq!("42".parse::<AppId>().unwrap(), AppId::new(42));
        assert!("app".parse::<AppId>().is_err());
    }
}
