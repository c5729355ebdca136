use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;

use crate::error::Error;

/// Wall-clock time in seconds since the Unix epoch.
///
/// The waveform phase is derived from wall-clock time so that pausing and
/// resuming output does not replay the same stretch of the sine.
pub fn wall_time_secs() -> f64 {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards");
    duration.as_secs() as f64 + duration.subsec_nanos() as f64 / 1e9
}

// Utility class for time-tracking
pub struct TickTimer {
    pub milis: f64,
}

impl TickTimer {
    pub fn new() -> Self {
        Self {
            milis: wall_time_secs() * 1e3,
        }
    }

    /// Milliseconds elapsed since construction or the previous tick.
    pub fn tick(&mut self) -> f64 {
        let milis = wall_time_secs() * 1e3;
        let diff = milis - self.milis;
        self.milis = milis;
        diff
    }
}

/// Parsed form of a BioDAQ device description string, e.g. `"USB-4704,BID#0"`.
///
/// The model names the product family; the board id disambiguates multiple
/// cards of the same model attached to one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescription {
    pub model: String,
    pub board_id: u32,
}

impl FromStr for DeviceDescription {
    type Err = Error;

    fn from_str(descr: &str) -> Result<Self, Error> {
        let pattern = Regex::new(r"^([A-Za-z0-9\-]+),BID#(\d+)$").unwrap();
        let captures = pattern.captures(descr).ok_or_else(|| {
            Error::InvalidParameter(format!(
                "device description {:?} does not match MODEL,BID#N",
                descr
            ))
        })?;
        let board_id = captures[2]
            .parse::<u32>()
            .map_err(|_| Error::InvalidParameter(format!("board id out of range in {:?}", descr)))?;
        Ok(Self {
            model: captures[1].to_string(),
            board_id,
        })
    }
}

impl fmt::Display for DeviceDescription {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{},BID#{}", self.model, self.board_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_device_description() {
        let descr: DeviceDescription = "USB-4704,BID#0".parse().unwrap();
        assert_eq!(descr.model, "USB-4704");
        assert_eq!(descr.board_id, 0);
        assert_eq!(descr.to_string(), "USB-4704,BID#0");
    }

    #[test]
    fn reject_malformed_description() {
        assert!("USB-4704".parse::<DeviceDescription>().is_err());
        assert!("USB-4704,BID#x".parse::<DeviceDescription>().is_err());
        assert!(",BID#0".parse::<DeviceDescription>().is_err());
    }
}
