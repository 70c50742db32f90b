use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            bail!("latitude {latitude} out of range");
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            bail!("longitude {longitude} out of range");
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Parses the `"<lat>,<lon>"` form used by ipinfo's `loc` field.
impl FromStr for Coordinates {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let (lat, lon) = raw
            .split_once(',')
            .ok_or_else(|| anyhow!("expected \"lat,lon\", got {raw:?}"))?;
        let latitude: f64 = lat
            .trim()
            .parse()
            .map_err(|err| anyhow!("bad latitude {lat:?}: {err}"))?;
        let longitude: f64 = lon
            .trim()
            .parse()
            .map_err(|err| anyhow!("bad longitude {lon:?}: {err}"))?;
        Self::new(latitude, longitude)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

/// Outcome of a geolocation lookup. Absence is a value, not an error, and is
/// never confused with a fix at (0, 0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Location {
    Found(Coordinates),
    Unavailable,
}

impl Location {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            Location::Found(coords) => Some(*coords),
            Location::Unavailable => None,
        }
    }

}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Found(coords) => write!(f, "{coords}"),
            Location::Unavailable => f.write_str("unavailable"),
        }
    }
}

/// The subset of ipinfo.io's response the station cares about.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IpInfo {
    pub ip: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub loc: Option<String>,
}

impl IpInfo {
    pub fn coordinates(&self) -> Result<Coordinates> {
        self.loc
            .as_deref()
            .ok_or_else(|| anyhow!("response has no `loc` field"))?
            .parse()
    }
}
