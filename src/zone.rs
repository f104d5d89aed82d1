//! Zone identification and ranking.
//!
//! Zones are ranked as an explicit ordered list of `(target, magnitude)`
//! pairs. Selection is a linear scan where the first maximum (or minimum)
//! in zone order wins, so ties resolve deterministically.

use crate::error::ConfigError;
use crate::reading::Reading;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Ranked magnitude of a zone. Wide enough that a region sum of sensor
/// values never overflows.
pub type ZoneMagnitude = i128;

/// Display labels for the four-zone sock.
pub const FLAT_ZONE_LABELS: [&str; 4] = ["Ankle", "Mid-Calf", "Lower Calf", "Calf Pressure"];

/// Label for a sensor zone in the four-zone layout.
pub fn zone_label(index: usize) -> Option<&'static str> {
    FLAT_ZONE_LABELS.get(index).copied()
}

/// A named group of sensors ranked by the sum of their values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    /// 0-based sensor indices belonging to this region.
    pub sensors: Vec<usize>,
}

impl Region {
    pub fn new(name: impl Into<String>, sensors: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            sensors,
        }
    }
}

/// How sensors map to rankable zones.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ZoneLayout {
    /// One zone per sensor.
    #[default]
    Flat,
    /// Sensors grouped into named regions.
    Grouped(Vec<Region>),
}

impl ZoneLayout {
    /// Nine sensors grouped into three regions of three.
    pub fn three_regions() -> Self {
        ZoneLayout::Grouped(vec![
            Region::new("Ankle", vec![0, 1, 2]),
            Region::new("Calf", vec![3, 4, 5]),
            Region::new("Knee", vec![6, 7, 8]),
        ])
    }

    /// Check every region refers to existing sensors and that region names
    /// read back unambiguously from an action string.
    pub fn validate(&self, zone_count: usize) -> Result<(), ConfigError> {
        let regions = match self {
            ZoneLayout::Flat => return Ok(()),
            ZoneLayout::Grouped(regions) => regions,
        };

        if regions.is_empty() {
            return Err(ConfigError::invalid(
                "zones.layout",
                "grouped layout needs at least one region",
            ));
        }

        for (i, region) in regions.iter().enumerate() {
            let name = region.name.trim();
            if name.is_empty() || name != region.name {
                return Err(ConfigError::invalid(
                    "zones.layout",
                    format!("region name {:?} must be non-empty and untrimmed", region.name),
                ));
            }
            if parse_sensor_label(name).is_some() {
                return Err(ConfigError::invalid(
                    "zones.layout",
                    format!("region name {:?} collides with a sensor label", region.name),
                ));
            }
            if regions[..i].iter().any(|r| r.name == region.name) {
                return Err(ConfigError::invalid(
                    "zones.layout",
                    format!("duplicate region name {:?}", region.name),
                ));
            }
            if region.sensors.is_empty() {
                return Err(ConfigError::invalid(
                    "zones.layout",
                    format!("region {:?} has no sensors", region.name),
                ));
            }
            if let Some(&bad) = region.sensors.iter().find(|&&s| s >= zone_count) {
                return Err(ConfigError::invalid(
                    "zones.layout",
                    format!(
                        "region {:?} refers to sensor {} but only {} zones exist",
                        region.name, bad, zone_count
                    ),
                ));
            }
        }

        Ok(())
    }

    /// Rank the zones of a reading.
    pub fn rank(&self, reading: &Reading) -> ZoneRanking {
        let entries = match self {
            ZoneLayout::Flat => reading
                .iter()
                .enumerate()
                .map(|(i, v)| (ZoneTarget::Sensor(i), ZoneMagnitude::from(v)))
                .collect(),
            ZoneLayout::Grouped(regions) => regions
                .iter()
                .map(|region| {
                    let sum = region
                        .sensors
                        .iter()
                        .filter_map(|&s| reading.get(s))
                        .map(ZoneMagnitude::from)
                        .sum::<ZoneMagnitude>();
                    (ZoneTarget::Region(region.name.clone()), sum)
                })
                .collect(),
        };

        ZoneRanking { entries }
    }
}

/// The zone an action is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneTarget {
    /// A single sensor (0-based index, displayed 1-based).
    Sensor(usize),
    /// A named region of sensors.
    Region(String),
}

impl ZoneTarget {
    /// Sensor index for flat targets.
    pub fn sensor_index(&self) -> Option<usize> {
        match self {
            ZoneTarget::Sensor(i) => Some(*i),
            ZoneTarget::Region(_) => None,
        }
    }
}

impl fmt::Display for ZoneTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneTarget::Sensor(i) => write!(f, "Zone {}", i + 1),
            ZoneTarget::Region(name) => write!(f, "{}", name),
        }
    }
}

/// 0-based sensor index of a `"Zone N"` label.
fn parse_sensor_label(s: &str) -> Option<usize> {
    let n = s.strip_prefix("Zone ")?.trim().parse::<usize>().ok()?;
    n.checked_sub(1)
}

/// Inverse of `Display`: `"Zone 3"` is sensor 2, anything else is a region
/// name. Layout validation keeps region names out of the `"Zone N"` form.
impl FromStr for ZoneTarget {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match parse_sensor_label(s) {
            Some(index) => ZoneTarget::Sensor(index),
            None => ZoneTarget::Region(s.to_string()),
        })
    }
}

/// Per-zone magnitudes for one reading, in zone order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneRanking {
    entries: Vec<(ZoneTarget, ZoneMagnitude)>,
}

impl ZoneRanking {
    pub fn entries(&self) -> &[(ZoneTarget, ZoneMagnitude)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Zone with the largest magnitude; first one wins on ties.
    pub fn max(&self) -> Option<&ZoneTarget> {
        self.select(|candidate, best| candidate > best)
    }

    /// Zone with the smallest magnitude; first one wins on ties.
    pub fn min(&self) -> Option<&ZoneTarget> {
        self.select(|candidate, best| candidate < best)
    }

    fn select(&self, better: impl Fn(ZoneMagnitude, ZoneMagnitude) -> bool) -> Option<&ZoneTarget> {
        let mut iter = self.entries.iter();
        let (mut best_target, mut best_value) = match iter.next() {
            Some((target, value)) => (target, *value),
            None => return None,
        };

        for (target, value) in iter {
            if better(*value, best_value) {
                best_target = target;
                best_value = *value;
            }
        }

        Some(best_target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_ranking_first_max_wins() {
        let ranking = ZoneLayout::Flat.rank(&Reading::uniform(1000, 4));
        assert_eq!(ranking.max(), Some(&ZoneTarget::Sensor(0)));
        assert_eq!(ranking.min(), Some(&ZoneTarget::Sensor(0)));
    }

    #[test]
    fn test_flat_ranking_selects_extremes() {
        let ranking = ZoneLayout::Flat.rank(&Reading::new(vec![1200, 2000, 100, 2000]));
        assert_eq!(ranking.max(), Some(&ZoneTarget::Sensor(1)));
        assert_eq!(ranking.min(), Some(&ZoneTarget::Sensor(2)));
    }

    #[test]
    fn test_grouped_ranking_uses_region_sums() {
        let layout = ZoneLayout::three_regions();
        // Single hottest sensor is in "Knee", but "Calf" has the largest sum.
        let reading = Reading::new(vec![100, 100, 100, 900, 900, 900, 1500, 0, 0]);
        let ranking = layout.rank(&reading);

        assert_eq!(ranking.len(), 3);
        assert_eq!(ranking.entries()[1].1, 2700);
        assert_eq!(ranking.max(), Some(&ZoneTarget::Region("Calf".to_string())));
        assert_eq!(ranking.min(), Some(&ZoneTarget::Region("Ankle".to_string())));
    }

    #[test]
    fn test_grouped_ranking_first_region_wins_ties() {
        let layout = ZoneLayout::three_regions();
        let ranking = layout.rank(&Reading::new(vec![300, 300, 300, 500, 200, 200, 100, 400, 400]));

        assert_eq!(ranking.max(), Some(&ZoneTarget::Region("Ankle".to_string())));
        assert_eq!(ranking.min(), Some(&ZoneTarget::Region("Ankle".to_string())));
    }

    #[test]
    fn test_grouped_ranking_large_values() {
        let layout = ZoneLayout::three_regions();
        let big = i64::MAX - 1;
        let reading = Reading::new(vec![big, big, big, i64::MIN, i64::MIN, 0, 1, 1, 1]);
        let ranking = layout.rank(&reading);

        assert_eq!(ranking.entries()[0].1, 3 * ZoneMagnitude::from(big));
        assert_eq!(ranking.entries()[1].1, 2 * ZoneMagnitude::from(i64::MIN));
        assert_eq!(ranking.max(), Some(&ZoneTarget::Region("Ankle".to_string())));
        assert_eq!(ranking.min(), Some(&ZoneTarget::Region("Calf".to_string())));
    }

    #[test]
    fn test_region_names_must_read_back() {
        let sensors = |name: &str| Region::new(name, vec![0]);

        assert!(ZoneLayout::Grouped(vec![sensors("Zone 2")]).validate(4).is_err());
        assert!(ZoneLayout::Grouped(vec![sensors(" Calf")]).validate(4).is_err());
        assert!(ZoneLayout::Grouped(vec![sensors("")]).validate(4).is_err());
        assert!(ZoneLayout::Grouped(vec![sensors("Calf"), sensors("Calf")])
            .validate(4)
            .is_err());

        // Not a sensor label: "Zone 0" has no 1-based index.
        assert!(ZoneLayout::Grouped(vec![sensors("Zone 0"), sensors("Zone A")])
            .validate(4)
            .is_ok());
        assert_eq!(
            "Zone 0".parse::<ZoneTarget>().unwrap(),
            ZoneTarget::Region("Zone 0".to_string())
        );
    }

    #[test]
    fn test_empty_ranking() {
        let ranking = ZoneLayout::Flat.rank(&Reading::new(vec![]));
        assert!(ranking.is_empty());
        assert!(ranking.max().is_none());
    }

    #[test]
    fn test_layout_validation() {
        assert!(ZoneLayout::Flat.validate(4).is_ok());
        assert!(ZoneLayout::three_regions().validate(9).is_ok());
        assert!(ZoneLayout::three_regions().validate(4).is_err());
        assert!(ZoneLayout::Grouped(vec![]).validate(9).is_err());
        assert!(ZoneLayout::Grouped(vec![Region::new("Empty", vec![])])
            .validate(9)
            .is_err());
    }

    #[test]
    fn test_zone_target_display_roundtrip() {
        let sensor = ZoneTarget::Sensor(0);
        assert_eq!(sensor.to_string(), "Zone 1");
        assert_eq!("Zone 1".parse::<ZoneTarget>().unwrap(), sensor);

        let region = ZoneTarget::Region("Calf".to_string());
        assert_eq!(region.to_string(), "Calf");
        assert_eq!("Calf".parse::<ZoneTarget>().unwrap(), region);
    }

    #[test]
    fn test_zone_labels() {
        assert_eq!(zone_label(0), Some("Ankle"));
        assert_eq!(zone_label(3), Some("Calf Pressure"));
        assert_eq!(zone_label(4), None);
    }
}
