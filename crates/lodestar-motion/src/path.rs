use std::fmt;

use lodestar_kinematics::Pose;

use crate::error::ConfigError;

/// Marks the end of the waypoint block in a path file.
const END_MARKER: &str = "endData";

/// An immutable waypoint sequence for pure pursuit.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    waypoints: Vec<Pose>,
    speeds: Option<Vec<f64>>,
    lookahead: f64,
}

impl Path {
    /// # Errors
    ///
    /// Returns an error if `waypoints` is empty or `lookahead` is not a
    /// positive finite distance.
    pub fn new(waypoints: Vec<Pose>, lookahead: f64) -> Result<Self, ConfigError> {
        if waypoints.is_empty() {
            return Err(ConfigError::EmptyPath);
        }
        if !(lookahead > 0.0 && lookahead.is_finite()) {
            return Err(ConfigError::Lookahead(lookahead));
        }
        Ok(Path {
            waypoints,
            speeds: None,
            lookahead,
        })
    }

    /// Attaches one target speed per waypoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the lengths differ or a speed is negative or not
    /// finite.
    pub fn with_speeds(mut self, speeds: Vec<f64>) -> Result<Self, ConfigError> {
        if speeds.len() != self.waypoints.len() {
            return Err(ConfigError::PathSpeeds {
                waypoints: self.waypoints.len(),
                speeds: speeds.len(),
            });
        }
        if speeds.iter().any(|s| !(s.is_finite() && *s >= 0.0)) {
            return Err(ConfigError::OutOfRange("path speed"));
        }
        self.speeds = Some(speeds);
        Ok(self)
    }

    /// Parses `x, y, speed` lines.
    ///
    /// Blank lines are skipped and parsing stops at an `endData` line, so
    /// anything a path editor appends after it is ignored.
    pub fn parse(text: &str, lookahead: f64) -> Result<Self, ConfigError> {
        let mut waypoints = Vec::new();
        let mut speeds = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == END_MARKER {
                break;
            }
            let fields = line
                .split(',')
                .map(|f| f.trim().parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ConfigError::PathLine {
                    line: i + 1,
                    reason: e.to_string(),
                })?;
            let [x, y, speed] = fields[..] else {
                return Err(ConfigError::PathLine {
                    line: i + 1,
                    reason: format!("expected 3 fields, found {}", fields.len()),
                });
            };
            waypoints.push(Pose::new(x, y, 0.0));
            speeds.push(speed);
        }
        Path::new(waypoints, lookahead)?.with_speeds(speeds)
    }

    pub fn waypoints(&self) -> &[Pose] {
        &self.waypoints
    }

    pub fn lookahead(&self) -> f64 {
        self.lookahead
    }

    /// Target speed at waypoint `index`, if the path carries speeds.
    pub fn speed_at(&self, index: usize) -> Option<f64> {
        self.speeds.as_ref().and_then(|s| s.get(index).copied())
    }

    /// Number of waypoints. Never zero, since construction rejects an empty
    /// waypoint list.
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Always `false` for a constructed path. Provided alongside
    /// [`len`](Self::len) for the usual collection API.
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn last(&self) -> Pose {
        // Non-empty by construction.
        self.waypoints[self.waypoints.len() - 1]
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Path({} waypoints, lookahead {:.1}, ends at {})",
            self.len(),
            self.lookahead,
            self.last()
        )
    }
}
