//! Deterministic engine scenarios.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// SIM-001: one vehicle, all lights green
    FreeFlow,

    /// SIM-002: a queue held at a long red
    RedLight,

    /// SIM-003: a tight platoon on a green approach
    Platoon,

    /// SIM-004: generated traffic with turns at the intersection
    TurnSweep,

    /// SIM-005: server reset mid-run
    ResetFade,

    /// SIM-006: the server goes silent, then comes back
    StaleFeed,

    /// SIM-007: 3x3 grid of intersections
    CityGrid,

    // ═══════════════════════════════════════════════════
    // TRANSPORT STRESS
    // ═══════════════════════════════════════════════════

    /// SIM-008: 30% loss and 250 ms latency
    LossyFeed,

    /// SIM-009: older server field names
    LegacyWire,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::FreeFlow,
            ScenarioId::RedLight,
            ScenarioId::Platoon,
            ScenarioId::TurnSweep,
            ScenarioId::ResetFade,
            ScenarioId::StaleFeed,
            ScenarioId::CityGrid,
            ScenarioId::LossyFeed,
            ScenarioId::LegacyWire,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::FreeFlow => "free_flow",
            ScenarioId::RedLight => "red_light",
            ScenarioId::Platoon => "platoon",
            ScenarioId::TurnSweep => "turn_sweep",
            ScenarioId::ResetFade => "reset_fade",
            ScenarioId::StaleFeed => "stale_feed",
            ScenarioId::CityGrid => "city_grid",
            ScenarioId::LossyFeed => "lossy_feed",
            ScenarioId::LegacyWire => "legacy_wire",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::FreeFlow => "Single vehicle on green: monotonic odometer, speed within target",
            ScenarioId::RedLight => "Queue at a held red: nobody crosses the stop line",
            ScenarioId::Platoon => "Six vehicles 5 units apart: order is preserved",
            ScenarioId::TurnSweep => "Generated traffic with random turns: headings stay finite",
            ScenarioId::ResetFade => "Reset at 0.2s: old vehicles fade out within the fade window",
            ScenarioId::StaleFeed => "Feed stalls mid-run: countdowns clamp at zero, prediction continues",
            ScenarioId::CityGrid => "Nine intersections: at most one turn per intersection per vehicle",
            ScenarioId::LossyFeed => "30% loss + 250ms latency: no parse errors, lights stay sane",
            ScenarioId::LegacyWire => "Legacy field names: every record accepted",
        }
    }

    /// Returns true if this scenario drives the feed through injected faults.
    pub fn is_transport(&self) -> bool {
        matches!(self, ScenarioId::StaleFeed | ScenarioId::LossyFeed)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free_flow" | "freeflow" | "sim-001" => Ok(ScenarioId::FreeFlow),
            "red_light" | "redlight" | "sim-002" => Ok(ScenarioId::RedLight),
            "platoon" | "sim-003" => Ok(ScenarioId::Platoon),
            "turn_sweep" | "turnsweep" | "sim-004" => Ok(ScenarioId::TurnSweep),
            "reset_fade" | "resetfade" | "sim-005" => Ok(ScenarioId::ResetFade),
            "stale_feed" | "stalefeed" | "sim-006" => Ok(ScenarioId::StaleFeed),
            "city_grid" | "citygrid" | "sim-007" => Ok(ScenarioId::CityGrid),
            "lossy_feed" | "lossyfeed" | "sim-008" => Ok(ScenarioId::LossyFeed),
            "legacy_wire" | "legacywire" | "sim-009" => Ok(ScenarioId::LegacyWire),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for id in ScenarioId::all() {
            assert_eq!(id.name().parse::<ScenarioId>(), Ok(id));
            assert!(!id.description().is_empty());
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!("SIM-002".parse::<ScenarioId>(), Ok(ScenarioId::RedLight));
        assert_eq!("CityGrid".parse::<ScenarioId>(), Ok(ScenarioId::CityGrid));
        assert!("chaos_storm".parse::<ScenarioId>().is_err());
    }
}
