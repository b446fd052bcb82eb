//! Simulation scenarios.

use serde::{Deserialize, Serialize};

/// A simulation scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Steps in the scenario.
    pub steps: Vec<ScenarioStep>,
}

/// A step in a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Wait for a duration.
    Wait { millis: u64 },
    /// Feed raw input to the calculator.
    Input { text: String },
    /// Switch the base currency.
    SwitchBase { currency: String },
    /// Ask for rates without new input.
    GetRates,
    /// Reload the active currency list.
    Refresh,
    /// Toggle a currency on or off.
    SetActive { currency: String, active: bool },
    /// Inject a fault.
    InjectFault { fault_type: FaultType },
    /// Clear every injected fault.
    ClearFaults,
    /// Assert a condition.
    Assert { condition: AssertCondition },
}

/// Types of faults that can be injected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultType {
    /// Rate source goes offline.
    SourceOffline,
}

/// Conditions that can be asserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertCondition {
    /// The most recent state has this name.
    LastState { state: String },
    /// The formatted output equals this text.
    OutputEquals { output: String },
    /// The current base is this currency.
    BaseIs { currency: String },
}

impl Scenario {
    /// Load a scenario by name, or from a JSON file when `name` ends in `.json`.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        if name.ends_with(".json") {
            let text = std::fs::read_to_string(name)?;
            return Ok(serde_json::from_str(&text)?);
        }

        match name {
            "basic" => Ok(Self::basic()),
            "offline-fallback" => Ok(Self::offline_fallback()),
            "base-switch" => Ok(Self::base_switch()),
            "few-currencies" => Ok(Self::few_currencies()),
            "maximum-input" => Ok(Self::maximum_input()),
            _ => Err(anyhow::anyhow!("Unknown scenario: {}", name)),
        }
    }

    /// Names of the built-in scenarios.
    pub fn builtin() -> &'static [&'static str] {
        &[
            "basic",
            "offline-fallback",
            "base-switch",
            "few-currencies",
            "maximum-input",
        ]
    }

    fn new(name: &str, description: &str, steps: Vec<ScenarioStep>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            steps,
        }
    }

    fn input(text: &str) -> ScenarioStep {
        ScenarioStep::Input {
            text: text.to_string(),
        }
    }

    fn expect_state(state: &str) -> ScenarioStep {
        ScenarioStep::Assert {
            condition: AssertCondition::LastState {
                state: state.to_string(),
            },
        }
    }

    /// Evaluate a few expressions against live rates.
    fn basic() -> Self {
        Self::new(
            "basic",
            "Live conversion of a handful of expressions",
            vec![
                Self::input("100"),
                Self::expect_state("success"),
                Self::input("2+2*10"),
                ScenarioStep::Assert {
                    condition: AssertCondition::OutputEquals {
                        output: "22".to_string(),
                    },
                },
                Self::input("1500,5"),
                Self::expect_state("success"),
                ScenarioStep::GetRates,
                Self::expect_state("success"),
            ],
        )
    }

    /// Cache a snapshot, lose the network, and fall back to it.
    fn offline_fallback() -> Self {
        Self::new(
            "offline-fallback",
            "Fetch once, go offline, serve cached rates, recover",
            vec![
                Self::input("250"),
                Self::expect_state("success"),
                ScenarioStep::InjectFault {
                    fault_type: FaultType::SourceOffline,
                },
                ScenarioStep::Refresh,
                Self::input("250"),
                Self::expect_state("offline_success"),
                ScenarioStep::SwitchBase {
                    currency: "JPY".to_string(),
                },
                Self::expect_state("error"),
                ScenarioStep::ClearFaults,
                ScenarioStep::GetRates,
                Self::expect_state("success"),
            ],
        )
    }

    /// Move the base around the active list.
    fn base_switch() -> Self {
        Self::new(
            "base-switch",
            "Switch base currency and refetch each time",
            vec![
                Self::input("10"),
                ScenarioStep::SwitchBase {
                    currency: "EUR".to_string(),
                },
                Self::expect_state("success"),
                ScenarioStep::SwitchBase {
                    currency: "GBP".to_string(),
                },
                ScenarioStep::Wait { millis: 50 },
                ScenarioStep::Assert {
                    condition: AssertCondition::BaseIs {
                        currency: "GBP".to_string(),
                    },
                },
            ],
        )
    }

    /// Deactivate currencies until the list is too short.
    fn few_currencies() -> Self {
        let mut steps = vec![Self::input("5"), Self::expect_state("success")];
        for code in ["EUR", "GBP", "CHF", "JPY", "TRY"] {
            steps.push(ScenarioStep::SetActive {
                currency: code.to_string(),
                active: false,
            });
        }
        steps.push(ScenarioStep::Refresh);
        steps.push(Self::input("5"));
        steps.push(Self::expect_state("few_currency"));

        Self::new(
            "few-currencies",
            "Deactivate currencies until only the base remains",
            steps,
        )
    }

    /// Grow the input past the display limit.
    fn maximum_input() -> Self {
        Self::new(
            "maximum-input",
            "Outputs longer than the display are rejected",
            vec![
                Self::input("123456789012"),
                Self::expect_state("success"),
                Self::input("12345678901.5"),
                Self::expect_state("maximum_input"),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_scenarios_load() {
        for name in Scenario::builtin() {
            let scenario = Scenario::load(name).unwrap();
            assert_eq!(scenario.name, *name);
            assert!(!scenario.steps.is_empty());
        }
        assert!(Scenario::load("nope").is_err());
    }

    #[test]
    fn test_scenario_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        std::fs::write(
            &path,
            r#"{
                "name": "custom",
                "description": "hand written",
                "steps": [
                    {"step": "input", "text": "7"},
                    {"step": "switch_base", "currency": "EUR"},
                    {"step": "wait", "millis": 10},
                    {"step": "assert", "condition": {"last_state": {"state": "success"}}}
                ]
            }"#,
        )
        .unwrap();

        let scenario = Scenario::load(path.to_str().unwrap()).unwrap();

        assert_eq!(scenario.steps.len(), 4);
        assert!(matches!(scenario.steps[1], ScenarioStep::SwitchBase { .. }));
    }
}
