//! Scenario scripts: a JSON array of timed operator and environment actions.

use std::{fs, path::Path};

use lfv_core::utils::Config;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    Rotary,
    Green,
    Blue,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Hold a button down for `hold_ms`.
    Press {
        button: Button,
        #[serde(default = "default_hold_ms")]
        hold_ms: u64,
    },
    /// Turn the encoder by `clicks` detents, negative for counter-clockwise.
    Turn { clicks: i32 },
    /// Line-sensor levels.
    Line { left: u16, right: u16 },
    /// Battery divider levels.
    Battery { logic: u16, drive: u16 },
    /// Speed-sensor edge period, 0 stops the wheel.
    Wheel { period_ms: u64 },
    /// Bytes arriving on the serial port.
    Serial { bytes: Vec<u8> },
}

fn default_hold_ms() -> u64 {
    40
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: Action,
}

/// An error that occurs while loading a script or configuration file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read the file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse the file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Steps sorted by time; steps sharing a time keep their file order.
pub fn load_script(path: &Path) -> Result<Vec<Step>, LoadError> {
    let text = fs::read_to_string(path)?;
    let mut steps: Vec<Step> = serde_json::from_str(&text)?;
    steps.sort_by_key(|s| s.at_ms);
    Ok(steps)
}

pub fn load_config(path: &Path) -> Result<Config, LoadError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_actions() {
        let steps: Vec<Step> = serde_json::from_str(
            r#"[
                {"at_ms": 5, "action": "press", "button": "green"},
                {"at_ms": 9, "action": "turn", "clicks": -3},
                {"at_ms": 0, "action": "line", "left": 300, "right": 280}
            ]"#,
        )
        .unwrap();
        assert!(matches!(
            steps[0].action,
            Action::Press {
                button: Button::Green,
                hold_ms: 40
            }
        ));
        assert!(matches!(steps[1].action, Action::Turn { clicks: -3 }));
        assert_eq!(steps[2].at_ms, 0);
    }

    #[test]
    fn load_errors_convert_and_describe_themselves() {
        let missing = load_script(Path::new("/nonexistent/lfv-script.json")).unwrap_err();
        assert!(matches!(missing, LoadError::Io(_)));
        assert!(missing.to_string().starts_with("cannot read the file"));

        let bad: LoadError = serde_json::from_str::<Vec<Step>>("[{").unwrap_err().into();
        assert!(matches!(bad, LoadError::Json(_)));
        assert!(bad.to_string().starts_with("cannot parse the file"));
    }
}
