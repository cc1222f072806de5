use std::path::Path;

use config_file::FromConfigFile;
use serde::Deserialize;
use tracing::info;

use crate::bellman::BellmanConfig;
use crate::error::MdpError;
use crate::inventory::InventoryConfig;
use crate::line::LineConfig;
use crate::mrp::MrpConfig;
use crate::portfolio::PortfolioConfig;
use crate::production::ProductionConfig;
use crate::robot::RobotConfig;

/// Everything read from the TOML configuration file. Missing tables and
/// keys fall back to the built-in defaults.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    pub seed: u64,
    pub inventory: InventoryConfig,
    pub production: ProductionConfig,
    pub robot: RobotConfig,
    pub portfolio: PortfolioConfig,
    pub mrp: MrpConfig,
    pub line: LineConfig,
    pub bellman: BellmanConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            seed: 1,
            inventory: InventoryConfig::default(),
            production: ProductionConfig::default(),
            robot: RobotConfig::default(),
            portfolio: PortfolioConfig::default(),
            mrp: MrpConfig::default(),
            line: LineConfig::default(),
            bellman: BellmanConfig::default(),
        }
    }
}

impl SimConfig {
    /// Read `path`, or use the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<SimConfig, MdpError> {
        let Some(path) = path else {
            return Ok(SimConfig::default());
        };
        info!(path = %path.display(), "reading configuration file");
        SimConfig::from_config_file(path)
            .map_err(|e| MdpError::Config(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::DemandRegime;
    use crate::line::Cell;
    use crate::mrp::Activity;
    use crate::portfolio::Market;
    use std::path::PathBuf;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("mdpsim-{}-{name}.toml", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn no_file_means_defaults() {
        let cfg = SimConfig::load(None).unwrap();
        assert_eq!(cfg, SimConfig::default());
        assert_eq!(cfg.seed, 1);
    }

    #[test]
    fn partial_file_overrides_named_keys() {
        // Arrange
        let path = write_temp(
            "partial",
            r#"
seed = 7

[inventory]
max_inventory = 5
high_demand = [2, 4]
start_regime = "High"

[portfolio]
start_market = "Bull"

[mrp]
gamma = 0.9
start = "Pub"

[line]
start = "C"
"#,
        );
        // Act
        let cfg = SimConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();
        // Assert
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.inventory.max_inventory, 5);
        assert_eq!(cfg.inventory.high_demand, vec![2, 4]);
        assert_eq!(cfg.inventory.start_regime, DemandRegime::High);
        assert_eq!(cfg.inventory.price, InventoryConfig::default().price);
        assert_eq!(cfg.portfolio.start_market, Market::Bull);
        assert_eq!(cfg.production, ProductionConfig::default());
        assert_eq!(cfg.mrp.gamma, 0.9);
        assert_eq!(cfg.mrp.start, Activity::Pub);
        assert_eq!(cfg.mrp.steps, MrpConfig::default().steps);
        assert_eq!(cfg.line.start, Cell::C);
    }

    #[test]
    fn bellman_table_from_file() {
        let path = write_temp(
            "bellman",
            r#"
[bellman]
gamma = 0.5
state = "x"
values = { y = 2.0 }

[[bellman.actions]]
name = "go"
policy_prob = 1.0
outcomes = [{ next = "y", reward = 1.0, prob = 1.0 }]
"#,
        );
        let cfg = SimConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(cfg.bellman.actions.len(), 1);
        assert_eq!(cfg.bellman.tolerance, BellmanConfig::default().tolerance);
        let eval = crate::bellman::SingleStateEvaluation::new(&cfg.bellman).unwrap();
        assert_eq!(eval.q_value("go", 0.0), Some(2.0));
    }

    #[test]
    fn sample_file_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("mdpsim.toml");
        assert_eq!(SimConfig::load(Some(&path)).unwrap(), SimConfig::default());
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let path = std::env::temp_dir().join("mdpsim-does-not-exist.toml");
        assert!(matches!(
            SimConfig::load(Some(&path)),
            Err(MdpError::Config(_))
        ));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let path = write_temp("malformed", "seed = \"many\"\n");
        let result = SimConfig::load(Some(&path));
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(MdpError::Config(_))));
    }
}
