use serde::Serialize;

use super::types::ParameterSet;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    Base,
    Conservative,
    Optimistic,
    Custom,
}

/// Growth and acquisition assumptions a scenario pre-fills. Percent values, as entered.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetBundle {
    pub conversion_rate_pct: f64,
    pub viral_growth_multiplier: f64,
    pub deal_growth_rate_pct: f64,
    pub b2c_cac: f64,
    pub enterprise_cac: f64,
}

const BASE_BUNDLE: PresetBundle = PresetBundle {
    conversion_rate_pct: 3.0,
    viral_growth_multiplier: 1.1,
    deal_growth_rate_pct: 20.0,
    b2c_cac: 30.0,
    enterprise_cac: 2_000.0,
};

const CONSERVATIVE_BUNDLE: PresetBundle = PresetBundle {
    conversion_rate_pct: 2.0,
    viral_growth_multiplier: 1.05,
    deal_growth_rate_pct: 15.0,
    b2c_cac: 40.0,
    enterprise_cac: 2_500.0,
};

const OPTIMISTIC_BUNDLE: PresetBundle = PresetBundle {
    conversion_rate_pct: 5.0,
    viral_growth_multiplier: 1.15,
    deal_growth_rate_pct: 30.0,
    b2c_cac: 20.0,
    enterprise_cac: 1_500.0,
};

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::Base,
        Scenario::Conservative,
        Scenario::Optimistic,
        Scenario::Custom,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Scenario::Base => "Base Case",
            Scenario::Conservative => "Conservative",
            Scenario::Optimistic => "Optimistic",
            Scenario::Custom => "Custom",
        }
    }

    /// `None` for `Custom`, which leaves every field to the user.
    pub fn preset(self) -> Option<PresetBundle> {
        match self {
            Scenario::Base => Some(BASE_BUNDLE),
            Scenario::Conservative => Some(CONSERVATIVE_BUNDLE),
            Scenario::Optimistic => Some(OPTIMISTIC_BUNDLE),
            Scenario::Custom => None,
        }
    }

    /// Values used for fields the user left blank; `Custom` falls back to the base case.
    pub fn prefill(self) -> PresetBundle {
        self.preset().unwrap_or(BASE_BUNDLE)
    }
}

impl PresetBundle {
    pub fn apply_to(self, params: &mut ParameterSet) {
        params.conversion_rate = self.conversion_rate_pct / 100.0;
        params.viral_growth_multiplier = self.viral_growth_multiplier;
        params.deal_growth_rate = self.deal_growth_rate_pct / 100.0;
        params.b2c_cac = self.b2c_cac;
        params.enterprise_cac = self.enterprise_cac;
    }
}
