mod engine;
mod presets;
mod summary;
mod types;

pub use engine::{PROJECTION_MONTHS, run_projection};
pub use presets::{PresetBundle, Scenario};
pub use summary::{break_even_month, summarize};
pub use types::{CashStatus, MonthlyRecord, ParameterSet, ProjectionSummary, RevenueMix, Runway};
