use serde::Serialize;

/// Business assumptions for one projection run. Rates are fractions, not percent.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    pub b2c_price: f64,
    pub enterprise_price: f64,
    pub initial_free_users: f64,
    pub monthly_free_user_growth: f64,
    pub viral_growth_multiplier: f64,
    pub conversion_rate: f64,
    pub paid_churn_rate: f64,
    pub enterprise_launch_month: u32,
    pub avg_seats_per_deal: f64,
    pub initial_deals_per_month: f64,
    pub deal_growth_rate: f64,
    pub enterprise_churn_rate: f64,
    pub llm_cost_per_user: f64,
    pub infrastructure_base_cost: f64,
    pub infrastructure_cost_per_user: f64,
    pub b2c_cac: f64,
    pub enterprise_cac: f64,
    pub marketing_spend: f64,
    pub office_and_misc: f64,
    pub founders_count: u32,
    pub founder_salary: f64,
    pub engineers_count: u32,
    pub engineer_salary: f64,
    pub sales_reps_count: u32,
    pub sales_rep_salary: f64,
    pub sales_hire_month: u32,
    pub initial_cash: f64,
}

impl ParameterSet {
    pub fn base_case() -> Self {
        Self {
            b2c_price: 20.0,
            enterprise_price: 14.0,
            initial_free_users: 300.0,
            monthly_free_user_growth: 200.0,
            viral_growth_multiplier: 1.1,
            conversion_rate: 3.0 / 100.0,
            paid_churn_rate: 5.0 / 100.0,
            enterprise_launch_month: 6,
            avg_seats_per_deal: 25.0,
            initial_deals_per_month: 1.0,
            deal_growth_rate: 20.0 / 100.0,
            enterprise_churn_rate: 3.0 / 100.0,
            llm_cost_per_user: 2.0,
            infrastructure_base_cost: 500.0,
            infrastructure_cost_per_user: 0.1,
            b2c_cac: 30.0,
            enterprise_cac: 2_000.0,
            marketing_spend: 2_000.0,
            office_and_misc: 1_000.0,
            founders_count: 2,
            founder_salary: 3_000.0,
            engineers_count: 1,
            engineer_salary: 5_000.0,
            sales_reps_count: 0,
            sales_rep_salary: 4_000.0,
            sales_hire_month: 6,
            initial_cash: 150_000.0,
        }
    }
}

/// Months of cash left at the current burn.
///
/// `Finite` only exists while the business is burning and still holds cash.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Runway {
    Finite { months: u32 },
    SelfSustaining,
    OutOfCash,
}

impl Runway {
    /// Scalar view where 0 stands for both non-finite cases.
    pub fn months(self) -> u32 {
        match self {
            Runway::Finite { months } => months,
            Runway::SelfSustaining | Runway::OutOfCash => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRecord {
    pub month: u32,
    pub new_free_users: u64,
    pub free_users: u64,
    pub new_conversions: u64,
    pub paid_users: u64,
    pub new_deals: u64,
    pub total_enterprise_deals: u64,
    pub enterprise_seats: u64,
    pub total_active_users: u64,
    pub b2c_mrr: f64,
    pub enterprise_mrr: f64,
    pub total_revenue: f64,
    pub llm_costs: f64,
    pub infrastructure_costs: f64,
    pub total_cogs: f64,
    pub b2c_acquisition_cost: f64,
    pub enterprise_acquisition_cost: f64,
    pub total_cac: f64,
    pub team_costs: f64,
    pub marketing_spend: f64,
    pub office_and_misc: f64,
    pub total_opex: f64,
    pub gross_profit: f64,
    pub gross_margin_pct: f64,
    pub net_income: f64,
    pub net_burn: f64,
    pub cash_balance: f64,
    pub runway: Runway,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CashStatus {
    Critical,
    Monitor,
    Healthy,
}

/// Share of final-month revenue by segment, in percent.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueMix {
    pub b2c_pct: f64,
    pub enterprise_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionSummary {
    pub break_even_month: Option<u32>,
    pub annual_run_rate: f64,
    pub gross_margin_pct: f64,
    pub cash_flow_positive: bool,
    pub cash_status: CashStatus,
    pub revenue_mix: Option<RevenueMix>,
    pub final_month: MonthlyRecord,
}
