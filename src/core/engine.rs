use tracing::debug;

use super::types::{MonthlyRecord, ParameterSet, Runway};

pub const PROJECTION_MONTHS: u32 = 24;

/// Share of the free pool counted as active when sizing serving costs.
const ACTIVE_FREE_USER_SHARE: f64 = 0.3;

#[derive(Debug)]
struct EngineState {
    total_free_users: f64,
    paid_users: f64,
    enterprise_seats: f64,
    total_enterprise_deals: f64,
    monthly_new_free_users: f64,
    cash_balance: f64,
}

impl EngineState {
    fn seeded(params: &ParameterSet) -> Self {
        Self {
            total_free_users: 0.0,
            paid_users: 0.0,
            enterprise_seats: 0.0,
            total_enterprise_deals: 0.0,
            monthly_new_free_users: params.monthly_free_user_growth,
            cash_balance: params.initial_cash,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct UserFlow {
    new_free_users: f64,
    new_conversions: f64,
    new_deals: f64,
}

#[derive(Debug, Clone, Copy)]
struct CostBreakdown {
    total_active_users: f64,
    llm_costs: f64,
    infrastructure_costs: f64,
    b2c_acquisition_cost: f64,
    enterprise_acquisition_cost: f64,
    team_costs: f64,
}

impl CostBreakdown {
    fn total_cogs(self) -> f64 {
        self.llm_costs + self.infrastructure_costs
    }

    fn total_cac(self) -> f64 {
        self.b2c_acquisition_cost + self.enterprise_acquisition_cost
    }
}

/// Runs the 24-month projection. Each call starts from a fresh state seeded from `params`.
pub fn run_projection(params: &ParameterSet) -> Vec<MonthlyRecord> {
    let mut state = EngineState::seeded(params);
    let records: Vec<MonthlyRecord> = (1..=PROJECTION_MONTHS)
        .map(|month| advance_month(params, &mut state, month))
        .collect();

    debug!(
        months = records.len(),
        final_cash = state.cash_balance,
        paid_users = state.paid_users,
        enterprise_seats = state.enterprise_seats,
        "projection complete"
    );
    records
}

fn advance_month(params: &ParameterSet, state: &mut EngineState, month: u32) -> MonthlyRecord {
    let flow = UserFlow {
        new_free_users: grow_free_users(params, state, month),
        new_conversions: convert_free_users(params, state),
        new_deals: grow_enterprise(params, state, month),
    };

    let b2c_mrr = round_half_even(state.paid_users * params.b2c_price);
    let enterprise_mrr = round_half_even(state.enterprise_seats * params.enterprise_price);
    let total_revenue = b2c_mrr + enterprise_mrr;

    let costs = month_costs(params, state, flow, month);
    let total_cogs = costs.total_cogs();
    let total_cac = costs.total_cac();
    let total_opex = costs.team_costs + params.marketing_spend + params.office_and_misc + total_cac;

    let gross_profit = total_revenue - total_cogs;
    let net_income = gross_profit - total_opex;
    let net_burn = -net_income;

    state.cash_balance += net_income;
    let runway = runway(state.cash_balance, net_burn);

    MonthlyRecord {
        month,
        new_free_users: whole_count(flow.new_free_users),
        free_users: whole_count(state.total_free_users),
        new_conversions: whole_count(flow.new_conversions),
        paid_users: whole_count(state.paid_users),
        new_deals: whole_count(flow.new_deals),
        total_enterprise_deals: whole_count(state.total_enterprise_deals),
        enterprise_seats: whole_count(state.enterprise_seats),
        total_active_users: whole_count(costs.total_active_users),
        b2c_mrr,
        enterprise_mrr,
        total_revenue,
        llm_costs: costs.llm_costs,
        infrastructure_costs: costs.infrastructure_costs,
        total_cogs,
        b2c_acquisition_cost: costs.b2c_acquisition_cost,
        enterprise_acquisition_cost: costs.enterprise_acquisition_cost,
        total_cac,
        team_costs: costs.team_costs,
        marketing_spend: params.marketing_spend,
        office_and_misc: params.office_and_misc,
        total_opex,
        gross_profit,
        gross_margin_pct: gross_margin_pct(gross_profit, total_revenue),
        net_income: round_half_even(net_income),
        net_burn: round_half_even(net_burn),
        cash_balance: round_half_even(state.cash_balance),
        runway,
    }
}

/// The monthly increment compounds, not the stock. Returns the increment added this month.
fn grow_free_users(params: &ParameterSet, state: &mut EngineState, month: u32) -> f64 {
    if month == 1 {
        state.total_free_users = params.initial_free_users.max(0.0);
        return 0.0;
    }

    state.monthly_new_free_users =
        round_half_even(state.monthly_new_free_users * params.viral_growth_multiplier);
    state.total_free_users = (state.total_free_users + state.monthly_new_free_users).max(0.0);
    state.monthly_new_free_users
}

/// Churn is applied unrounded so fractional users accumulate in the paid stock.
fn convert_free_users(params: &ParameterSet, state: &mut EngineState) -> f64 {
    let new_conversions = round_half_even(state.total_free_users * params.conversion_rate);
    let churned_paid_users = state.paid_users * params.paid_churn_rate;

    state.paid_users = (state.paid_users + new_conversions - churned_paid_users).max(0.0);
    state.total_free_users = (state.total_free_users - new_conversions).max(0.0);
    new_conversions
}

fn grow_enterprise(params: &ParameterSet, state: &mut EngineState, month: u32) -> f64 {
    if !enterprise_active(params, month) {
        return 0.0;
    }

    // Anchored at launch each month rather than compounded from last month's rounded deals.
    let elapsed = f64::from(month - params.enterprise_launch_month);
    let new_deals = round_half_even(
        params.initial_deals_per_month * (1.0 + params.deal_growth_rate).powf(elapsed),
    );
    state.total_enterprise_deals += new_deals;

    let new_seats = new_deals * params.avg_seats_per_deal;
    let churned_seats = state.enterprise_seats * params.enterprise_churn_rate;
    state.enterprise_seats = (state.enterprise_seats + new_seats - churned_seats).max(0.0);
    new_deals
}

fn month_costs(
    params: &ParameterSet,
    state: &EngineState,
    flow: UserFlow,
    month: u32,
) -> CostBreakdown {
    let total_active_users = state.paid_users
        + state.enterprise_seats
        + state.total_free_users * ACTIVE_FREE_USER_SHARE;

    let enterprise_acquisition_cost = if enterprise_active(params, month) {
        round_half_even(flow.new_deals * params.enterprise_cac)
    } else {
        0.0
    };

    CostBreakdown {
        total_active_users,
        llm_costs: round_half_even(total_active_users * params.llm_cost_per_user),
        infrastructure_costs: round_half_even(
            params.infrastructure_base_cost
                + total_active_users * params.infrastructure_cost_per_user,
        ),
        b2c_acquisition_cost: round_half_even(flow.new_conversions * params.b2c_cac),
        enterprise_acquisition_cost,
        team_costs: team_costs(params, month),
    }
}

fn team_costs(params: &ParameterSet, month: u32) -> f64 {
    let sales_reps = if month >= params.sales_hire_month {
        params.sales_reps_count
    } else {
        0
    };

    f64::from(params.founders_count) * params.founder_salary
        + f64::from(params.engineers_count) * params.engineer_salary
        + f64::from(sales_reps) * params.sales_rep_salary
}

fn enterprise_active(params: &ParameterSet, month: u32) -> bool {
    month >= params.enterprise_launch_month
}

fn gross_margin_pct(gross_profit: f64, total_revenue: f64) -> f64 {
    if total_revenue > 0.0 {
        round_to_tenth(gross_profit / total_revenue * 100.0)
    } else {
        0.0
    }
}

fn runway(cash_balance: f64, net_burn: f64) -> Runway {
    if net_burn <= 0.0 {
        Runway::SelfSustaining
    } else if cash_balance <= 0.0 {
        Runway::OutOfCash
    } else {
        Runway::Finite {
            months: round_half_even(cash_balance / net_burn) as u32,
        }
    }
}

/// Ties go to the even neighbour: 0.5 -> 0, 1.5 -> 2, 2.5 -> 2.
fn round_half_even(value: f64) -> f64 {
    value.round_ties_even()
}

/// Rounds the exact decimal value of `value`, so 299.95 (stored as 299.9499...) goes down.
fn round_to_tenth(value: f64) -> f64 {
    format!("{value:.1}").parse().unwrap_or(value)
}

fn whole_count(value: f64) -> u64 {
    round_half_even(value).max(0.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Scenario;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_params() -> ParameterSet {
        ParameterSet::base_case()
    }

    fn record(records: &[MonthlyRecord], month: u32) -> &MonthlyRecord {
        &records[(month - 1) as usize]
    }

    #[test]
    fn round_half_even_breaks_ties_to_even() {
        assert_approx(round_half_even(0.5), 0.0);
        assert_approx(round_half_even(1.5), 2.0);
        assert_approx(round_half_even(2.5), 2.0);
        assert_approx(round_half_even(-2.5), -2.0);
        assert_approx(round_half_even(2.6), 3.0);
        assert_approx(round_to_tenth(-290.5555), -290.6);
        assert_approx(round_to_tenth(0.25), 0.2);
        assert_approx(round_to_tenth(0.75), 0.8);
        assert_eq!(whole_count(-3.0), 0);
        assert_eq!(whole_count(24.5), 24);
    }

    #[test]
    fn gross_margin_rounds_the_decimal_value_not_a_scaled_copy() {
        // -299.95 is stored just above the tie, while scaling by 10 lands exactly on -2999.5.
        assert_approx(gross_margin_pct(-5_999.0, 2_000.0), -299.9);
        assert_approx(gross_margin_pct(1.0, 3.0), 33.3);
        assert_approx(gross_margin_pct(-5_812.0, 200.0), -2_906.0);
        assert_approx(gross_margin_pct(100.0, 0.0), 0.0);
    }

    #[test]
    fn run_projection_emits_twenty_four_consecutive_months() {
        let records = run_projection(&sample_params());
        assert_eq!(records.len(), PROJECTION_MONTHS as usize);
        for (idx, row) in records.iter().enumerate() {
            assert_eq!(row.month, idx as u32 + 1);
        }
    }

    #[test]
    fn oracle_base_case_month_one_matches_hand_calculation() {
        let records = run_projection(&sample_params());
        let m1 = record(&records, 1);

        // 300 free users, round(300 * 3%) = 9 convert, 291 stay free.
        assert_eq!(m1.new_free_users, 0);
        assert_eq!(m1.new_conversions, 9);
        assert_eq!(m1.paid_users, 9);
        assert_eq!(m1.free_users, 291);
        assert_eq!(m1.enterprise_seats, 0);
        assert_eq!(m1.new_deals, 0);

        // Active = 9 + 0.3 * 291 = 96.3
        assert_eq!(m1.total_active_users, 96);
        assert_approx(m1.b2c_mrr, 180.0);
        assert_approx(m1.enterprise_mrr, 0.0);
        assert_approx(m1.total_revenue, 180.0);
        assert_approx(m1.llm_costs, 193.0);
        assert_approx(m1.infrastructure_costs, 510.0);
        assert_approx(m1.total_cogs, 703.0);
        assert_approx(m1.b2c_acquisition_cost, 270.0);
        assert_approx(m1.enterprise_acquisition_cost, 0.0);
        assert_approx(m1.total_cac, 270.0);
        assert_approx(m1.team_costs, 11_000.0);
        assert_approx(m1.total_opex, 14_270.0);
        assert_approx(m1.gross_profit, -523.0);
        assert_approx(m1.gross_margin_pct, -290.6);
        assert_approx(m1.net_income, -14_793.0);
        assert_approx(m1.net_burn, 14_793.0);
        assert_approx(m1.cash_balance, 135_207.0);
        assert_eq!(m1.runway, Runway::Finite { months: 9 });
    }

    #[test]
    fn oracle_base_case_month_two_compounds_increment_and_keeps_fractional_churn() {
        let records = run_projection(&sample_params());
        let m2 = record(&records, 2);

        // New free users: round(200 * 1.1) = 220, pool 291 + 220 = 511.
        // Conversions: round(511 * 3%) = 15. Paid: 9 + 15 - 0.45 = 23.55.
        assert_eq!(m2.new_free_users, 220);
        assert_eq!(m2.new_conversions, 15);
        assert_eq!(m2.free_users, 496);
        assert_eq!(m2.paid_users, 24);
        assert_approx(m2.b2c_mrr, 471.0);

        // Active = 23.55 + 0.3 * 496 = 172.35
        assert_eq!(m2.total_active_users, 172);
        assert_approx(m2.llm_costs, 345.0);
        assert_approx(m2.infrastructure_costs, 517.0);
        assert_approx(m2.total_opex, 14_450.0);
        assert_approx(m2.gross_profit, -391.0);
        assert_approx(m2.gross_margin_pct, -83.0);
        assert_approx(m2.net_income, -14_841.0);
        assert_approx(m2.cash_balance, 120_366.0);
        assert_eq!(m2.runway, Runway::Finite { months: 8 });
    }

    #[test]
    fn enterprise_activates_at_launch_month_with_first_deal() {
        let records = run_projection(&sample_params());

        for row in &records[..5] {
            assert_approx(row.enterprise_mrr, 0.0);
            assert_eq!(row.enterprise_seats, 0);
            assert_approx(row.enterprise_acquisition_cost, 0.0);
        }

        let m6 = record(&records, 6);
        assert_eq!(m6.new_deals, 1);
        assert_eq!(m6.total_enterprise_deals, 1);
        assert_eq!(m6.enterprise_seats, 25);
        assert_approx(m6.enterprise_mrr, 350.0);
        assert_approx(m6.enterprise_acquisition_cost, 2_000.0);

        // 25 + 25 - 3% of 25 = 49.25 seats; 49.25 * 14 = 689.5 rounds to 690.
        let m7 = record(&records, 7);
        assert_eq!(m7.new_deals, 1);
        assert_eq!(m7.enterprise_seats, 49);
        assert_approx(m7.enterprise_mrr, 690.0);

        // Deals: round(1.2^3) = round(1.728) = 2 at month 9.
        let m9 = record(&records, 9);
        assert_eq!(m9.new_deals, 2);
        assert_eq!(m9.total_enterprise_deals, 5);
    }

    #[test]
    fn enterprise_launch_in_final_month_only_touches_month_twenty_four() {
        let mut params = sample_params();
        params.enterprise_launch_month = PROJECTION_MONTHS;
        let records = run_projection(&params);

        for row in &records[..23] {
            assert_approx(row.enterprise_mrr, 0.0);
            assert_eq!(row.enterprise_seats, 0);
            assert_eq!(row.new_deals, 0);
            assert_approx(row.enterprise_acquisition_cost, 0.0);
        }
        let last = record(&records, 24);
        assert_eq!(last.new_deals, 1);
        assert_eq!(last.enterprise_seats, 25);
        assert_approx(last.enterprise_acquisition_cost, 2_000.0);
    }

    #[test]
    fn sales_reps_are_paid_from_hire_month() {
        let mut params = sample_params();
        params.sales_reps_count = 2;
        params.sales_rep_salary = 4_000.0;
        params.sales_hire_month = 10;
        let records = run_projection(&params);

        assert_approx(record(&records, 9).team_costs, 11_000.0);
        assert_approx(record(&records, 10).team_costs, 19_000.0);
        assert_approx(record(&records, 24).team_costs, 19_000.0);
    }

    #[test]
    fn zero_revenue_reports_zero_margin_and_runs_out_of_cash() {
        let mut params = sample_params();
        params.initial_free_users = 0.0;
        params.monthly_free_user_growth = 0.0;
        params.enterprise_launch_month = PROJECTION_MONTHS + 1;
        params.initial_cash = 20_000.0;
        let records = run_projection(&params);

        for row in &records {
            assert_approx(row.total_revenue, 0.0);
            assert_approx(row.gross_margin_pct, 0.0);
        }
        // Burn is 500 infra + 11,000 team + 3,000 fixed = 14,500 per month.
        assert_eq!(record(&records, 1).runway, Runway::Finite { months: 0 });
        assert_eq!(record(&records, 2).runway, Runway::OutOfCash);
        assert_approx(record(&records, 24).cash_balance, 20_000.0 - 24.0 * 14_500.0);
        assert_eq!(record(&records, 24).runway.months(), 0);
    }

    #[test]
    fn profitable_months_are_self_sustaining() {
        let mut params = sample_params();
        params.b2c_price = 10_000.0;
        let records = run_projection(&params);

        let m1 = record(&records, 1);
        assert!(m1.net_income >= 0.0);
        assert_eq!(m1.runway, Runway::SelfSustaining);
        assert_eq!(m1.runway.months(), 0);
    }

    #[test]
    fn excess_churn_clamps_stocks_at_zero() {
        let mut params = sample_params();
        params.paid_churn_rate = 3.0;
        params.enterprise_churn_rate = 3.0;
        let records = run_projection(&params);

        // Month 2: 9 + 15 - 300% of 9 = -3 paid users before the floor.
        assert_eq!(record(&records, 1).paid_users, 9);
        assert_eq!(record(&records, 2).paid_users, 0);
        assert_approx(record(&records, 2).b2c_mrr, 0.0);

        // Month 7: 25 + 25 - 300% of 25 = -25 seats before the floor.
        assert_eq!(record(&records, 6).enterprise_seats, 25);
        assert_eq!(record(&records, 7).enterprise_seats, 0);
        assert_approx(record(&records, 7).enterprise_mrr, 0.0);
    }

    #[test]
    fn cash_balance_can_go_negative() {
        let mut params = sample_params();
        params.initial_cash = 0.0;
        let records = run_projection(&params);

        assert!(record(&records, 1).cash_balance < 0.0);
        assert_eq!(record(&records, 1).runway, Runway::OutOfCash);
    }

    #[test]
    fn reruns_with_identical_inputs_are_identical() {
        let params = sample_params();
        assert_eq!(run_projection(&params), run_projection(&params));
    }

    #[test]
    fn optimistic_preset_outgrows_conservative_preset() {
        let mut conservative = sample_params();
        Scenario::Conservative.prefill().apply_to(&mut conservative);
        let mut optimistic = sample_params();
        Scenario::Optimistic.prefill().apply_to(&mut optimistic);

        let low = run_projection(&conservative);
        let high = run_projection(&optimistic);
        assert!(high[23].total_revenue > low[23].total_revenue);
        assert!(high[23].paid_users > low[23].paid_users);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_projection_invariants_hold_for_valid_inputs(
            b2c_price in 1u32..100,
            enterprise_price in 1u32..60,
            initial_free_users in 0u32..5_000,
            monthly_growth in 0u32..2_000,
            viral_bp in 10_000u32..20_001,
            conversion_bp in 0u32..10_001,
            paid_churn_bp in 0u32..10_001,
            launch_month in 1u32..25,
            seats in 1u32..200,
            deals in 0u32..5,
            deal_growth_bp in 0u32..20_001,
            enterprise_churn_bp in 0u32..10_001,
            initial_cash in 0u32..1_000_000
        ) {
            let mut params = sample_params();
            params.b2c_price = b2c_price as f64;
            params.enterprise_price = enterprise_price as f64;
            params.initial_free_users = initial_free_users as f64;
            params.monthly_free_user_growth = monthly_growth as f64;
            params.viral_growth_multiplier = viral_bp as f64 / 10_000.0;
            params.conversion_rate = conversion_bp as f64 / 10_000.0;
            params.paid_churn_rate = paid_churn_bp as f64 / 10_000.0;
            params.enterprise_launch_month = launch_month;
            params.avg_seats_per_deal = seats as f64;
            params.initial_deals_per_month = deals as f64;
            params.deal_growth_rate = deal_growth_bp as f64 / 10_000.0;
            params.enterprise_churn_rate = enterprise_churn_bp as f64 / 10_000.0;
            params.initial_cash = initial_cash as f64;

            let records = run_projection(&params);
            prop_assert_eq!(records.len(), PROJECTION_MONTHS as usize);

            for (idx, row) in records.iter().enumerate() {
                prop_assert_eq!(row.month, idx as u32 + 1);

                if row.month < launch_month {
                    prop_assert!(row.enterprise_mrr == 0.0);
                    prop_assert_eq!(row.enterprise_seats, 0);
                    prop_assert!(row.enterprise_acquisition_cost == 0.0);
                }

                if row.total_revenue > 0.0 {
                    prop_assert!(row.gross_margin_pct <= 100.0);
                } else {
                    prop_assert!(row.gross_margin_pct == 0.0);
                }

                if row.cash_balance <= 0.0 || row.net_income >= 0.0 {
                    prop_assert_eq!(row.runway.months(), 0);
                }
            }

            prop_assert_eq!(run_projection(&params), records);
        }
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_free_pool_never_shrinks_without_conversion_or_churn(
            initial_free_users in 0u32..5_000,
            monthly_growth in 0u32..2_000,
            viral_bp in 10_001u32..20_001,
        ) {
            let mut params = sample_params();
            params.initial_free_users = initial_free_users as f64;
            params.monthly_free_user_growth = monthly_growth as f64;
            params.viral_growth_multiplier = viral_bp as f64 / 10_000.0;
            params.conversion_rate = 0.0;
            params.paid_churn_rate = 0.0;
            params.enterprise_churn_rate = 0.0;

            let records = run_projection(&params);
            for pair in records.windows(2) {
                prop_assert!(pair[1].free_users >= pair[0].free_users);
            }
        }
    }
}
