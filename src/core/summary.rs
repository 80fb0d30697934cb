use super::types::{CashStatus, MonthlyRecord, ProjectionSummary, RevenueMix, Runway};

/// Runway beyond this many months counts as healthy.
const HEALTHY_RUNWAY_MONTHS: u32 = 12;

/// First month whose net income is zero or better.
pub fn break_even_month(records: &[MonthlyRecord]) -> Option<u32> {
    records
        .iter()
        .find(|row| row.net_income >= 0.0)
        .map(|row| row.month)
}

/// Headline metrics derived from a projection. `None` only for an empty slice.
pub fn summarize(records: &[MonthlyRecord]) -> Option<ProjectionSummary> {
    let final_month = records.last()?;
    Some(ProjectionSummary {
        break_even_month: break_even_month(records),
        annual_run_rate: final_month.total_revenue * 12.0,
        gross_margin_pct: final_month.gross_margin_pct,
        cash_flow_positive: final_month.net_income >= 0.0,
        cash_status: cash_status(final_month),
        revenue_mix: revenue_mix(final_month),
        final_month: final_month.clone(),
    })
}

fn cash_status(row: &MonthlyRecord) -> CashStatus {
    if row.cash_balance < 0.0 {
        return CashStatus::Critical;
    }
    match row.runway {
        Runway::SelfSustaining => CashStatus::Healthy,
        Runway::Finite { months } if months > HEALTHY_RUNWAY_MONTHS => CashStatus::Healthy,
        Runway::Finite { .. } | Runway::OutOfCash => CashStatus::Monitor,
    }
}

fn revenue_mix(row: &MonthlyRecord) -> Option<RevenueMix> {
    if row.total_revenue <= 0.0 {
        return None;
    }
    Some(RevenueMix {
        b2c_pct: row.b2c_mrr / row.total_revenue * 100.0,
        enterprise_pct: row.enterprise_mrr / row.total_revenue * 100.0,
    })
}
