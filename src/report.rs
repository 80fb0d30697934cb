//! Plain-text rendering of a projection for the command line.

use crate::core::{CashStatus, MonthlyRecord, ProjectionSummary, Runway, Scenario};

const TABLE_HEADER: [&str; 11] = [
    "Month", "Revenue", "COGS", "GM%", "CAC", "Team", "Opex", "Net Income", "Burn", "Cash",
    "Runway",
];

pub fn format_thousands(value: f64, decimals: usize) -> String {
    format!("£{:.*}K", decimals, value / 1_000.0)
}

pub fn format_millions(value: f64) -> String {
    format!("£{:.2}M", value / 1_000_000.0)
}

pub fn runway_label(runway: Runway) -> String {
    match runway {
        Runway::Finite { months } => format!("{months}mo"),
        Runway::SelfSustaining => "Self-Sustaining".to_string(),
        Runway::OutOfCash => "Out of cash!".to_string(),
    }
}

fn cash_status_label(status: CashStatus) -> &'static str {
    match status {
        CashStatus::Critical => "Critical",
        CashStatus::Monitor => "Monitor",
        CashStatus::Healthy => "Healthy",
    }
}

pub fn render_summary(scenario: Scenario, summary: &ProjectionSummary) -> String {
    let last = &summary.final_month;
    let mut lines = vec![
        format!("Scenario: {}", scenario.label()),
        format!("Month {} ARR: {}", last.month, format_millions(summary.annual_run_rate)),
        format!("Gross margin: {:.1}%", summary.gross_margin_pct),
    ];

    if summary.cash_flow_positive {
        lines.push(format!(
            "Profitability: {} profit/mo",
            format_thousands(last.net_income, 1)
        ));
    } else {
        lines.push(format!("Monthly burn: {}", format_thousands(last.net_burn, 0)));
    }
    lines.push(format!("Cash runway: {}", runway_label(last.runway)));

    lines.push(match summary.break_even_month {
        Some(month) => format!("Break-even: Month {month}"),
        None => "Break-even: Not reached".to_string(),
    });
    lines.push(format!(
        "Cash position: {} ({} at month {})",
        cash_status_label(summary.cash_status),
        format_thousands(last.cash_balance, 0),
        last.month
    ));

    if let Some(mix) = summary.revenue_mix {
        lines.push(format!(
            "Revenue mix: B2C {} ({:.0}%), Enterprise {} ({:.0}%)",
            format_thousands(last.b2c_mrr, 1),
            mix.b2c_pct,
            format_thousands(last.enterprise_mrr, 1),
            mix.enterprise_pct
        ));
    }

    lines.join("\n")
}

pub fn render_table(records: &[MonthlyRecord]) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(table_row(&TABLE_HEADER.map(str::to_string)));

    for row in records {
        lines.push(table_row(&[
            row.month.to_string(),
            format_thousands(row.total_revenue, 1),
            format_thousands(row.total_cogs, 1),
            format!("{:.1}%", row.gross_margin_pct),
            format_thousands(row.total_cac, 1),
            format_thousands(row.team_costs, 1),
            format_thousands(row.total_opex, 1),
            format_thousands(row.net_income, 1),
            format_thousands(row.net_burn, 1),
            format_thousands(row.cash_balance, 0),
            runway_label(row.runway),
        ]));
    }

    lines.join("\n")
}

fn table_row(cells: &[String; 11]) -> String {
    let (month, rest) = cells.split_at(1);
    let mut line = format!("{:>5}", month[0]);
    for cell in rest {
        line.push_str(&format!(" {cell:>12}"));
    }
    line.trim_end().to_string()
}
