use std::ffi::OsString;
use std::net::SocketAddr;

use axum::{
    Router,
    extract::{
        Json, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    MonthlyRecord, PROJECTION_MONTHS, ParameterSet, PresetBundle, ProjectionSummary, Scenario,
    run_projection, summarize,
};
use crate::report::{render_summary, render_table};

/// Rejected user input. Messages name the CLI flag at fault.
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("--{flag} must be between {min} and {max}")]
    OutOfRange {
        flag: &'static str,
        min: f64,
        max: f64,
    },
    #[error("--{flag} must be >= {min}")]
    BelowMinimum { flag: &'static str, min: f64 },
    #[error("--{flag} must be a finite number")]
    NotFinite { flag: &'static str },
    #[error("invalid request payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Args(#[from] clap::Error),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("failed to encode projection: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("projection produced no months")]
    EmptyProjection,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliScenario {
    Base,
    Conservative,
    Optimistic,
    Custom,
}

impl From<CliScenario> for Scenario {
    fn from(value: CliScenario) -> Self {
        match value {
            CliScenario::Base => Scenario::Base,
            CliScenario::Conservative => Scenario::Conservative,
            CliScenario::Optimistic => Scenario::Optimistic,
            CliScenario::Custom => Scenario::Custom,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiScenario {
    #[serde(alias = "base-case", alias = "baseCase", alias = "base_case")]
    Base,
    Conservative,
    Optimistic,
    Custom,
}

impl From<ApiScenario> for CliScenario {
    fn from(value: ApiScenario) -> Self {
        match value {
            ApiScenario::Base => CliScenario::Base,
            ApiScenario::Conservative => CliScenario::Conservative,
            ApiScenario::Optimistic => CliScenario::Optimistic,
            ApiScenario::Custom => CliScenario::Custom,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    scenario: Option<ApiScenario>,

    b2c_price: Option<f64>,
    enterprise_price: Option<f64>,
    conversion_rate: Option<f64>,

    initial_free_users: Option<f64>,
    monthly_free_user_growth: Option<f64>,
    viral_growth_multiplier: Option<f64>,
    paid_churn: Option<f64>,

    enterprise_launch_month: Option<u32>,
    avg_seats_per_deal: Option<f64>,
    initial_deals_per_month: Option<f64>,
    deal_growth_rate: Option<f64>,
    enterprise_churn: Option<f64>,

    initial_cash: Option<f64>,
    llm_cost_per_user: Option<f64>,
    infrastructure_base_cost: Option<f64>,
    infrastructure_cost_per_user: Option<f64>,
    b2c_cac: Option<f64>,
    enterprise_cac: Option<f64>,
    marketing_spend: Option<f64>,
    office_and_misc: Option<f64>,

    founders_count: Option<u32>,
    founder_salary: Option<f64>,
    engineers_count: Option<u32>,
    engineer_salary: Option<f64>,
    sales_reps_count: Option<u32>,
    sales_rep_salary: Option<f64>,
    sales_hire_month: Option<u32>,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "saas-forecast project",
    about = "24-month revenue, cost and cash projection for a freemium B2C + enterprise SaaS"
)]
struct Cli {
    #[arg(long, value_enum, default_value_t = CliScenario::Base)]
    scenario: CliScenario,
    #[arg(long, default_value_t = 20.0, help = "B2C price per paid user per month")]
    b2c_price: f64,
    #[arg(long, default_value_t = 14.0, help = "Enterprise price per seat per month")]
    enterprise_price: f64,
    #[arg(
        long,
        help = "Monthly free-to-paid conversion in percent; defaults to the scenario preset"
    )]
    conversion_rate: Option<f64>,
    #[arg(long, default_value_t = 300.0)]
    initial_free_users: f64,
    #[arg(
        long,
        default_value_t = 200.0,
        help = "New free users in the first growth month"
    )]
    monthly_free_user_growth: f64,
    #[arg(
        long,
        help = "Month-over-month multiplier on new free users; defaults to the scenario preset"
    )]
    viral_growth_multiplier: Option<f64>,
    #[arg(long, default_value_t = 5.0, help = "Monthly paid user churn in percent")]
    paid_churn: f64,
    #[arg(long, default_value_t = 6)]
    enterprise_launch_month: u32,
    #[arg(long, default_value_t = 25.0)]
    avg_seats_per_deal: f64,
    #[arg(long, default_value_t = 1.0, help = "Deals closed in the launch month")]
    initial_deals_per_month: f64,
    #[arg(
        long,
        help = "Monthly growth of new deals in percent; defaults to the scenario preset"
    )]
    deal_growth_rate: Option<f64>,
    #[arg(long, default_value_t = 3.0, help = "Monthly seat churn in percent")]
    enterprise_churn: f64,
    #[arg(long, default_value_t = 150_000.0)]
    initial_cash: f64,
    #[arg(long, default_value_t = 2.0, help = "LLM cost per active user per month")]
    llm_cost_per_user: f64,
    #[arg(long, default_value_t = 500.0)]
    infrastructure_base_cost: f64,
    #[arg(long, default_value_t = 0.1)]
    infrastructure_cost_per_user: f64,
    #[arg(long, help = "Cost per B2C conversion; defaults to the scenario preset")]
    b2c_cac: Option<f64>,
    #[arg(long, help = "Cost per enterprise deal; defaults to the scenario preset")]
    enterprise_cac: Option<f64>,
    #[arg(long, default_value_t = 2_000.0)]
    marketing_spend: f64,
    #[arg(long, default_value_t = 1_000.0)]
    office_and_misc: f64,
    #[arg(long, default_value_t = 2)]
    founders_count: u32,
    #[arg(long, default_value_t = 3_000.0)]
    founder_salary: f64,
    #[arg(long, default_value_t = 1)]
    engineers_count: u32,
    #[arg(long, default_value_t = 5_000.0)]
    engineer_salary: f64,
    #[arg(long, default_value_t = 0)]
    sales_reps_count: u32,
    #[arg(long, default_value_t = 4_000.0)]
    sales_rep_salary: f64,
    #[arg(long, default_value_t = 6, help = "First month sales reps are on payroll")]
    sales_hire_month: u32,
    #[arg(long, help = "Print the response as JSON instead of a table")]
    json: bool,
}

#[derive(Debug)]
struct ApiRequest {
    scenario: Scenario,
    params: ParameterSet,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    scenario: Scenario,
    summary: ProjectionSummary,
    months: Vec<MonthlyRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PresetResponse {
    scenario: Scenario,
    label: &'static str,
    preset: Option<PresetBundle>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn check_finite(flag: &'static str, value: f64) -> Result<(), InputError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(InputError::NotFinite { flag })
    }
}

fn check_range(flag: &'static str, value: f64, min: f64, max: f64) -> Result<(), InputError> {
    check_finite(flag, value)?;
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(InputError::OutOfRange { flag, min, max })
    }
}

fn check_min(flag: &'static str, value: f64, min: f64) -> Result<(), InputError> {
    check_finite(flag, value)?;
    if value >= min {
        Ok(())
    } else {
        Err(InputError::BelowMinimum { flag, min })
    }
}

fn check_month(flag: &'static str, month: u32) -> Result<(), InputError> {
    check_range(flag, f64::from(month), 1.0, f64::from(PROJECTION_MONTHS))
}

/// Blank preset-backed flags take the scenario's values; explicit ones win.
fn scenario_bundle(cli: &Cli) -> PresetBundle {
    let preset = Scenario::from(cli.scenario).prefill();
    PresetBundle {
        conversion_rate_pct: cli.conversion_rate.unwrap_or(preset.conversion_rate_pct),
        viral_growth_multiplier: cli
            .viral_growth_multiplier
            .unwrap_or(preset.viral_growth_multiplier),
        deal_growth_rate_pct: cli.deal_growth_rate.unwrap_or(preset.deal_growth_rate_pct),
        b2c_cac: cli.b2c_cac.unwrap_or(preset.b2c_cac),
        enterprise_cac: cli.enterprise_cac.unwrap_or(preset.enterprise_cac),
    }
}

fn build_params(cli: &Cli) -> Result<ParameterSet, InputError> {
    let bundle = scenario_bundle(cli);

    check_min("b2c-price", cli.b2c_price, 1.0)?;
    check_min("enterprise-price", cli.enterprise_price, 1.0)?;
    check_range("conversion-rate", bundle.conversion_rate_pct, 0.0, 100.0)?;

    check_min("initial-free-users", cli.initial_free_users, 0.0)?;
    check_min("monthly-free-user-growth", cli.monthly_free_user_growth, 0.0)?;
    check_range(
        "viral-growth-multiplier",
        bundle.viral_growth_multiplier,
        1.0,
        2.0,
    )?;
    check_range("paid-churn", cli.paid_churn, 0.0, 100.0)?;

    check_month("enterprise-launch-month", cli.enterprise_launch_month)?;
    check_min("avg-seats-per-deal", cli.avg_seats_per_deal, 1.0)?;
    check_min("initial-deals-per-month", cli.initial_deals_per_month, 0.0)?;
    check_range("deal-growth-rate", bundle.deal_growth_rate_pct, 0.0, 200.0)?;
    check_range("enterprise-churn", cli.enterprise_churn, 0.0, 100.0)?;

    check_min("initial-cash", cli.initial_cash, 0.0)?;
    check_min("llm-cost-per-user", cli.llm_cost_per_user, 0.0)?;
    check_min("infrastructure-base-cost", cli.infrastructure_base_cost, 0.0)?;
    check_min(
        "infrastructure-cost-per-user",
        cli.infrastructure_cost_per_user,
        0.0,
    )?;
    check_min("b2c-cac", bundle.b2c_cac, 0.0)?;
    check_min("enterprise-cac", bundle.enterprise_cac, 0.0)?;
    check_min("marketing-spend", cli.marketing_spend, 0.0)?;
    check_min("office-and-misc", cli.office_and_misc, 0.0)?;

    check_min("founder-salary", cli.founder_salary, 0.0)?;
    check_min("engineer-salary", cli.engineer_salary, 0.0)?;
    check_min("sales-rep-salary", cli.sales_rep_salary, 0.0)?;
    check_month("sales-hire-month", cli.sales_hire_month)?;

    let mut params = ParameterSet {
        b2c_price: cli.b2c_price,
        enterprise_price: cli.enterprise_price,
        initial_free_users: cli.initial_free_users,
        monthly_free_user_growth: cli.monthly_free_user_growth,
        viral_growth_multiplier: 0.0,
        conversion_rate: 0.0,
        paid_churn_rate: cli.paid_churn / 100.0,
        enterprise_launch_month: cli.enterprise_launch_month,
        avg_seats_per_deal: cli.avg_seats_per_deal,
        initial_deals_per_month: cli.initial_deals_per_month,
        deal_growth_rate: 0.0,
        enterprise_churn_rate: cli.enterprise_churn / 100.0,
        llm_cost_per_user: cli.llm_cost_per_user,
        infrastructure_base_cost: cli.infrastructure_base_cost,
        infrastructure_cost_per_user: cli.infrastructure_cost_per_user,
        b2c_cac: 0.0,
        enterprise_cac: 0.0,
        marketing_spend: cli.marketing_spend,
        office_and_misc: cli.office_and_misc,
        founders_count: cli.founders_count,
        founder_salary: cli.founder_salary,
        engineers_count: cli.engineers_count,
        engineer_salary: cli.engineer_salary,
        sales_reps_count: cli.sales_reps_count,
        sales_rep_salary: cli.sales_rep_salary,
        sales_hire_month: cli.sales_hire_month,
        initial_cash: cli.initial_cash,
    };
    bundle.apply_to(&mut params);
    Ok(params)
}

/// Parses `project` arguments, runs the projection and renders it as text or JSON.
pub fn run_cli<I, T>(args: I) -> Result<String, CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::try_parse_from(args)?;
    let scenario = Scenario::from(cli.scenario);
    let params = build_params(&cli)?;
    info!(scenario = scenario.label(), "running projection");

    let response = build_project_response(scenario, run_projection(&params))
        .ok_or(CliError::EmptyProjection)?;
    if cli.json {
        return Ok(serde_json::to_string_pretty(&response)?);
    }

    Ok(format!(
        "{}\n\n{}",
        render_summary(response.scenario, &response.summary),
        render_table(&response.months)
    ))
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "projection API listening");
    info!("local access: http://127.0.0.1:{port}/api/project");

    axum::serve(listener, router()).await
}

fn router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/presets", get(presets_handler))
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .fallback(not_found_handler)
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn presets_handler() -> Response {
    let presets: Vec<PresetResponse> = Scenario::ALL
        .into_iter()
        .map(|scenario| PresetResponse {
            scenario,
            label: scenario.label(),
            preset: scenario.preset(),
        })
        .collect();
    json_response(StatusCode::OK, presets)
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(
    payload: Result<Query<ProjectPayload>, QueryRejection>,
) -> Response {
    let payload = payload
        .map(|Query(payload)| payload)
        .map_err(|rejection| InputError::InvalidPayload(rejection.body_text()));
    project_handler_impl(payload).await
}

async fn project_post_handler(payload: Result<Json<ProjectPayload>, JsonRejection>) -> Response {
    let payload = payload
        .map(|Json(payload)| payload)
        .map_err(|rejection| InputError::InvalidPayload(rejection.body_text()));
    project_handler_impl(payload).await
}

async fn project_handler_impl(payload: Result<ProjectPayload, InputError>) -> Response {
    let request = match payload.and_then(api_request_from_payload) {
        Ok(request) => request,
        Err(err) => {
            warn!(%err, "rejected projection request");
            return error_response(StatusCode::BAD_REQUEST, &err.to_string());
        }
    };

    let months = run_projection(&request.params);
    match build_project_response(request.scenario, months) {
        Some(response) => json_response(StatusCode::OK, response),
        None => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "projection produced no months",
        ),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, InputError> {
    let payload = serde_json::from_str::<ProjectPayload>(json)
        .map_err(|e| InputError::InvalidPayload(e.to_string()))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: ProjectPayload) -> Result<ApiRequest, InputError> {
    let mut cli = default_cli_for_api()?;

    if let Some(v) = payload.scenario {
        cli.scenario = v.into();
    }

    if let Some(v) = payload.b2c_price {
        cli.b2c_price = v;
    }
    if let Some(v) = payload.enterprise_price {
        cli.enterprise_price = v;
    }
    if let Some(v) = payload.conversion_rate {
        cli.conversion_rate = Some(v);
    }

    if let Some(v) = payload.initial_free_users {
        cli.initial_free_users = v;
    }
    if let Some(v) = payload.monthly_free_user_growth {
        cli.monthly_free_user_growth = v;
    }
    if let Some(v) = payload.viral_growth_multiplier {
        cli.viral_growth_multiplier = Some(v);
    }
    if let Some(v) = payload.paid_churn {
        cli.paid_churn = v;
    }

    if let Some(v) = payload.enterprise_launch_month {
        cli.enterprise_launch_month = v;
    }
    if let Some(v) = payload.avg_seats_per_deal {
        cli.avg_seats_per_deal = v;
    }
    if let Some(v) = payload.initial_deals_per_month {
        cli.initial_deals_per_month = v;
    }
    if let Some(v) = payload.deal_growth_rate {
        cli.deal_growth_rate = Some(v);
    }
    if let Some(v) = payload.enterprise_churn {
        cli.enterprise_churn = v;
    }

    if let Some(v) = payload.initial_cash {
        cli.initial_cash = v;
    }
    if let Some(v) = payload.llm_cost_per_user {
        cli.llm_cost_per_user = v;
    }
    if let Some(v) = payload.infrastructure_base_cost {
        cli.infrastructure_base_cost = v;
    }
    if let Some(v) = payload.infrastructure_cost_per_user {
        cli.infrastructure_cost_per_user = v;
    }
    if let Some(v) = payload.b2c_cac {
        cli.b2c_cac = Some(v);
    }
    if let Some(v) = payload.enterprise_cac {
        cli.enterprise_cac = Some(v);
    }
    if let Some(v) = payload.marketing_spend {
        cli.marketing_spend = v;
    }
    if let Some(v) = payload.office_and_misc {
        cli.office_and_misc = v;
    }

    if let Some(v) = payload.founders_count {
        cli.founders_count = v;
    }
    if let Some(v) = payload.founder_salary {
        cli.founder_salary = v;
    }
    if let Some(v) = payload.engineers_count {
        cli.engineers_count = v;
    }
    if let Some(v) = payload.engineer_salary {
        cli.engineer_salary = v;
    }
    if let Some(v) = payload.sales_reps_count {
        cli.sales_reps_count = v;
    }
    if let Some(v) = payload.sales_rep_salary {
        cli.sales_rep_salary = v;
    }
    if let Some(v) = payload.sales_hire_month {
        cli.sales_hire_month = v;
    }

    let params = build_params(&cli)?;
    Ok(ApiRequest {
        scenario: cli.scenario.into(),
        params,
    })
}

/// The `project` command as parsed with no flags.
fn default_cli_for_api() -> Result<Cli, InputError> {
    Cli::try_parse_from(["project"])
        .map_err(|e| InputError::InvalidPayload(format!("default arguments rejected: {e}")))
}

fn build_project_response(
    scenario: Scenario,
    months: Vec<MonthlyRecord>,
) -> Option<ProjectResponse> {
    let summary = summarize(&months)?;
    Some(ProjectResponse {
        scenario,
        summary,
        months,
    })
}
