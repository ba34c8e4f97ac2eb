use rollcall_core::config::{AppConfig, LoadOptions};
use rollcall_core::{read_roster, RosterSource};
use rollcall_sheets::SheetsClient;
use secrecy::ExposeSecret;
use serde::Serialize;

use super::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool, sheet: Option<&str>, tab: Option<&str>) -> CommandResult {
    let report = build_report(sheet, tab);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(sheet: Option<&str>, tab: Option<&str>) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_slack_tokens(&config));
            checks.push(check_sheet_access(&config, sheet, tab));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["slack_token_readiness", "sheet_access"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_slack_tokens(config: &AppConfig) -> DoctorCheck {
    let app = config.slack.app_token.expose_secret();
    let bot = config.slack.bot_token.expose_secret();
    DoctorCheck {
        name: "slack_token_readiness",
        status: CheckStatus::Pass,
        details: format!(
            "app token ({} chars) and bot token ({} chars) match the expected prefixes",
            app.len(),
            bot.len()
        ),
    }
}

fn check_sheet_access(config: &AppConfig, sheet: Option<&str>, tab: Option<&str>) -> DoctorCheck {
    let Some(sheet) = sheet else {
        return DoctorCheck {
            name: "sheet_access",
            status: CheckStatus::Skipped,
            details: "pass --sheet <id> to probe read access".to_string(),
        };
    };
    let source = RosterSource::new(sheet, tab.unwrap_or(&config.sheets.default_tab));

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "sheet_access",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let client = SheetsClient::from_config(&config.sheets)
            .map_err(|error| format!("failed to build sheets client: {error}"))?;
        read_roster(&client, &source)
            .await
            .map_err(|error| format!("failed to read {source}: {error}"))
    });

    match result {
        Ok(roster) => DoctorCheck {
            name: "sheet_access",
            status: CheckStatus::Pass,
            details: format!("read {source}: {} parties", roster.blocks.len()),
        },
        Err(error) => {
            DoctorCheck { name: "sheet_access", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
