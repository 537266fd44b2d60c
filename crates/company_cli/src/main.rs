//! Command-line front end for the company registry.
//!
//! # Responsibility
//! - Wire config, logging, store and service together for one request.
//! - Print results as JSON on stdout and failures as JSON on stderr.

use clap::{Parser, Subcommand};
use company_core::error::ERR_UNEXPECTED_DATABASE;
use company_core::{
    init_logging, AppConfig, AppError, CompanyField, CompanyPatch, CompanyService, CompanyType,
    CreateCompanyRequest, EventKind, EventQuery, PatchValue, RequestContext,
    SqliteCompanyRepository, SqliteEventJournal, Store,
};
use log::error;
use serde::Serialize;
use serde_json::json;
use std::process::ExitCode;
use std::time::Duration;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "company")]
#[command(about = "Manage registered companies")]
#[command(version)]
struct Cli {
    /// Per-request deadline in milliseconds.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a new company.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        employees: u32,
        #[arg(long)]
        registered: bool,
        #[arg(long = "type")]
        kind: CompanyType,
    },
    /// Show a live company.
    Get { id: Uuid },
    /// Change selected fields, e.g. `--set name=Globex --set registered=true`.
    Update {
        id: Uuid,
        #[arg(long = "set", value_parser = parse_assignment, required = true)]
        set: Vec<PatchValue>,
    },
    /// Soft-delete a company.
    Delete { id: Uuid },
    /// List journal entries, newest first.
    Events {
        #[arg(long = "type", value_parser = parse_event_kind)]
        kind: Option<EventKind>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Report database connectivity and pool usage.
    Health,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", json!({ "error": err.to_string() }));
            return ExitCode::from(2);
        }
    };
    if let Err(err) = init_logging(&config.log.level, config.log.dir.as_deref()) {
        eprintln!("{}", json!({ "error": err }));
        return ExitCode::from(2);
    }
    config.log_summary();

    let store = match Store::open(&config.db) {
        Ok(store) => store,
        Err(err) => {
            error!("event=cli_start module=cli status=error error={}", err);
            eprintln!("{}", json!({ "status": 500, "error": "database unavailable" }));
            return ExitCode::FAILURE;
        }
    };

    let ctx = match cli.timeout_ms {
        Some(ms) => RequestContext::with_timeout(Duration::from_millis(ms)),
        None => RequestContext::new(),
    };
    let service = CompanyService::new(
        SqliteCompanyRepository::new(store.clone()).with_journal_policy(config.journal_policy),
    );

    match run(cli.command, &ctx, &store, &service) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!(
                "{}",
                json!({
                    "status": err.status_code(),
                    "error": err.message(),
                    "requestId": ctx.request_id(),
                })
            );
            ExitCode::FAILURE
        }
    }
}

fn run(
    command: Command,
    ctx: &RequestContext,
    store: &Store,
    service: &CompanyService<SqliteCompanyRepository>,
) -> Result<serde_json::Value, AppError> {
    match command {
        Command::Create {
            name,
            description,
            employees,
            registered,
            kind,
        } => {
            let company = service.create_company(
                ctx,
                CreateCompanyRequest {
                    name,
                    description,
                    amount_of_employees: employees,
                    registered,
                    kind,
                },
            )?;
            to_json(&company)
        }
        Command::Get { id } => to_json(&service.get_company(ctx, id)?),
        Command::Update { id, set } => {
            let mut patch = CompanyPatch::new();
            for value in set {
                patch.set(value);
            }
            to_json(&service.update_company(ctx, id, patch)?)
        }
        Command::Delete { id } => {
            service.delete_company(ctx, id)?;
            Ok(json!({ "id": id, "deleted": true }))
        }
        Command::Events { kind, limit } => {
            let conn = store
                .connection(ctx)
                .map_err(|err| AppError::internal(ERR_UNEXPECTED_DATABASE, err))?;
            let events =
                SqliteEventJournal::new().list_events(&conn, &EventQuery { kind, limit })?;
            to_json(&events)
        }
        Command::Health => to_json(&store.health()),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(value)
        .map_err(|err| AppError::internal("failed to encode response", err))
}

fn parse_assignment(raw: &str) -> Result<PatchValue, String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got `{raw}`"))?;
    let field: CompanyField = field.trim().parse().map_err(|err| format!("{err}"))?;
    PatchValue::parse(field, value).map_err(|err| err.to_string())
}

fn parse_event_kind(raw: &str) -> Result<EventKind, String> {
    [
        EventKind::CompanyCreated,
        EventKind::CompanyUpdated,
        EventKind::CompanyDeleted,
    ]
    .into_iter()
    .find(|kind| kind.as_str() == raw.trim())
    .ok_or_else(|| format!("unknown event type `{raw}`"))
}

#[cfg(test)]
mod tests {
    use super::{parse_assignment, parse_event_kind};
    use company_core::{CompanyType, EventKind, PatchValue};

    #[test]
    fn assignment_parses_known_fields() {
        assert_eq!(
            parse_assignment("amountOfEmployees=12").unwrap(),
            PatchValue::AmountOfEmployees(12)
        );
        assert_eq!(
            parse_assignment("type=NonProfit").unwrap(),
            PatchValue::Type(CompanyType::NonProfit)
        );
        assert!(parse_assignment("name").is_err());
        assert!(parse_assignment("owner=bob").is_err());
    }

    #[test]
    fn event_kind_parses_wire_names() {
        assert_eq!(
            parse_event_kind("company_deleted").unwrap(),
            EventKind::CompanyDeleted
        );
        assert!(parse_event_kind("company_renamed").is_err());
    }
}
