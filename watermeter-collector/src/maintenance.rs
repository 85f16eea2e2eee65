//! Maintenance logger commands: record salt refills and other service work, and
//! report on what was done recently.

use clap::{Parser, Subcommand};
use sqlx::postgres::PgConnection;
use time::{macros::format_description, OffsetDateTime, UtcOffset};
use watermeter_db::{
    db,
    domain::{days_since, MaintenanceEvent, NewMaintenanceEvent, SALT_REPLACEMENT},
    DbError,
};

pub const DEFAULT_LIST_DAYS: i32 = 30;
const CREATED_BY: &str = "manual";

#[derive(Parser, Debug)]
#[command(
    name = "maintenance_logger",
    about = "Log water system maintenance activities",
    infer_long_args = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<MaintenanceCommand>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum MaintenanceCommand {
    /// Log salt block replacement
    #[command(infer_long_args = true)]
    Salt {
        /// Quantity of salt (kg)
        #[arg(long)]
        quantity: Option<f64>,
        /// Cost of salt blocks (EUR)
        #[arg(long)]
        cost: Option<f64>,
        /// Additional notes
        #[arg(long)]
        notes: Option<String>,
        /// Brand of salt blocks
        #[arg(long)]
        brand: Option<String>,
    },
    /// Log general maintenance
    #[command(infer_long_args = true)]
    Log {
        /// Maintenance type (e.g. filter_change, inspection, repair)
        #[arg(value_name = "TYPE")]
        maintenance_type: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        quantity: Option<f64>,
        /// Unit of quantity
        #[arg(long)]
        unit: Option<String>,
        /// Cost (EUR)
        #[arg(long)]
        cost: Option<f64>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List recent maintenance
    #[command(infer_long_args = true)]
    List {
        /// Number of days to look back
        #[arg(long, default_value_t = DEFAULT_LIST_DAYS, value_parser = clap::value_parser!(i32).range(0..))]
        days: i32,
    },
    /// Show last salt replacement
    LastSalt,
    /// Show most recent maintenance activity of any type
    LastChange,
}

impl MaintenanceCommand {
    /// The event this command records, if it records one.
    pub fn new_event(&self, meter_id: &str) -> Option<NewMaintenanceEvent> {
        match self {
            Self::Salt {
                quantity,
                cost,
                notes,
                brand,
            } => {
                let description = match brand {
                    Some(brand) => format!("Salt block replacement ({brand})"),
                    None => "Salt block replacement".to_string(),
                };
                Some(NewMaintenanceEvent {
                    meter_id: meter_id.to_string(),
                    maintenance_type: SALT_REPLACEMENT.to_string(),
                    description: Some(description),
                    quantity: *quantity,
                    unit: quantity.filter(|q| *q != 0.0).map(|_| "kg".to_string()),
                    cost: *cost,
                    notes: notes.clone(),
                    created_by: CREATED_BY.to_string(),
                })
            }
            Self::Log {
                maintenance_type,
                description,
                quantity,
                unit,
                cost,
                notes,
            } => Some(NewMaintenanceEvent {
                meter_id: meter_id.to_string(),
                maintenance_type: maintenance_type.clone(),
                description: description.clone(),
                quantity: *quantity,
                unit: unit.clone(),
                cost: *cost,
                notes: notes.clone(),
                created_by: CREATED_BY.to_string(),
            }),
            _ => None,
        }
    }
}

/// Run `command` for `meter_id`, writing the report through tracing.
pub async fn execute(
    conn: &mut PgConnection,
    meter_id: &str,
    command: &MaintenanceCommand,
) -> Result<(), DbError> {
    let now = OffsetDateTime::now_utc();

    if let Some(event) = command.new_event(meter_id) {
        let stored = db::insert_maintenance_event(conn, &event, now).await?;
        tracing::info!(id = stored.id, "maintenance logged");
        for line in logged_lines(&stored) {
            tracing::info!("{line}");
        }
        return Ok(());
    }

    let lines = match command {
        MaintenanceCommand::List { days } => {
            let events = db::recent_maintenance(conn, meter_id, *days).await?;
            list_lines(&events, *days)
        }
        MaintenanceCommand::LastSalt => {
            let event = db::last_maintenance_of_type(conn, meter_id, SALT_REPLACEMENT).await?;
            last_salt_lines(event.as_ref(), now)
        }
        MaintenanceCommand::LastChange => {
            let event = db::last_maintenance(conn, meter_id).await?;
            last_change_lines(event.as_ref(), now)
        }
        _ => Vec::new(),
    };
    for line in lines {
        tracing::info!("{line}");
    }
    Ok(())
}

pub fn format_time(time: OffsetDateTime) -> String {
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]");
    let utc = time.to_offset(UtcOffset::UTC);
    utc.format(&fmt).unwrap_or_else(|_| utc.to_string())
}

fn detail_lines(e: &MaintenanceEvent, with_cost: bool) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(description) = non_empty(&e.description) {
        lines.push(format!("   Description: {description}"));
    }
    if let (Some(quantity), Some(unit)) = (non_zero(e.quantity), non_empty(&e.unit)) {
        lines.push(format!("   Quantity: {quantity:.3} {unit}"));
    }
    if with_cost {
        if let Some(cost) = non_zero(e.cost) {
            lines.push(format!("   Cost: €{cost:.2}"));
        }
    }
    if let Some(notes) = non_empty(&e.notes) {
        lines.push(format!("   Notes: {notes}"));
    }
    lines
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn non_zero(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0)
}

fn logged_lines(e: &MaintenanceEvent) -> Vec<String> {
    let mut lines = vec![
        format!("   ID: {}", e.id),
        format!("   Time: {}", format_time(e.time)),
        format!("   Type: {}", e.maintenance_type),
    ];
    if let Some(description) = non_empty(&e.description) {
        lines.push(format!("   Description: {description}"));
    }
    lines
}

pub fn list_lines(events: &[MaintenanceEvent], days: i32) -> Vec<String> {
    if events.is_empty() {
        return vec![format!("No maintenance activities found in the last {days} days.")];
    }

    let mut lines = vec![
        format!("Recent maintenance activities (last {days} days):"),
        "-".repeat(80),
    ];
    for e in events {
        lines.push(format!("{} - {}", format_time(e.time), e.maintenance_type));
        lines.extend(detail_lines(e, true));
        lines.push(format!("   Logged by: {}", e.created_by.as_deref().unwrap_or("unknown")));
    }
    lines
}

pub fn last_salt_lines(event: Option<&MaintenanceEvent>, now: OffsetDateTime) -> Vec<String> {
    let Some(e) = event else {
        return vec!["No salt replacements recorded yet.".to_string()];
    };
    let mut lines = vec![format!(
        "Last salt replacement: {} ({} days ago)",
        format_time(e.time),
        days_since(e.time, now)
    )];
    lines.extend(detail_lines(e, false));
    lines
}

pub fn last_change_lines(event: Option<&MaintenanceEvent>, now: OffsetDateTime) -> Vec<String> {
    let Some(e) = event else {
        return vec!["No maintenance activities recorded yet.".to_string()];
    };
    let mut lines = vec![format!(
        "Last maintenance: {} on {} ({} days ago)",
        e.maintenance_type,
        format_time(e.time),
        days_since(e.time, now)
    )];
    lines.extend(detail_lines(e, true));
    lines
}
