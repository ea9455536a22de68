//! Status Page commands - incidents and maintenance windows

use chrono::Utc;
use conex_repo::StatusPageClient;
use conex_repo::statuspage::{
    EventKind, IncidentUpdate, NewIncident, api_url_from_env, create_incident_payload,
    maintenance_payload, parse_schedule, resolve_incident_payload, resolve_token,
    update_incident_payload,
};
use serde_json::Value;

use super::OutputFormat;
use crate::error::Result;
use crate::output;

/// Account and rendering options shared by every Status Page command
#[derive(Debug, Clone)]
pub struct Session {
    pub token: Option<String>,
    pub page: String,
    pub ignore_ssl: bool,
    pub keychain_user: Option<String>,
    pub keychain_service: String,
    pub format: OutputFormat,
}

impl Session {
    async fn client(&self) -> Result<StatusPageClient> {
        let token = resolve_token(
            self.token.as_deref(),
            self.keychain_user.as_deref(),
            &self.keychain_service,
        )
        .await?;
        Ok(StatusPageClient::new(&token, &api_url_from_env(), self.ignore_ssl)?)
    }

    fn print(&self, heading: &str, lines: &[(&str, &str)], result: &Value) -> Result<()> {
        match self.format {
            OutputFormat::Json => output::print_json(result),
            OutputFormat::Text => {
                println!("{}", render(heading, lines, result));
                Ok(())
            }
        }
    }
}

fn field(result: &Value, key: &str) -> String {
    match result.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// `heading:` followed by one `label: value` line per field
fn render(heading: &str, lines: &[(&str, &str)], result: &Value) -> String {
    let mut text = format!("{}:", heading);
    for (label, key) in lines {
        text.push('\n');
        text.push_str(&format!("{}: {}", label, field(result, key)));
    }
    text
}

const INCIDENT_LINES: &[(&str, &str)] = &[
    ("Incident ID", "id"),
    ("Created at", "created_at"),
    ("Name", "name"),
    ("Status", "status"),
    ("Impact", "impact"),
    ("URL", "shortlink"),
];

const MAINTENANCE_LINES: &[(&str, &str)] = &[
    ("Maintenance ID", "id"),
    ("Created at", "created_at"),
    ("Name", "name"),
    ("Scheduled for (UTC)", "scheduled_for"),
    ("Status", "status"),
    ("Impact", "impact"),
    ("URL", "shortlink"),
];

pub async fn create_incident(session: &Session, incident: NewIncident) -> Result<()> {
    let client = session.client().await?;
    let fields = create_incident_payload(&incident);
    let result = client.create_incident(&session.page, &fields).await?;
    session.print("Created incident", INCIDENT_LINES, &result)
}

pub async fn update_incident(session: &Session, incident_id: &str, update: IncidentUpdate) -> Result<()> {
    let client = session.client().await?;
    output::info(format!("Updating the incident: {}", incident_id));
    let fields = update_incident_payload(&update);
    let result = client
        .update_incident(&session.page, incident_id, &fields)
        .await?;
    session.print("Updated incident", INCIDENT_LINES, &result)
}

/// Close an incident or a maintenance and mark its components operational
pub async fn resolve_incident(
    session: &Session,
    incident_id: &str,
    event: EventKind,
    components: &[String],
) -> Result<()> {
    let client = session.client().await?;
    output::info(format!("Resolving the incident: {}", incident_id));
    let fields = resolve_incident_payload(event, components);
    let result = client
        .update_incident(&session.page, incident_id, &fields)
        .await?;
    session.print("Resolved incident", INCIDENT_LINES, &result)
}

pub async fn schedule_maintenance(
    session: &Session,
    title: &str,
    message: Option<&str>,
    components: &[String],
    scheduled: &str,
) -> Result<()> {
    let start = parse_schedule(scheduled, Utc::now())?;
    let client = session.client().await?;
    let fields = maintenance_payload(title, message, components, start);
    let result = client.schedule_maintenance(&session.page, &fields).await?;
    session.print("Scheduled maintenance", MAINTENANCE_LINES, &result)
}
