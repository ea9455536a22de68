//! Status Page incidents and maintenance windows
//!
//! Requests go to `https://api.statuspage.io/v1` (or `$STATUSPAGE_API_URL`)
//! with an `Authorization: OAuth <token>` header.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use indexmap::IndexMap;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::credentials::{Body, ClientOptions, Credentials, SecureHttpClient};
use crate::error::{RepoError, Result};

pub const DEFAULT_API_URL: &str = "https://api.statuspage.io/v1";
pub const API_URL_ENV: &str = "STATUSPAGE_API_URL";
pub const TOKEN_ENV: &str = "STATUSPAGE_TOKEN";
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "statuspage-token";

/// Timestamp layout Status Page accepts, microseconds in UTC
const SCHEDULE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";
const SCHEDULE_INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";
const MAINTENANCE_HOURS: i64 = 8;

/// Component status applied when only components are given
pub const DEFAULT_COMPONENT_STATUS: &str = "major_outage";

/// What `resolve` closes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Incident,
    Maintenance,
}

impl EventKind {
    fn closed_status(self) -> &'static str {
        match self {
            EventKind::Incident => "resolved",
            EventKind::Maintenance => "completed",
        }
    }
}

/// Incident fields; unset ones are left out of the request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IncidentFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact_override: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<IndexMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_ids: Option<Vec<String>>,
}

impl IncidentFields {
    fn set_components(&mut self, components: &[String], status: &str) {
        self.components = Some(
            components
                .iter()
                .map(|c| (c.clone(), status.to_string()))
                .collect(),
        );
        self.component_ids = Some(components.to_vec());
    }
}

/// Maintenance window fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceFields {
    pub name: String,
    pub impact_override: String,
    pub status: String,
    pub scheduled_for: String,
    pub scheduled_until: String,
    pub scheduled_remind_prior: bool,
    pub auto_transition_to_maintenance_state: bool,
    pub auto_transition_to_operational_state: bool,
    pub scheduled_auto_in_progress: bool,
    pub scheduled_auto_completed: bool,
    pub auto_transition_deliver_notifications_at_start: bool,
    pub auto_transition_deliver_notifications_at_end: bool,
    pub deliver_notifications: bool,
    pub body: Option<String>,
    pub components: IndexMap<String, String>,
    pub component_ids: Vec<String>,
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    incident: &'a T,
}

/// Options of a new incident
#[derive(Debug, Clone, Default)]
pub struct NewIncident {
    pub title: String,
    pub message: Option<String>,
    pub status: Option<String>,
    pub impact: Option<String>,
    pub component_status: Option<String>,
    pub components: Vec<String>,
}

pub fn create_incident_payload(incident: &NewIncident) -> IncidentFields {
    let mut fields = IncidentFields {
        name: Some(incident.title.clone()),
        status: incident.status.clone(),
        body: incident.message.clone(),
        impact_override: incident.impact.clone(),
        ..Default::default()
    };
    if !incident.components.is_empty() {
        let status = incident
            .component_status
            .as_deref()
            .unwrap_or(DEFAULT_COMPONENT_STATUS);
        fields.set_components(&incident.components, status);
    }
    fields
}

/// Options of an incident update
#[derive(Debug, Clone, Default)]
pub struct IncidentUpdate {
    pub title: Option<String>,
    pub message: Option<String>,
    pub status: Option<String>,
    pub impact: Option<String>,
    pub component_status: Option<String>,
    pub components: Vec<String>,
}

/// Components change only when both components and their status are given
pub fn update_incident_payload(update: &IncidentUpdate) -> IncidentFields {
    let mut fields = IncidentFields {
        name: update.title.clone(),
        status: update.status.clone(),
        body: update.message.clone(),
        impact_override: update.impact.clone(),
        ..Default::default()
    };
    if let Some(status) = &update.component_status {
        if !update.components.is_empty() {
            fields.set_components(&update.components, status);
        }
    }
    fields
}

pub fn resolve_incident_payload(event: EventKind, components: &[String]) -> IncidentFields {
    let mut fields = IncidentFields {
        status: Some(event.closed_status().to_string()),
        impact_override: Some("none".to_string()),
        ..Default::default()
    };
    fields.set_components(components, "operational");
    fields
}

/// Start of a maintenance window
///
/// `now` means one minute from `now`; anything else must be
/// `YYYY-MM-DDTHH:MM:SS.ffffffZ` in UTC.
pub fn parse_schedule(value: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if value == "now" {
        return Ok(now + Duration::minutes(1));
    }
    NaiveDateTime::parse_from_str(value, SCHEDULE_INPUT_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| RepoError::InvalidSchedule {
            message: format!(
                "Scheduled time '{}' does not match format YYYY-MM-DDTHH:MM:SS.ffffffZ: {}",
                value, e
            ),
        })
}

pub fn maintenance_payload(
    title: &str,
    message: Option<&str>,
    components: &[String],
    start: DateTime<Utc>,
) -> MaintenanceFields {
    let until = start + Duration::hours(MAINTENANCE_HOURS);
    MaintenanceFields {
        name: title.to_string(),
        impact_override: "maintenance".to_string(),
        status: "scheduled".to_string(),
        scheduled_for: start.format(SCHEDULE_FORMAT).to_string(),
        scheduled_until: until.format(SCHEDULE_FORMAT).to_string(),
        scheduled_remind_prior: true,
        auto_transition_to_maintenance_state: true,
        auto_transition_to_operational_state: true,
        scheduled_auto_in_progress: true,
        scheduled_auto_completed: false,
        auto_transition_deliver_notifications_at_start: false,
        auto_transition_deliver_notifications_at_end: true,
        deliver_notifications: true,
        body: message.map(String::from),
        components: components
            .iter()
            .map(|c| (c.clone(), "under_maintenance".to_string()))
            .collect(),
        component_ids: components.to_vec(),
    }
}

/// Find the API token: explicit value, `$STATUSPAGE_TOKEN`, then the macOS
/// login keychain
pub async fn resolve_token(
    explicit: Option<&str>,
    keychain_user: Option<&str>,
    keychain_service: &str,
) -> Result<String> {
    if let Some(token) = explicit.filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.is_empty() {
            return Ok(token);
        }
    }
    if cfg!(target_os = "macos") {
        let user = keychain_user
            .map(String::from)
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_default();
        if let Some(token) = keychain_token(&user, keychain_service).await? {
            return Ok(token);
        }
    }
    Err(RepoError::MissingToken)
}

async fn keychain_token(user: &str, service: &str) -> Result<Option<String>> {
    tracing::info!("Getting Status Page token from keychain for user '{}'", user);
    let output = tokio::process::Command::new("security")
        .args(["find-generic-password", "-a", user, "-s", service, "-w"])
        .output()
        .await?;
    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok((output.status.success() && !token.is_empty()).then_some(token))
}

/// Get the API base url
pub fn api_url_from_env() -> String {
    std::env::var(API_URL_ENV)
        .ok()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string())
}

/// Client for one Status Page account
pub struct StatusPageClient {
    base_url: String,
    http: SecureHttpClient,
}

impl StatusPageClient {
    pub fn new(token: &str, base_url: &str, insecure: bool) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: SecureHttpClient::with_options(
                Some(Credentials::oauth(token)),
                ClientOptions { insecure },
            )?,
        })
    }

    async fn send<T: Serialize>(&self, method: Method, path: &str, incident: &T) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path);
        let text = self
            .http
            .send(method, &url, Body::json(&Envelope { incident })?, &[])
            .await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn create_incident(&self, page: &str, fields: &IncidentFields) -> Result<Value> {
        self.send(Method::POST, &format!("pages/{}/incidents", page), fields)
            .await
    }

    pub async fn update_incident(
        &self,
        page: &str,
        incident: &str,
        fields: &IncidentFields,
    ) -> Result<Value> {
        self.send(
            Method::PATCH,
            &format!("pages/{}/incidents/{}", page, incident),
            fields,
        )
        .await
    }

    pub async fn schedule_maintenance(
        &self,
        page: &str,
        fields: &MaintenanceFields,
    ) -> Result<Value> {
        self.send(Method::POST, &format!("pages/{}/incidents", page), fields)
            .await
    }
}
