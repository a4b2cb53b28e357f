//! Monitoring agent configuration.

use k8s_openapi::api::core::v1 as core;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{Labels, defaults};

/// PROMETHEUS_EXPORTER_PORT is the default port of the metrics exporter sidecar.
pub const PROMETHEUS_EXPORTER_PORT: i32 = 56790;
/// DEFAULT_SCRAPE_INTERVAL is the default scrape interval of a ServiceMonitor.
pub const DEFAULT_SCRAPE_INTERVAL: &str = "10s";

/// AgentType selects the monitoring integration.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, JsonSchema)]
pub enum AgentType {
    /// Scraped through a Prometheus Operator ServiceMonitor.
    #[default]
    #[serde(rename = "prometheus.io/operator")]
    PrometheusOperator,
    /// Scraped by a Prometheus discovering pods through annotations.
    #[serde(rename = "prometheus.io")]
    Prometheus,
    /// Scraped by a Prometheus with a static builtin config.
    #[serde(rename = "prometheus.io/builtin")]
    PrometheusBuiltin,
}

/// AgentSpec configures the monitoring agent of a database.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpec {
    /// Agent is the monitoring integration in use.
    #[serde(default)]
    pub agent: AgentType,
    /// Prometheus configures Prometheus scraping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prometheus: Option<PrometheusSpec>,
}

/// PrometheusSpec configures the exporter sidecar and its scrape target.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusSpec {
    /// Exporter configures the exporter sidecar.
    #[serde(default)]
    pub exporter: PrometheusExporterSpec,
    /// ServiceMonitor configures the ServiceMonitor object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_monitor: Option<ServiceMonitorSpec>,
}

/// PrometheusExporterSpec configures the exporter sidecar container.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusExporterSpec {
    /// Port the exporter listens on.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub port: i32,
    /// Extra arguments for the exporter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Extra environment for the exporter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<core::EnvVar>,
    /// Compute resources of the exporter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<core::ResourceRequirements>,
    /// Security options of the exporter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_context: Option<core::SecurityContext>,
}

fn is_zero(v: &i32) -> bool {
    *v == 0
}

/// ServiceMonitorSpec configures the generated ServiceMonitor.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMonitorSpec {
    /// Labels for the ServiceMonitor, used by Prometheus to select it.
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
    /// Scrape interval.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
}

impl AgentSpec {
    /// Fills the exporter defaults, taking the exporter's user and group from the version catalog.
    pub fn set_defaults(&mut self, run_as_user: Option<i64>, run_as_group: Option<i64>) {
        let prom = self.prometheus.get_or_insert_with(PrometheusSpec::default);
        if prom.exporter.port == 0 {
            prom.exporter.port = PROMETHEUS_EXPORTER_PORT;
        }
        if let Some(sm) = prom.service_monitor.as_mut() {
            sm.interval
                .get_or_insert_with(|| DEFAULT_SCRAPE_INTERVAL.to_string());
        }
        let sc = prom
            .exporter
            .security_context
            .get_or_insert_with(core::SecurityContext::default);
        if sc.run_as_user.is_none() {
            sc.run_as_user = run_as_user;
        }
        if sc.run_as_group.is_none() {
            sc.run_as_group = run_as_group;
        }
        defaults::set_restricted_security_context(sc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exporter_defaults() {
        let mut agent: AgentSpec = serde_json::from_value(serde_json::json!({
            "agent": "prometheus.io/operator",
            "prometheus": {"serviceMonitor": {"labels": {"release": "prometheus"}}},
        }))
        .unwrap();
        agent.set_defaults(Some(70), None);
        let prom = agent.prometheus.unwrap();
        assert_eq!(prom.exporter.port, PROMETHEUS_EXPORTER_PORT);
        assert_eq!(
            prom.service_monitor.unwrap().interval.as_deref(),
            Some(DEFAULT_SCRAPE_INTERVAL)
        );
        let sc = prom.exporter.security_context.unwrap();
        assert_eq!(sc.run_as_user, Some(70));
        assert_eq!(sc.run_as_group, None);
        assert_eq!(sc.run_as_non_root, Some(true));
        assert_eq!(sc.allow_privilege_escalation, Some(false));
    }

    #[test]
    fn agent_wire_form() {
        assert_eq!(
            serde_json::to_value(AgentType::PrometheusBuiltin).unwrap(),
            "prometheus.io/builtin"
        );
    }
}
