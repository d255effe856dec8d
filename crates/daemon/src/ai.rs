// AI-assisted estimation: breakdown and component price generation.
//
// The assistant is an external HTTP service configured in the ai
// section of the global config. No endpoint means the feature is off
// and every call reports `Disabled` instead of guessing prices.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use anggar_common::types::{Component, ComponentCategory, ComponentSource};

use crate::config::AiConfig;

/// Errors from breakdown and price generation.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorError {
    /// No assistant endpoint is configured.
    Disabled,
    /// Transport failure or a non-success status from the service.
    Http(String),
    /// The service answered with a payload we could not use.
    Malformed(String),
}

impl fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorError::Disabled => write!(f, "price assistant is disabled"),
            GeneratorError::Http(message) => {
                write!(f, "assistant request failed: {message}")
            }
            GeneratorError::Malformed(message) => {
                write!(f, "assistant response was malformed: {message}")
            }
        }
    }
}

impl std::error::Error for GeneratorError {}

/// Estimated price for one named component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentPrice {
    pub name: String,
    pub unit: String,
    pub unit_price: f64,
    pub category: ComponentCategory,
}

/// Source of generated breakdowns and component prices.
///
/// An empty breakdown from the service means it could not estimate the
/// work item; callers treat that as unresolved, not as free work.
pub trait BreakdownGenerator: Send + Sync {
    fn generate_breakdown(
        &self,
        description: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Component>, GeneratorError>> + Send>>;

    fn generate_component_price(
        &self,
        name: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ComponentPrice, GeneratorError>> + Send>>;
}

#[derive(Serialize)]
struct BreakdownRequest<'a> {
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Deserialize)]
struct BreakdownResponse {
    components: Vec<WireComponent>,
}

#[derive(Deserialize)]
struct WireComponent {
    name: String,
    category: String,
    quantity: f64,
    unit: String,
    unit_price: f64,
}

#[derive(Serialize)]
struct ComponentPriceRequest<'a> {
    component: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Deserialize)]
struct ComponentPriceResponse {
    unit: String,
    unit_price: f64,
    category: String,
}

fn component_from_wire(wire: WireComponent) -> Component {
    Component {
        id: Uuid::new_v4(),
        name: wire.name,
        category: ComponentCategory::from_label(&wire.category),
        quantity: wire.quantity,
        unit: wire.unit,
        unit_price: wire.unit_price,
        source: ComponentSource::Ai,
    }
}

/// Talks to the configured assistant service over HTTP.
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: Option<String>,
}

impl HttpGenerator {
    pub fn from_config(config: &AiConfig) -> Result<Self, GeneratorError> {
        let endpoint = config.endpoint.as_deref().ok_or(GeneratorError::Disabled)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| {
                GeneratorError::Http(format!("failed to build http client: {error}"))
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

impl BreakdownGenerator for HttpGenerator {
    fn generate_breakdown(
        &self,
        description: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Component>, GeneratorError>> + Send>> {
        // The body is serialized into the builder up front so the
        // future does not borrow self.
        let request = self
            .client
            .post(format!("{}/breakdown", self.endpoint))
            .json(&BreakdownRequest { description, model: self.model.as_deref() });
        Box::pin(async move {
            let response = request
                .send()
                .await
                .map_err(|error| GeneratorError::Http(format!("request failed: {error}")))?;
            let status = response.status();
            if !status.is_success() {
                return Err(GeneratorError::Http(format!("server returned {status}")));
            }
            let decoded: BreakdownResponse = response
                .json()
                .await
                .map_err(|error| GeneratorError::Malformed(error.to_string()))?;
            Ok(decoded.components.into_iter().map(component_from_wire).collect())
        })
    }

    fn generate_component_price(
        &self,
        name: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ComponentPrice, GeneratorError>> + Send>> {
        let component = name.to_string();
        let request = self
            .client
            .post(format!("{}/component-price", self.endpoint))
            .json(&ComponentPriceRequest { component: name, model: self.model.as_deref() });
        Box::pin(async move {
            let response = request
                .send()
                .await
                .map_err(|error| GeneratorError::Http(format!("request failed: {error}")))?;
            let status = response.status();
            if !status.is_success() {
                return Err(GeneratorError::Http(format!("server returned {status}")));
            }
            let decoded: ComponentPriceResponse = response
                .json()
                .await
                .map_err(|error| GeneratorError::Malformed(error.to_string()))?;
            Ok(ComponentPrice {
                name: component,
                unit: decoded.unit,
                unit_price: decoded.unit_price,
                category: ComponentCategory::from_label(&decoded.category),
            })
        })
    }
}

/// Stand-in when no endpoint is configured.
pub struct DisabledGenerator;

impl BreakdownGenerator for DisabledGenerator {
    fn generate_breakdown(
        &self,
        _description: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Component>, GeneratorError>> + Send>> {
        Box::pin(async { Err(GeneratorError::Disabled) })
    }

    fn generate_component_price(
        &self,
        _name: &str,
    ) -> Pin<Box<dyn Future<Output = Result<ComponentPrice, GeneratorError>> + Send>> {
        Box::pin(async { Err(GeneratorError::Disabled) })
    }
}

/// Build the generator the daemon should use for this config.
pub fn generator_from_config(config: &AiConfig) -> Arc<dyn BreakdownGenerator> {
    match HttpGenerator::from_config(config) {
        Ok(generator) => Arc::new(generator),
        Err(GeneratorError::Disabled) => Arc::new(DisabledGenerator),
        Err(error) => {
            warn!(%error, "falling back to disabled price assistant");
            Arc::new(DisabledGenerator)
        }
    }
}
