//! AmazonSes block: sends one email per signal through an injected mail connection.
//!
//! Per signal: subject and body expressions are evaluated, recipient expressions are resolved
//! and flattened, and a single `send_email` call is made when at least one recipient resolved.
//! Failures never abort the batch; they are logged and reported as a [`DispatchOutcome`].
//!
//! The connection is opened once in [`AmazonSesBlock::configure`] through a [`MailConnector`].
//! `default_registry()` registers `amazon_ses` with [`SesConnector`] (AWS SDK).
//! Use `registry_with_connector(connector)` to override with your own implementation.

mod config;
mod recipients;
mod ses_client;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use signal_core::{
    BlockError, BlockRegistry, ExpressionError, LifecycleState, Signal, SignalBlock,
};

pub use config::{AmazonSesConfig, AwsCreds, MessageConfig, MessageDefaults, Region, RecipientSpec};
pub use recipients::{Destination, RecipientCategory, RecipientConfiguration, resolve_category};
pub use ses_client::SesConnector;

/// Registry key of the block.
pub const AMAZON_SES: &str = "amazon_ses";

const COMMANDS: &[&str] = &["quota", "stats"];

/// Error from the remote mail service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailServiceError {
    #[error("connect to {region} failed: {message}")]
    Connect { region: String, message: String },
    #[error("send_email failed: {0}")]
    Send(String),
    #[error("{operation} failed: {message}")]
    Query {
        operation: &'static str,
        message: String,
    },
    #[error("mail connection already released")]
    NotConnected,
}

/// One outbound message. `html_body` always equals `body`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendEmailRequest {
    pub source: String,
    pub subject: String,
    pub body: String,
    pub html_body: String,
    pub destination: Destination,
}

/// Live handle to the mail service. Calls block the caller's thread.
///
/// `get_send_quota`/`get_send_statistics` return the service's nested result envelope
/// (`{"GetSendQuotaResponse": {"GetSendQuotaResult": {...}}}`); the block unwraps it.
pub trait MailConnection: Send {
    fn send_email(&self, request: &SendEmailRequest) -> Result<(), MailServiceError>;

    fn get_send_quota(&self) -> Result<Value, MailServiceError>;

    fn get_send_statistics(&self) -> Result<Value, MailServiceError>;
}

/// Opens connections to the mail service. Implement this and pass it when registering.
pub trait MailConnector: Send + Sync {
    fn connect(
        &self,
        region: Region,
        creds: &AwsCreds,
    ) -> Result<Box<dyn MailConnection>, MailServiceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageField {
    Subject,
    Body,
}

impl MessageField {
    pub const fn as_str(self) -> &'static str {
        match self {
            MessageField::Subject => "subject",
            MessageField::Body => "body",
        }
    }
}

/// What happened to a single signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent { recipients: usize },
    SkippedNoRecipients,
    SkippedMessage {
        field: MessageField,
        error: ExpressionError,
    },
    SendFailed(MailServiceError),
}

pub struct AmazonSesBlock {
    region: Region,
    sender: String,
    recipients: RecipientConfiguration,
    message: MessageConfig,
    connection: Option<Box<dyn MailConnection>>,
}

fn email_domain(email: &str) -> Option<&str> {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim())
        .filter(|domain| !domain.is_empty())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Two-level envelope lookup. `None` when either level is missing or falsy.
fn unwrap_envelope(envelope: &Value, response_key: &str, result_key: &str) -> Option<Value> {
    let response = envelope.get(response_key).filter(|v| is_truthy(v))?;
    response
        .get(result_key)
        .filter(|v| is_truthy(v))
        .cloned()
}

impl AmazonSesBlock {
    /// Configure the block: pick the recipient shape and open the connection.
    /// A failed connect is returned as [`BlockError::Connect`]; there is no retry.
    pub fn configure(
        config: AmazonSesConfig,
        connector: &dyn MailConnector,
    ) -> Result<Self, BlockError> {
        let recipients = config.recipient_configuration()?;
        let connection = connector
            .connect(config.region, &config.creds)
            .map_err(|err| {
                error!(
                    event = "email.connect_failed",
                    domain = "email",
                    block_type = AMAZON_SES,
                    region = config.region.endpoint_name(),
                    error = %err
                );
                BlockError::Connect(err.to_string())
            })?;
        info!(
            event = "email.connected",
            domain = "email",
            block_type = AMAZON_SES,
            region = config.region.endpoint_name(),
            sender_domain = email_domain(&config.sender).unwrap_or("unknown"),
            flat_recipients = matches!(recipients, RecipientConfiguration::Flat(_)),
            message_defaults = config.message.defaults.is_some()
        );
        Ok(Self {
            region: config.region,
            sender: config.sender,
            recipients,
            message: config.message,
            connection: Some(connection),
        })
    }

    fn connection(&self) -> Result<&dyn MailConnection, BlockError> {
        self.connection
            .as_deref()
            .ok_or_else(|| BlockError::NotRunning {
                block_type: AMAZON_SES.to_string(),
            })
    }

    /// Process one signal and report what happened to it.
    pub fn dispatch(&self, signal: &Signal) -> Result<DispatchOutcome, BlockError> {
        let conn = self.connection()?;
        Ok(self.dispatch_with(conn, signal))
    }

    /// Process a batch in order; one outcome per signal.
    pub fn process_batch(&self, signals: &[Signal]) -> Result<Vec<DispatchOutcome>, BlockError> {
        let conn = self.connection()?;
        let outcomes: Vec<DispatchOutcome> = signals
            .iter()
            .map(|signal| self.dispatch_with(conn, signal))
            .collect();
        let count = |pred: fn(&DispatchOutcome) -> bool| outcomes.iter().filter(|o| pred(o)).count();
        info!(
            event = "email.batch_processed",
            domain = "email",
            block_type = AMAZON_SES,
            signals = signals.len() as u64,
            sent = count(|o| matches!(o, DispatchOutcome::Sent { .. })) as u64,
            skipped_no_recipients =
                count(|o| matches!(o, DispatchOutcome::SkippedNoRecipients)) as u64,
            skipped_message = count(|o| matches!(o, DispatchOutcome::SkippedMessage { .. })) as u64,
            send_failed = count(|o| matches!(o, DispatchOutcome::SendFailed(_))) as u64
        );
        Ok(outcomes)
    }

    fn dispatch_with(&self, conn: &dyn MailConnection, signal: &Signal) -> DispatchOutcome {
        let subject = match self.evaluate_field(MessageField::Subject, signal) {
            Ok(subject) => subject,
            Err(error) => {
                return DispatchOutcome::SkippedMessage {
                    field: MessageField::Subject,
                    error,
                };
            }
        };
        let body = match self.evaluate_field(MessageField::Body, signal) {
            Ok(body) => body,
            Err(error) => {
                return DispatchOutcome::SkippedMessage {
                    field: MessageField::Body,
                    error,
                };
            }
        };

        let destination = self.recipients.resolve(signal);
        let recipients = destination.recipient_count();
        if recipients == 0 {
            return DispatchOutcome::SkippedNoRecipients;
        }

        let request = SendEmailRequest {
            source: self.sender.clone(),
            subject,
            html_body: body.clone(),
            body,
            destination,
        };
        debug!(
            event = "email.send_attempt",
            domain = "email",
            block_type = AMAZON_SES,
            recipients = recipients as u64,
            subject_len = request.subject.len() as u64,
            body_len = request.body.len() as u64
        );
        match conn.send_email(&request) {
            Ok(()) => {
                debug!(
                    event = "email.send_succeeded",
                    domain = "email",
                    block_type = AMAZON_SES,
                    recipients = recipients as u64
                );
                DispatchOutcome::Sent { recipients }
            }
            Err(err) => {
                error!(
                    event = "email.send_failed",
                    domain = "email",
                    block_type = AMAZON_SES,
                    recipients = recipients as u64,
                    error = %err
                );
                DispatchOutcome::SendFailed(err)
            }
        }
    }

    /// Evaluate subject or body. With `defaults` configured a failure falls back to the default.
    fn evaluate_field(&self, field: MessageField, signal: &Signal) -> Result<String, ExpressionError> {
        let expression = match field {
            MessageField::Subject => &self.message.subject,
            MessageField::Body => &self.message.body,
        };
        match expression.evaluate_string(signal) {
            Ok(value) => Ok(value),
            Err(err) => match &self.message.defaults {
                Some(defaults) => {
                    debug!(
                        event = "email.message_default_used",
                        domain = "email",
                        block_type = AMAZON_SES,
                        field = field.as_str(),
                        error = %err
                    );
                    Ok(match field {
                        MessageField::Subject => defaults.subject.clone(),
                        MessageField::Body => defaults.body.clone(),
                    })
                }
                None => {
                    warn!(
                        event = "email.message_eval_failed",
                        domain = "email",
                        block_type = AMAZON_SES,
                        field = field.as_str(),
                        error = %err
                    );
                    Err(err)
                }
            },
        }
    }

    /// Send quota, unwrapped from the service envelope. Remote failures propagate.
    pub fn quota(&self) -> Result<Option<Value>, MailServiceError> {
        let conn = self
            .connection
            .as_deref()
            .ok_or(MailServiceError::NotConnected)?;
        let envelope = conn.get_send_quota()?;
        Ok(unwrap_envelope(
            &envelope,
            "GetSendQuotaResponse",
            "GetSendQuotaResult",
        ))
    }

    /// Send statistics, unwrapped from the service envelope. Remote failures propagate.
    pub fn stats(&self) -> Result<Option<Value>, MailServiceError> {
        let conn = self
            .connection
            .as_deref()
            .ok_or(MailServiceError::NotConnected)?;
        let envelope = conn.get_send_statistics()?;
        Ok(unwrap_envelope(
            &envelope,
            "GetSendStatisticsResponse",
            "GetSendStatisticsResult",
        ))
    }
}

impl SignalBlock for AmazonSesBlock {
    fn block_type(&self) -> &str {
        AMAZON_SES
    }

    fn state(&self) -> LifecycleState {
        if self.connection.is_some() {
            LifecycleState::Configured
        } else {
            LifecycleState::Stopped
        }
    }

    fn process_signals(&mut self, signals: &[Signal]) -> Result<(), BlockError> {
        self.process_batch(signals).map(|_| ())
    }

    fn commands(&self) -> &[&'static str] {
        COMMANDS
    }

    fn invoke(&self, command: &str) -> Result<Value, BlockError> {
        let result = match command {
            "quota" => self.quota(),
            "stats" => self.stats(),
            _ => {
                return Err(BlockError::UnknownCommand {
                    block_type: AMAZON_SES.to_string(),
                    command: command.to_string(),
                });
            }
        };
        match result {
            Ok(value) => Ok(value.unwrap_or(Value::Null)),
            Err(MailServiceError::NotConnected) => Err(BlockError::NotRunning {
                block_type: AMAZON_SES.to_string(),
            }),
            Err(err) => Err(BlockError::Command {
                command: command.to_string(),
                message: err.to_string(),
            }),
        }
    }

    fn stop(&mut self) -> Result<(), BlockError> {
        if self.connection.take().is_some() {
            info!(
                event = "email.connection_released",
                domain = "email",
                block_type = AMAZON_SES,
                region = self.region.endpoint_name()
            );
        }
        Ok(())
    }
}

/// Register the amazon_ses block with a connector. The user passes their connector when building the registry.
pub fn register_amazon_ses(registry: &mut BlockRegistry, connector: Arc<dyn MailConnector>) {
    registry.register(AMAZON_SES, move |payload| {
        let config: AmazonSesConfig = serde_json::from_value(payload)
            .map_err(|e| BlockError::InvalidConfig(e.to_string()))?;
        Ok(Box::new(AmazonSesBlock::configure(config, connector.as_ref())?))
    });
}

/// Register amazon_ses with the AWS SDK connector.
pub fn register_amazon_ses_sdk(registry: &mut BlockRegistry) {
    register_amazon_ses(registry, Arc::new(SesConnector));
}
