//! Built-in signal blocks. Use with [`default_registry`] or [`registry_with_connector`].

mod amazon_ses;

use std::sync::Arc;

pub use amazon_ses::{
    AMAZON_SES, AmazonSesBlock, AmazonSesConfig, AwsCreds, Destination, DispatchOutcome,
    MailConnection, MailConnector, MailServiceError, MessageConfig, MessageDefaults, MessageField,
    RecipientCategory, RecipientConfiguration, RecipientSpec, Region, SendEmailRequest,
    SesConnector, register_amazon_ses, register_amazon_ses_sdk, resolve_category,
};

pub use signal_core::{BlockError, BlockRegistry, Signal, SignalBlock};

/// Create a registry with the built-in blocks, wired to the AWS SDK for amazon_ses.
pub fn default_registry() -> BlockRegistry {
    let mut r = BlockRegistry::new();
    register_amazon_ses_sdk(&mut r);
    r
}

/// Create a registry with all built-in blocks, using the given mail connector for amazon_ses.
/// Use this to route mail through your own [`MailConnector`] (tests, other transports).
pub fn registry_with_connector(connector: Arc<dyn MailConnector>) -> BlockRegistry {
    let mut r = BlockRegistry::new();
    register_amazon_ses(&mut r, connector);
    r
}
