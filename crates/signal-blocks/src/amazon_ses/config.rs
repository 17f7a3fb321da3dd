use serde::{Deserialize, Serialize};

use signal_core::{BlockError, Expression};

use super::recipients::RecipientConfiguration;

/// SES region. Serialized with underscores (`us_east_1`); the hyphenated alias is accepted too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    #[default]
    #[serde(rename = "us_east_1", alias = "us-east-1")]
    UsEast1,
    #[serde(rename = "us_west_2", alias = "us-west-2")]
    UsWest2,
    #[serde(rename = "eu_west_1", alias = "eu-west-1")]
    EuWest1,
}

impl Region {
    /// Endpoint name passed to the mail service (`us-east-1`).
    pub const fn endpoint_name(self) -> &'static str {
        match self {
            Region::UsEast1 => "us-east-1",
            Region::UsWest2 => "us-west-2",
            Region::EuWest1 => "eu-west-1",
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.endpoint_name())
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsCreds {
    #[serde(default = "default_access_key")]
    pub access_key: String,
    #[serde(default = "default_access_secret")]
    pub access_secret: String,
}

fn default_access_key() -> String {
    "[[AMAZON_ACCESS_KEY_ID]]".to_string()
}

fn default_access_secret() -> String {
    "[[AMAZON_SECRET_ACCESS_KEY]]".to_string()
}

impl AwsCreds {
    pub fn new(access_key: impl Into<String>, access_secret: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            access_secret: access_secret.into(),
        }
    }
}

impl Default for AwsCreds {
    fn default() -> Self {
        Self::new(default_access_key(), default_access_secret())
    }
}

impl std::fmt::Debug for AwsCreds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCreds")
            .field("access_key", &self.access_key)
            .field("access_secret", &"<redacted>")
            .finish()
    }
}

/// One configured recipient: an expression yielding an address or a list of addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipientSpec {
    pub recip: Expression,
}

impl RecipientSpec {
    pub fn new(recip: impl Into<Expression>) -> Self {
        Self {
            recip: recip.into(),
        }
    }
}

/// Values substituted when the subject or body expression fails for a signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageDefaults {
    #[serde(default = "default_fallback_subject")]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

fn default_fallback_subject() -> String {
    "No Subject".to_string()
}

impl Default for MessageDefaults {
    fn default() -> Self {
        Self {
            subject: default_fallback_subject(),
            body: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageConfig {
    #[serde(default = "default_template")]
    pub subject: Expression,
    #[serde(default = "default_template")]
    pub body: Expression,
    /// When set, a failing subject/body expression falls back to these values instead of
    /// skipping the signal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<MessageDefaults>,
}

fn default_template() -> Expression {
    Expression::new("<No Value>")
}

impl MessageConfig {
    pub fn new(subject: impl Into<Expression>, body: impl Into<Expression>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            defaults: None,
        }
    }
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self::new(default_template(), default_template())
    }
}

/// Serialized config of the `amazon_ses` block.
///
/// Recipients come in one of two shapes: a flat `recipients` list (sent as `to` only), or
/// per-category `to_recipients`/`cc_recipients`/`bcc_recipients`. Mixing the two is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AmazonSesConfig {
    #[serde(default)]
    pub region: Region,
    #[serde(default)]
    pub creds: AwsCreds,
    #[serde(default)]
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipients: Option<Vec<Expression>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to_recipients: Vec<RecipientSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc_recipients: Vec<RecipientSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bcc_recipients: Vec<RecipientSpec>,
    #[serde(default)]
    pub message: MessageConfig,
}

impl AmazonSesConfig {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            region: Region::default(),
            creds: AwsCreds::default(),
            sender: sender.into(),
            recipients: None,
            to_recipients: Vec::new(),
            cc_recipients: Vec::new(),
            bcc_recipients: Vec::new(),
            message: MessageConfig::default(),
        }
    }

    /// Pick the recipient shape for this config.
    pub fn recipient_configuration(&self) -> Result<RecipientConfiguration, BlockError> {
        let categorized = !(self.to_recipients.is_empty()
            && self.cc_recipients.is_empty()
            && self.bcc_recipients.is_empty());
        match &self.recipients {
            Some(_) if categorized => Err(BlockError::InvalidConfig(
                "`recipients` cannot be combined with to/cc/bcc recipient lists".into(),
            )),
            Some(flat) => Ok(RecipientConfiguration::Flat(flat.clone())),
            None => Ok(RecipientConfiguration::Categorized {
                to: specs_to_expressions(&self.to_recipients),
                cc: specs_to_expressions(&self.cc_recipients),
                bcc: specs_to_expressions(&self.bcc_recipients),
            }),
        }
    }
}

fn specs_to_expressions(specs: &[RecipientSpec]) -> Vec<Expression> {
    specs.iter().map(|s| s.recip.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_empty_config() {
        let cfg: AmazonSesConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(cfg.region, Region::UsEast1);
        assert_eq!(cfg.creds.access_key, "[[AMAZON_ACCESS_KEY_ID]]");
        assert_eq!(cfg.creds.access_secret, "[[AMAZON_SECRET_ACCESS_KEY]]");
        assert_eq!(cfg.sender, "");
        assert_eq!(cfg.message.subject.source(), "<No Value>");
        assert!(cfg.message.defaults.is_none());
        assert_eq!(
            cfg.recipient_configuration().unwrap(),
            RecipientConfiguration::Categorized {
                to: vec![],
                cc: vec![],
                bcc: vec![]
            }
        );
    }

    #[test]
    fn region_names_and_aliases() {
        let r: Region = serde_json::from_value(json!("eu_west_1")).unwrap();
        assert_eq!(r, Region::EuWest1);
        assert_eq!(r.endpoint_name(), "eu-west-1");
        let r: Region = serde_json::from_value(json!("us-west-2")).unwrap();
        assert_eq!(r, Region::UsWest2);
        assert_eq!(serde_json::to_value(Region::UsEast1).unwrap(), json!("us_east_1"));
        assert!(serde_json::from_value::<Region>(json!("ap_south_1")).is_err());
    }

    #[test]
    fn flat_recipients_select_flat_shape() {
        let cfg: AmazonSesConfig = serde_json::from_value(json!({
            "recipients": ["recip@mail.com"],
            "message": {"subject": "{{ $sub }}", "body": "{{ $body }}", "defaults": {}}
        }))
        .unwrap();
        assert_eq!(
            cfg.recipient_configuration().unwrap(),
            RecipientConfiguration::Flat(vec![Expression::new("recip@mail.com")])
        );
        assert_eq!(cfg.message.defaults, Some(MessageDefaults::default()));
        assert_eq!(cfg.message.defaults.unwrap().subject, "No Subject");
    }

    #[test]
    fn mixing_recipient_shapes_is_rejected() {
        let cfg: AmazonSesConfig = serde_json::from_value(json!({
            "recipients": ["a@x.com"],
            "cc_recipients": [{"recip": "b@x.com"}]
        }))
        .unwrap();
        let err = cfg.recipient_configuration().unwrap_err();
        assert!(matches!(err, BlockError::InvalidConfig(_)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = serde_json::from_value::<AmazonSesConfig>(json!({"recipient": []}));
        assert!(err.is_err());
    }

    #[test]
    fn creds_debug_redacts_secret() {
        let dbg = format!("{:?}", AwsCreds::new("KEY", "TOPSECRET"));
        assert!(dbg.contains("KEY"));
        assert!(!dbg.contains("TOPSECRET"));
    }
}
