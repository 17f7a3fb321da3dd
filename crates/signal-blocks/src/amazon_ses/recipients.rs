//! Recipient resolution: evaluate each configured expression against a signal and flatten the
//! results into per-category address lists.

use serde_json::Value;
use tracing::warn;

use signal_core::{Expression, Signal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientCategory {
    To,
    Cc,
    Bcc,
}

impl RecipientCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            RecipientCategory::To => "to",
            RecipientCategory::Cc => "cc",
            RecipientCategory::Bcc => "bcc",
        }
    }
}

/// Recipient shape chosen at configure time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientConfiguration {
    /// Single flat list; the send carries `to` addresses only.
    Flat(Vec<Expression>),
    /// Separate to/cc/bcc lists; the send carries all three.
    Categorized {
        to: Vec<Expression>,
        cc: Vec<Expression>,
        bcc: Vec<Expression>,
    },
}

impl RecipientConfiguration {
    pub fn resolve(&self, signal: &Signal) -> Destination {
        match self {
            RecipientConfiguration::Flat(specs) => {
                Destination::To(resolve_category(RecipientCategory::To, specs, signal))
            }
            RecipientConfiguration::Categorized { to, cc, bcc } => Destination::Categorized {
                to: resolve_category(RecipientCategory::To, to, signal),
                cc: resolve_category(RecipientCategory::Cc, cc, signal),
                bcc: resolve_category(RecipientCategory::Bcc, bcc, signal),
            },
        }
    }
}

/// Resolved recipients of one outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    To(Vec<String>),
    Categorized {
        to: Vec<String>,
        cc: Vec<String>,
        bcc: Vec<String>,
    },
}

impl Destination {
    /// Total addresses across every category.
    pub fn recipient_count(&self) -> usize {
        match self {
            Destination::To(to) => to.len(),
            Destination::Categorized { to, cc, bcc } => to.len() + cc.len() + bcc.len(),
        }
    }

    pub fn to_addresses(&self) -> &[String] {
        match self {
            Destination::To(to) | Destination::Categorized { to, .. } => to,
        }
    }

    /// `None` for the flat shape, which carries no cc list at all.
    pub fn cc_addresses(&self) -> Option<&[String]> {
        match self {
            Destination::To(_) => None,
            Destination::Categorized { cc, .. } => Some(cc),
        }
    }

    pub fn bcc_addresses(&self) -> Option<&[String]> {
        match self {
            Destination::To(_) => None,
            Destination::Categorized { bcc, .. } => Some(bcc),
        }
    }
}

/// Evaluate every spec of one category. A failing spec is logged and skipped; list results are
/// flattened in order; `null` and blank strings contribute nothing.
pub fn resolve_category(
    category: RecipientCategory,
    specs: &[Expression],
    signal: &Signal,
) -> Vec<String> {
    let mut addresses = Vec::new();
    for spec in specs {
        match spec.evaluate(signal) {
            Ok(Value::Array(items)) => {
                addresses.extend(items.into_iter().filter_map(address_from_value))
            }
            Ok(value) => addresses.extend(address_from_value(value)),
            Err(err) => {
                warn!(
                    event = "email.recipient_eval_failed",
                    domain = "email",
                    block_type = "amazon_ses",
                    category = category.as_str(),
                    expression = %spec,
                    error = %err
                );
            }
        }
    }
    addresses
}

fn address_from_value(value: Value) -> Option<String> {
    match value {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exprs(sources: &[&str]) -> Vec<Expression> {
        sources.iter().map(|s| Expression::new(*s)).collect()
    }

    #[test]
    fn list_result_is_flattened_in_order() {
        let signal = Signal::from_value(json!({
            "recip": ["r1@x.com", "r2@x.com"]
        }))
        .unwrap();
        let out = resolve_category(
            RecipientCategory::To,
            &exprs(&["first@x.com", "{{ $recip }}"]),
            &signal,
        );
        assert_eq!(out, vec!["first@x.com", "r1@x.com", "r2@x.com"]);
    }

    #[test]
    fn failing_spec_is_skipped_siblings_still_contribute() {
        let signal = Signal::from_value(json!({"recip2": "recip2@mail.com"})).unwrap();
        let out = resolve_category(
            RecipientCategory::To,
            &exprs(&["{{ $recip1 }}", "{{ $recip2 }}"]),
            &signal,
        );
        assert_eq!(out, vec!["recip2@mail.com"]);
    }

    #[test]
    fn null_contributes_nothing() {
        let signal = Signal::from_value(json!({"recip": null, "list": [null, "a@x.com"]})).unwrap();
        let out = resolve_category(
            RecipientCategory::Cc,
            &exprs(&["{{ $recip }}", "{{ $list }}"]),
            &signal,
        );
        assert_eq!(out, vec!["a@x.com"]);
    }

    #[test]
    fn blank_strings_contribute_nothing() {
        let signal = Signal::from_value(json!({"list": ["", "a@x.com", "  "]})).unwrap();
        let out = resolve_category(
            RecipientCategory::Bcc,
            &exprs(&["", "{{ $list }}"]),
            &signal,
        );
        assert_eq!(out, vec!["a@x.com"]);
    }

    #[test]
    fn flat_configuration_resolves_to_only() {
        let cfg = RecipientConfiguration::Flat(exprs(&["a@x.com"]));
        let dest = cfg.resolve(&Signal::default());
        assert_eq!(dest, Destination::To(vec!["a@x.com".into()]));
        assert_eq!(dest.recipient_count(), 1);
        assert!(dest.cc_addresses().is_none());
        assert!(dest.bcc_addresses().is_none());
    }

    #[test]
    fn categorized_count_sums_all_lists() {
        let cfg = RecipientConfiguration::Categorized {
            to: vec![],
            cc: vec![],
            bcc: exprs(&["b@x.com"]),
        };
        let dest = cfg.resolve(&Signal::default());
        assert_eq!(dest.recipient_count(), 1);
        assert!(dest.to_addresses().is_empty());
        assert_eq!(dest.bcc_addresses(), Some(&["b@x.com".to_string()][..]));

        let empty = RecipientConfiguration::Categorized {
            to: vec![],
            cc: vec![],
            bcc: vec![],
        };
        assert_eq!(empty.resolve(&Signal::default()).recipient_count(), 0);
    }
}
