use std::collections::HashMap;

use super::{BlockError, SignalBlock};

/// Factory that configures a block instance from its serialized config.
pub type BlockFactory =
    Box<dyn Fn(serde_json::Value) -> Result<Box<dyn SignalBlock>, BlockError> + Send + Sync>;

/// Registry: block type name -> factory. The factory receives the block config as `serde_json::Value`
/// and returns a configured block, so a successful [`build`](BlockRegistry::build) is the configure step.
#[derive(Default)]
pub struct BlockRegistry {
    factories: HashMap<String, BlockFactory>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a block type. Registering the same type twice replaces the earlier factory.
    pub fn register(
        &mut self,
        type_id: impl Into<String>,
        factory: impl Fn(serde_json::Value) -> Result<Box<dyn SignalBlock>, BlockError>
        + Send
        + Sync
        + 'static,
    ) {
        self.factories.insert(type_id.into(), Box::new(factory));
    }

    /// Registered type ids, sorted.
    pub fn type_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn build(
        &self,
        type_id: &str,
        payload: serde_json::Value,
    ) -> Result<Box<dyn SignalBlock>, BlockError> {
        self.factories
            .get(type_id)
            .ok_or_else(|| BlockError::UnknownBlockType(type_id.to_string()))
            .and_then(|f| f(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::LifecycleState;
    use crate::signal::Signal;
    use serde_json::json;

    struct PrefixBlock {
        prefix: String,
    }

    impl SignalBlock for PrefixBlock {
        fn block_type(&self) -> &str {
            "prefix"
        }

        fn state(&self) -> LifecycleState {
            LifecycleState::Configured
        }

        fn process_signals(&mut self, signals: &[Signal]) -> Result<(), BlockError> {
            if signals.iter().any(|s| s.get("name").is_none()) {
                return Err(BlockError::Other(format!("{}missing name", self.prefix)));
            }
            Ok(())
        }
    }

    #[test]
    fn empty_registry_returns_unknown_block_type() {
        let r = BlockRegistry::new();
        match r.build("prefix", json!({})) {
            Err(BlockError::UnknownBlockType(t)) => assert_eq!(t, "prefix"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected error"),
        }
    }

    #[test]
    fn register_resolves_and_builds_from_payload() {
        let mut r = BlockRegistry::new();
        r.register("prefix", |payload| {
            let prefix = payload
                .get("prefix")
                .and_then(|v| v.as_str())
                .ok_or_else(|| BlockError::InvalidConfig("missing prefix".into()))?
                .to_string();
            Ok(Box::new(PrefixBlock { prefix }))
        });
        assert_eq!(r.type_ids(), vec!["prefix"]);

        let mut block = r.build("prefix", json!({"prefix": "out:"})).unwrap();
        assert_eq!(block.block_type(), "prefix");
        let signal = Signal::from_value(json!({"name": "a"})).unwrap();
        block.process_signals(&[signal]).unwrap();
        let err = block.process_signals(&[Signal::default()]).unwrap_err();
        assert!(err.to_string().contains("out:missing name"));
    }

    #[test]
    fn factory_error_propagates_as_configure_failure() {
        let mut r = BlockRegistry::new();
        r.register("prefix", |_| Err(BlockError::Connect("refused".into())));
        let err = r.build("prefix", json!({})).err().unwrap();
        assert!(err.to_string().contains("refused"));
    }
}
