use rustc_hash::FxHashMap;

use super::Value;

/// Variables of the active call. Frames never chain: a call sees only its own
/// parameters and the names it assigns.
#[derive(Debug, Default, Clone)]
pub struct Environment {
    values: FxHashMap<String, Value>,
}

impl Environment {
    pub fn with_bindings(bindings: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            values: bindings.into_iter().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: String, value: Value) {
        self.values.insert(name, value);
    }
}
