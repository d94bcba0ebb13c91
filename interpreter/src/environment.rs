use std::collections::HashMap;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::runtime_value::RuntimeValue;

/// Packages attached when an environment is created.
pub const DEFAULT_PACKAGES: [&str; 3] = ["base", "stats", "graphics"];

/// Seed of the random number generator until `set.seed()` is called.
pub const DEFAULT_SEED: u64 = 0;

/// The shared evaluation context of one compilation run. Bindings and attached
/// packages persist from fragment to fragment.
#[derive(Debug)]
pub struct Environment {
    variables: HashMap<String, RuntimeValue>,
    /// Attached packages in search order, most recently attached first.
    attached: Vec<String>,
    rng: StdRng,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            variables: HashMap::new(),
            attached: DEFAULT_PACKAGES.iter().rev().map(|p| p.to_string()).collect(),
            rng: StdRng::seed_from_u64(DEFAULT_SEED),
        }
    }

    pub fn get_variable(&self, name: &str) -> Option<&RuntimeValue> {
        self.variables.get(name)
    }

    pub fn set_variable(&mut self, name: &str, value: RuntimeValue) {
        self.variables.insert(name.to_string(), value);
    }

    pub fn remove_variable(&mut self, name: &str) -> Option<RuntimeValue> {
        self.variables.remove(name)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Bound names, sorted.
    pub fn variable_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.variables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Attach a package to the front of the search path. Returns false if it
    /// was already attached.
    pub fn attach(&mut self, package: &str) -> bool {
        if self.is_attached(package) {
            return false;
        }
        self.attached.insert(0, package.to_string());
        true
    }

    pub fn is_attached(&self, package: &str) -> bool {
        self.attached.iter().any(|p| p == package)
    }

    pub fn search_path(&self) -> &[String] {
        &self.attached
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindings_persist() {
        let mut env = Environment::new();
        env.set_variable("x", RuntimeValue::Number(1.0));
        env.set_variable("x", RuntimeValue::Number(2.0));
        assert_eq!(env.get_variable("x"), Some(&RuntimeValue::Number(2.0)));
        assert_eq!(env.variable_names(), vec!["x"]);
        assert!(env.remove_variable("x").is_some());
        assert!(!env.has_variable("x"));
    }

    #[test]
    fn attaching_prepends_to_search_path() {
        let mut env = Environment::new();
        assert_eq!(env.search_path(), &["graphics", "stats", "base"]);
        assert!(env.attach("knitr"));
        assert!(!env.attach("knitr"));
        assert_eq!(env.search_path()[0], "knitr");
    }
}
