//! Built-in packages and the registry that resolves function names against the
//! environment's search path.

mod base;
mod graphics;
mod knitr;
mod papaja;
mod stats;

use std::collections::HashMap;

use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::result::Capture;
use crate::runtime_value::RuntimeValue;

pub use knitr::Kable;

pub type BuiltinFn = fn(&mut CallContext<'_>, &Arguments) -> Result<RuntimeValue, RuntimeError>;

#[derive(Debug, Clone)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
    /// Whether a top-level call auto-prints its result.
    pub visible: bool,
}

/// A named collection of functions and constants, attached with `library()`.
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    builtins: HashMap<&'static str, Builtin>,
    constants: HashMap<&'static str, RuntimeValue>,
    /// Emitted as a message the first time the package is attached.
    pub startup_message: Option<String>,
}

impl Package {
    pub fn new(name: &str) -> Self {
        Package {
            name: name.to_string(),
            builtins: HashMap::new(),
            constants: HashMap::new(),
            startup_message: None,
        }
    }

    pub fn function(mut self, name: &'static str, func: BuiltinFn) -> Self {
        self.builtins.insert(name, Builtin { name, func, visible: true });
        self
    }

    /// A function whose result does not auto-print.
    pub fn invisible(mut self, name: &'static str, func: BuiltinFn) -> Self {
        self.builtins.insert(name, Builtin { name, func, visible: false });
        self
    }

    pub fn constant(mut self, name: &'static str, value: RuntimeValue) -> Self {
        self.constants.insert(name, value);
        self
    }

    pub fn with_startup_message(mut self, message: &str) -> Self {
        self.startup_message = Some(message.to_string());
        self
    }

    pub fn builtin(&self, name: &str) -> Option<&Builtin> {
        self.builtins.get(name)
    }

    pub fn constant_value(&self, name: &str) -> Option<&RuntimeValue> {
        self.constants.get(name)
    }
}

/// Every package available to `library()`.
#[derive(Debug, Clone, Default)]
pub struct Library {
    packages: HashMap<String, Package>,
}

impl Library {
    pub fn empty() -> Self {
        Library::default()
    }

    /// base, stats, graphics, knitr and papaja.
    pub fn standard() -> Self {
        let mut library = Library::empty();
        library.register(base::package());
        library.register(stats::package());
        library.register(graphics::package());
        library.register(knitr::package());
        library.register(papaja::package());
        library
    }

    /// Add or replace a package.
    pub fn register(&mut self, package: Package) {
        self.packages.insert(package.name.clone(), package);
    }

    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    pub fn package_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.packages.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve a function through the attached packages, most recent first.
    pub fn find_function(&self, env: &Environment, name: &str) -> Option<&Builtin> {
        env.search_path()
            .iter()
            .filter_map(|p| self.packages.get(p))
            .find_map(|p| p.builtin(name))
    }

    pub fn find_constant(&self, env: &Environment, name: &str) -> Option<&RuntimeValue> {
        env.search_path()
            .iter()
            .filter_map(|p| self.packages.get(p))
            .find_map(|p| p.constant_value(name))
    }
}

/// What a builtin can see and affect while it runs.
pub struct CallContext<'a> {
    pub env: &'a mut Environment,
    pub library: &'a Library,
    pub capture: &'a mut Capture,
    pub depth: usize,
}

/// Evaluated call arguments in call order.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    pub function: String,
    entries: Vec<(Option<String>, RuntimeValue)>,
}

impl Arguments {
    pub fn new(function: &str) -> Self {
        Arguments {
            function: function.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, name: Option<String>, value: RuntimeValue) {
        self.entries.push((name, value));
    }

    pub fn with(mut self, name: Option<&str>, value: RuntimeValue) -> Self {
        self.push(name.map(str::to_string), value);
        self
    }

    /// All arguments in call order.
    pub fn entries(&self) -> &[(Option<String>, RuntimeValue)] {
        &self.entries
    }

    pub fn named(&self, name: &str) -> Option<&RuntimeValue> {
        self.entries
            .iter()
            .find(|(n, _)| n.as_deref() == Some(name))
            .map(|(_, v)| v)
    }

    /// Unnamed arguments, in order.
    pub fn positional(&self) -> impl Iterator<Item = &RuntimeValue> {
        self.entries
            .iter()
            .filter(|(n, _)| n.is_none())
            .map(|(_, v)| v)
    }

    /// Match a formal parameter by name, falling back to the `position`th
    /// unnamed argument.
    pub fn get(&self, name: &str, position: usize) -> Option<&RuntimeValue> {
        self.named(name).or_else(|| self.positional().nth(position))
    }

    pub fn required(&self, name: &str, position: usize) -> Result<&RuntimeValue, RuntimeError> {
        self.get(name, position)
            .ok_or_else(|| RuntimeError::missing(name))
    }

    pub fn number(&self, name: &str, position: usize) -> Result<Option<f64>, RuntimeError> {
        match self.get(name, position) {
            None | Some(RuntimeValue::Null) => Ok(None),
            Some(value) => match value.as_number() {
                Some(n) => Ok(Some(n)),
                None => Err(RuntimeError::invalid_argument(
                    &self.function,
                    format!("'{}' must be a number", name),
                )),
            },
        }
    }

    pub fn number_or(
        &self,
        name: &str,
        position: usize,
        default: f64,
    ) -> Result<f64, RuntimeError> {
        Ok(self.number(name, position)?.unwrap_or(default))
    }

    pub fn flag(&self, name: &str, position: usize, default: bool) -> Result<bool, RuntimeError> {
        match self.get(name, position) {
            None => Ok(default),
            Some(value) => value.condition().map_err(|_| {
                RuntimeError::invalid_argument(
                    &self.function,
                    format!("'{}' must be TRUE or FALSE", name),
                )
            }),
        }
    }

    pub fn string(&self, name: &str, position: usize) -> Option<String> {
        match self.get(name, position) {
            None | Some(RuntimeValue::Null) => None,
            Some(value) => Some(value.scalar_text()),
        }
    }
}
