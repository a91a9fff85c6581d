//! Named strategy constructors and per-request resolution.

use thiserror::Error;
use tracing::{debug, info};

use super::arduino::{self, ArduinoCli};
use super::platformio::{self, PlatformIo};
use super::{BuildStrategy, ToolchainOptions};

#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("no build tool available (tried: {})", .tried.join(", "))]
  NoToolAvailable { tried: Vec<String> },
}

type Constructor = Box<dyn Fn(&ToolchainOptions) -> Box<dyn BuildStrategy> + Send + Sync>;

/// Strategy constructors in priority order.
pub struct StrategyRegistry {
  entries: Vec<(String, Constructor)>,
}

impl Default for StrategyRegistry {
  fn default() -> Self {
    Self::standard()
  }
}

impl StrategyRegistry {
  pub fn empty() -> Self {
    Self { entries: Vec::new() }
  }

  /// PlatformIO first, then Arduino CLI.
  pub fn standard() -> Self {
    let mut registry = Self::empty();
    registry.register(platformio::NAME, |options| Box::new(PlatformIo::new(options)));
    registry.register(arduino::NAME, |options| Box::new(ArduinoCli::new(options)));
    registry
  }

  /// Add a strategy at the lowest priority. Re-registering a name replaces
  /// the constructor in place.
  pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
  where
    F: Fn(&ToolchainOptions) -> Box<dyn BuildStrategy> + Send + Sync + 'static,
  {
    let name = name.into();
    let constructor: Constructor = Box::new(constructor);
    match self.entries.iter_mut().find(|(key, _)| *key == name) {
      Some(entry) => entry.1 = constructor,
      None => self.entries.push((name, constructor)),
    }
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.entries.iter().map(|(name, _)| name.as_str())
  }

  /// Construct the strategy registered under `name`, available or not.
  pub fn create(&self, name: &str, options: &ToolchainOptions) -> Option<Box<dyn BuildStrategy>> {
    self
      .entries
      .iter()
      .find(|(key, _)| key == name)
      .map(|(_, constructor)| constructor(options))
  }

  /// Every registered strategy, in priority order.
  pub fn all(&self, options: &ToolchainOptions) -> Vec<Box<dyn BuildStrategy>> {
    self.entries.iter().map(|(_, constructor)| constructor(options)).collect()
  }

  /// Pick the strategy for a request.
  ///
  /// The preferred tool wins if it is installed; otherwise the first installed
  /// tool in priority order. Availability is checked live on each call.
  pub fn resolve(
    &self,
    preferred: Option<&str>,
    options: &ToolchainOptions,
  ) -> Result<Box<dyn BuildStrategy>, ResolveError> {
    if let Some(name) = preferred {
      match self.create(name, options) {
        Some(strategy) if strategy.is_available() => {
          info!(tool = name, "using preferred build tool");
          return Ok(strategy);
        }
        Some(_) => debug!(tool = name, "preferred build tool not available"),
        None => debug!(tool = name, "preferred build tool is not registered"),
      }
    }

    for (name, constructor) in &self.entries {
      let strategy = constructor(options);
      if strategy.is_available() {
        info!(tool = %name, "selected build tool");
        return Ok(strategy);
      }
      debug!(tool = %name, "build tool not available");
    }

    Err(ResolveError::NoToolAvailable {
      tried: self.names().map(str::to_string).collect(),
    })
  }

  /// Names of the strategies installed right now.
  pub fn available_names(&self, options: &ToolchainOptions) -> Vec<String> {
    self
      .entries
      .iter()
      .filter(|(_, constructor)| constructor(options).is_available())
      .map(|(name, _)| name.clone())
      .collect()
  }
}
