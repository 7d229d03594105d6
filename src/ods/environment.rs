//! Per-instance settings and scoped overrides
//!
//! [`Ods::environment`] applies an [`Environment`] and returns a guard that
//! derefs to the ODS. Dropping the guard restores exactly the options the
//! environment overrode, so nested guards unwind in order and an early
//! return or a panic inside the block still restores the settings.
//!
//! Restoring consistency checking validates the tree first, like
//! [`Ods::set_consistency_check`]: if data written inside the block does not
//! fit the schema, checking stays off.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cocos::{Cocos, INTERNAL_COCOS};
use crate::config::DynamicPathCreation;
use crate::error::OdsResult;
use crate::value::Value;

use super::Ods;

/// Transform applied to every value written while it is active
pub type ProcessFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Options carried by every ODS handle
#[derive(Clone)]
pub struct Settings {
    pub consistency_check: bool,
    pub dynamic_path_creation: DynamicPathCreation,
    /// Coordinate convention of values passed in and out
    pub cocosio: u8,
    pub input_data_process_functions: Vec<ProcessFn>,
    /// Read code parameters back as XML markup
    pub raw_code_parameters: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            consistency_check: true,
            dynamic_path_creation: DynamicPathCreation::On,
            cocosio: INTERNAL_COCOS,
            input_data_process_functions: Vec::new(),
            raw_code_parameters: false,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("consistency_check", &self.consistency_check)
            .field("dynamic_path_creation", &self.dynamic_path_creation)
            .field("cocosio", &self.cocosio)
            .field(
                "input_data_process_functions",
                &self.input_data_process_functions.len(),
            )
            .field("raw_code_parameters", &self.raw_code_parameters)
            .finish()
    }
}

/// A set of temporary overrides; unset fields are left alone
#[derive(Clone, Default)]
pub struct Environment {
    consistency_check: Option<bool>,
    dynamic_path_creation: Option<DynamicPathCreation>,
    cocosio: Option<u8>,
    input_data_process_functions: Option<Vec<ProcessFn>>,
    raw_code_parameters: Option<bool>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn consistency_check(mut self, enabled: bool) -> Self {
        self.consistency_check = Some(enabled);
        self
    }

    pub fn dynamic_path_creation(mut self, policy: impl Into<DynamicPathCreation>) -> Self {
        self.dynamic_path_creation = Some(policy.into());
        self
    }

    /// Convention of values written and read inside the block
    pub fn cocosio(mut self, cocos: u8) -> Self {
        self.cocosio = Some(cocos);
        self
    }

    /// Add a transform for written values; transforms run in insertion order
    pub fn process_function(mut self, f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.input_data_process_functions
            .get_or_insert_with(Vec::new)
            .push(Arc::new(f));
        self
    }

    pub fn raw_code_parameters(mut self, raw: bool) -> Self {
        self.raw_code_parameters = Some(raw);
        self
    }

    /// Apply to `settings`, returning the overrides that undo it
    fn apply(self, settings: &mut Settings) -> Environment {
        let mut previous = Environment::default();
        if let Some(v) = self.consistency_check {
            previous.consistency_check = Some(std::mem::replace(&mut settings.consistency_check, v));
        }
        if let Some(v) = self.dynamic_path_creation {
            previous.dynamic_path_creation =
                Some(std::mem::replace(&mut settings.dynamic_path_creation, v));
        }
        if let Some(v) = self.cocosio {
            previous.cocosio = Some(std::mem::replace(&mut settings.cocosio, v));
        }
        if let Some(v) = self.input_data_process_functions {
            previous.input_data_process_functions = Some(std::mem::replace(
                &mut settings.input_data_process_functions,
                v,
            ));
        }
        if let Some(v) = self.raw_code_parameters {
            previous.raw_code_parameters =
                Some(std::mem::replace(&mut settings.raw_code_parameters, v));
        }
        previous
    }
}

/// Restores the overridden settings when dropped
pub struct EnvironmentGuard<'a> {
    ods: &'a mut Ods,
    previous: Option<Environment>,
}

impl Deref for EnvironmentGuard<'_> {
    type Target = Ods;

    fn deref(&self) -> &Ods {
        self.ods
    }
}

impl DerefMut for EnvironmentGuard<'_> {
    fn deref_mut(&mut self) -> &mut Ods {
        self.ods
    }
}

impl EnvironmentGuard<'_> {
    /// Leave the environment, reporting a failed re-validation
    pub fn exit(mut self) -> OdsResult<()> {
        self.restore()
    }

    fn restore(&mut self) -> OdsResult<()> {
        let Some(mut previous) = self.previous.take() else {
            return Ok(());
        };
        let mut result = Ok(());
        if previous.consistency_check == Some(true)
            && !self.ods.settings.consistency_check
            && let Err(e) = self.ods.validate()
        {
            previous.consistency_check = None;
            result = Err(e);
        }
        previous.apply(&mut self.ods.settings);
        debug!("Left environment at `{}`", self.ods.location);
        result
    }
}

impl Drop for EnvironmentGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!(
                "Consistency checking stays off at `{}`: {}",
                self.ods.location, e
            );
        }
    }
}

impl Ods {
    /// Apply temporary overrides until the returned guard is dropped
    ///
    /// Turning consistency checking on validates the tree first, as
    /// [`Ods::set_consistency_check`] does.
    pub fn environment(&mut self, env: Environment) -> OdsResult<EnvironmentGuard<'_>> {
        if let Some(cocos) = env.cocosio {
            Cocos::new(cocos)?;
        }
        if env.consistency_check == Some(true) && !self.settings.consistency_check {
            self.validate()?;
        }

        let previous = env.apply(&mut self.settings);
        debug!("Entered environment at `{}`", self.location);
        Ok(EnvironmentGuard {
            ods: self,
            previous: Some(previous),
        })
    }

    /// Run `f` with temporary overrides
    ///
    /// An error from `f` takes precedence over a failed re-validation on
    /// exit.
    pub fn with_environment<R>(
        &mut self,
        env: Environment,
        f: impl FnOnce(&mut Ods) -> OdsResult<R>,
    ) -> OdsResult<R> {
        let mut guard = self.environment(env)?;
        let result = f(&mut guard);
        let exited = guard.exit();
        let value = result?;
        exited?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_returns_inverse() {
        let mut settings = Settings::default();
        let undo = Environment::new()
            .consistency_check(false)
            .cocosio(2)
            .apply(&mut settings);
        assert!(!settings.consistency_check);
        assert_eq!(settings.cocosio, 2);
        assert_eq!(settings.dynamic_path_creation, DynamicPathCreation::On);

        undo.apply(&mut settings);
        assert!(settings.consistency_check);
        assert_eq!(settings.cocosio, INTERNAL_COCOS);
    }

    #[test]
    fn test_dropped_guard_keeps_checks_off_over_unknown_data() {
        let mut ods = Ods::new().unwrap();
        {
            let mut guard = ods
                .environment(Environment::new().consistency_check(false).cocosio(2))
                .unwrap();
            guard.set("nonsense.x", 1.0).unwrap();
        }
        assert!(!ods.consistency_check());
        assert_eq!(ods.cocosio(), INTERNAL_COCOS);
    }

    #[test]
    fn test_settings_debug_hides_functions() {
        let mut settings = Settings::default();
        settings
            .input_data_process_functions
            .push(Arc::new(|v: Value| v));
        let text = format!("{:?}", settings);
        assert!(text.contains("input_data_process_functions: 1"));
    }
}
