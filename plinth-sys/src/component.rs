// SPDX-License-Identifier: GPL-3.0-only

//! App components and the capabilities they declare.

use crate::diagnostics::DiagnosticCheck;
use crate::error::{Result, SysError};

/// Something that has a running state (a daemon, a socket unit).
pub trait Runnable {
    fn is_running(&self) -> bool;
}

/// A part of an app, identified by an id unique across all apps.
pub trait Component: Send + Sync {
    fn component_id(&self) -> &str;

    /// The running capability, for components that have one.
    fn as_runnable(&self) -> Option<&dyn Runnable> {
        None
    }

    fn diagnose(&self) -> Vec<DiagnosticCheck> {
        Vec::new()
    }
}

/// Whether every runnable component is running. Components without a
/// running state are not considered.
pub fn app_is_running<'a>(components: impl IntoIterator<Item = &'a dyn Component>) -> bool {
    components
        .into_iter()
        .filter_map(|component| component.as_runnable())
        .all(|runnable| runnable.is_running())
}

/// Components of an app, in registration order.
#[derive(Default)]
pub struct ComponentRegistry {
    components: Vec<Box<dyn Component>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, component: Box<dyn Component>) -> Result<()> {
        if self.get(component.component_id()).is_some() {
            return Err(SysError::DuplicateComponent(
                component.component_id().to_string(),
            ));
        }

        tracing::debug!(component = component.component_id(), "Registered component");
        self.components.push(component);
        Ok(())
    }

    pub fn get(&self, component_id: &str) -> Option<&dyn Component> {
        self.components
            .iter()
            .find(|c| c.component_id() == component_id)
            .map(|c| c.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Component> {
        self.components.iter().map(|c| c.as_ref())
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn is_running(&self) -> bool {
        app_is_running(self.iter())
    }

    /// Diagnostic results of every component, in registration order.
    pub fn diagnose(&self) -> Vec<(String, Vec<DiagnosticCheck>)> {
        self.iter()
            .map(|c| (c.component_id().to_string(), c.diagnose()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Setting(&'static str);

    impl Component for Setting {
        fn component_id(&self) -> &str {
            self.0
        }
    }

    struct Service(&'static str, bool);

    impl Runnable for Service {
        fn is_running(&self) -> bool {
            self.1
        }
    }

    impl Component for Service {
        fn component_id(&self) -> &str {
            self.0
        }

        fn as_runnable(&self) -> Option<&dyn Runnable> {
            Some(self)
        }
    }

    #[test]
    fn only_runnable_components_decide_running_state() {
        let mut registry = ComponentRegistry::new();
        registry.register(Box::new(Setting("config-sharing"))).unwrap();
        registry.register(Box::new(Service("daemon-a", true))).unwrap();
        assert!(registry.is_running());

        registry.register(Box::new(Service("daemon-b", false))).unwrap();
        assert!(!registry.is_running());
    }

    #[test]
    fn app_without_runnables_counts_as_running() {
        let mut registry = ComponentRegistry::new();
        registry.register(Box::new(Setting("config-jsxc"))).unwrap();
        assert!(registry.is_running());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut registry = ComponentRegistry::new();
        registry.register(Box::new(Service("daemon-a", true))).unwrap();

        let err = registry
            .register(Box::new(Setting("daemon-a")))
            .unwrap_err();
        assert!(matches!(err, SysError::DuplicateComponent(id) if id == "daemon-a"));
        assert_eq!(registry.len(), 1);
    }
}
