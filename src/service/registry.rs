//! Ordered collection of registered services.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::service::{Drainable, HealthReporter, Service};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("service registry is closed: the supervisor is already running")]
    RegistryClosed,
}

/// A service plus the capabilities it exposed when it was registered.
#[derive(Clone)]
pub struct RegisteredService {
    service: Arc<dyn Service>,
    health: Option<Arc<dyn HealthReporter>>,
    drain: Option<Arc<dyn Drainable>>,
}

impl RegisteredService {
    fn resolve(service: Arc<dyn Service>) -> Self {
        let health = Arc::clone(&service).health_reporter();
        let drain = Arc::clone(&service).drainable();
        Self {
            service,
            health,
            drain,
        }
    }

    pub fn service(&self) -> &Arc<dyn Service> {
        &self.service
    }

    pub fn name(&self) -> &str {
        self.service.name()
    }

    pub fn health(&self) -> Option<&Arc<dyn HealthReporter>> {
        self.health.as_ref()
    }

    pub fn drain(&self) -> Option<&Arc<dyn Drainable>> {
        self.drain.as_ref()
    }
}

impl fmt::Debug for RegisteredService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredService")
            .field("name", &self.name())
            .field("health_reporter", &self.health.is_some())
            .field("drainable", &self.drain.is_some())
            .finish()
    }
}

/// Services in registration order. Entries are never removed.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: Vec<RegisteredService>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, service: Arc<dyn Service>) -> &RegisteredService {
        let entry = RegisteredService::resolve(service);
        tracing::debug!(
            service = entry.name(),
            health_reporter = entry.health.is_some(),
            drainable = entry.drain.is_some(),
            "Service registered"
        );
        self.services.push(entry);
        &self.services[self.services.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredService> {
        self.services.iter()
    }

    /// `(name, reporter)` for every health-reporting service, in order.
    pub fn health_reporters(&self) -> impl Iterator<Item = (&str, &Arc<dyn HealthReporter>)> {
        self.services
            .iter()
            .filter_map(|s| s.health.as_ref().map(|h| (s.name(), h)))
    }

    /// `(name, drainable)` for every drainable service, in order.
    pub fn drainables(&self) -> impl Iterator<Item = (&str, &Arc<dyn Drainable>)> {
        self.services
            .iter()
            .filter_map(|s| s.drain.as_ref().map(|d| (s.name(), d)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayMux;
    use crate::rpc::{RpcEndpoint, RpcRegistrar};
    use crate::service::BindError;

    struct Plain(&'static str);

    impl Service for Plain {
        fn name(&self) -> &str {
            self.0
        }
        fn bind_rpc(&self, _: &mut RpcRegistrar) -> Result<(), BindError> {
            Ok(())
        }
        fn bind_gateway(&self, _: &mut GatewayMux, _: &RpcEndpoint) -> Result<(), BindError> {
            Ok(())
        }
    }

    struct Full;

    impl Service for Full {
        fn name(&self) -> &str {
            "full"
        }
        fn bind_rpc(&self, _: &mut RpcRegistrar) -> Result<(), BindError> {
            Ok(())
        }
        fn bind_gateway(&self, _: &mut GatewayMux, _: &RpcEndpoint) -> Result<(), BindError> {
            Ok(())
        }
        fn health_reporter(self: Arc<Self>) -> Option<Arc<dyn HealthReporter>> {
            Some(self)
        }
        fn drainable(self: Arc<Self>) -> Option<Arc<dyn Drainable>> {
            Some(self)
        }
    }

    impl HealthReporter for Full {
        fn fail_check(&self, _: bool) {}
    }

    impl Drainable for Full {
        fn stop(&self) {}
    }

    #[test]
    fn capabilities_are_resolved_at_registration() {
        let mut registry = ServiceRegistry::new();
        registry.register(Arc::new(Plain("a")));
        registry.register(Arc::new(Full));
        registry.register(Arc::new(Plain("b")));

        let names: Vec<_> = registry.iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, ["a", "full", "b"]);
        assert_eq!(registry.health_reporters().count(), 1);
        assert_eq!(registry.drainables().count(), 1);
        assert_eq!(registry.drainables().next().unwrap().0, "full");
    }

    #[test]
    fn snapshot_is_independent() {
        let mut registry = ServiceRegistry::new();
        registry.register(Arc::new(Plain("a")));
        let snapshot = registry.clone();
        registry.register(Arc::new(Plain("b")));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len(), 2);
    }
}
