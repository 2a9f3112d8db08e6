//! Subject routing: which event type and clearance a broker subject maps to.

use events::{AccessLevel, EventType};

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Exact subject, or a prefix ending in `.*` / `.>` that matches any deeper subject.
    pub pattern: String,
    pub event_type: EventType,
    pub access_level: AccessLevel,
}

impl Route {
    pub fn new(pattern: &str, event_type: EventType, access_level: AccessLevel) -> Self {
        Self {
            pattern: pattern.to_string(),
            event_type,
            access_level,
        }
    }

    /// The part of a wildcard pattern before the wildcard, including the trailing dot.
    fn wildcard_prefix(&self) -> Option<&str> {
        self.pattern
            .strip_suffix('*')
            .or_else(|| self.pattern.strip_suffix('>'))
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard_prefix().is_some()
    }

    fn matches(&self, subject: &str) -> bool {
        match self.wildcard_prefix() {
            Some(prefix) => subject.len() > prefix.len() && subject.starts_with(prefix),
            None => self.pattern == subject,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Exact match first, then the wildcard route with the longest prefix.
    pub fn resolve(&self, subject: &str) -> Option<&Route> {
        if let Some(route) = self
            .routes
            .iter()
            .find(|r| !r.is_wildcard() && r.pattern == subject)
        {
            return Some(route);
        }

        self.routes
            .iter()
            .filter(|r| r.is_wildcard() && r.matches(subject))
            .max_by_key(|r| r.pattern.len())
    }

    /// Clearance required for `subject`. Subjects with no route require `Admin`.
    pub fn required_level(&self, subject: &str) -> AccessLevel {
        self.resolve(subject)
            .map(|r| r.access_level)
            .unwrap_or(AccessLevel::Admin)
    }

    /// Broker patterns to subscribe to, in the broker's glob syntax.
    ///
    /// Routes already covered by a wildcard route are left out so the broker delivers
    /// each message once.
    pub fn subscription_patterns(&self) -> Vec<String> {
        let mut patterns: Vec<String> = self
            .routes
            .iter()
            .filter(|route| {
                !self.routes.iter().any(|other| {
                    other.pattern != route.pattern
                        && other.is_wildcard()
                        && other.matches(&route.pattern)
                })
            })
            .map(|route| match route.wildcard_prefix() {
                Some(prefix) => format!("{prefix}*"),
                None => route.pattern.clone(),
            })
            .collect();
        patterns.sort();
        patterns.dedup();
        patterns
    }

    /// The platform's subject table.
    pub fn platform_defaults() -> Self {
        use AccessLevel::*;
        use EventType::*;

        Self::new(vec![
            Route::new("asgard.alerts.public", Alert, Public),
            Route::new("asgard.streams.update", StreamUpdate, Public),
            Route::new("asgard.system.health", SystemHealth, Public),
            Route::new("asgard.alerts.*", Alert, Civilian),
            Route::new("asgard.telemetry.*", Telemetry, Civilian),
            Route::new("asgard.satellites.status", SatelliteStatus, Civilian),
            Route::new("asgard.military.alerts", Alert, Military),
            Route::new("asgard.military.missions", MissionUpdate, Military),
            Route::new("asgard.military.*", MissionUpdate, Military),
            Route::new("asgard.hunoids.status", HunoidStatus, Military),
            Route::new("asgard.gov.alerts", Alert, Government),
            Route::new("asgard.gov.threats", Threat, Government),
            Route::new("asgard.gov.*", Alert, Government),
            Route::new("asgard.security.findings", SecurityFinding, Government),
            Route::new("asgard.admin.*", SystemHealth, Admin),
        ])
    }
}
