//! Subsystem dispatch table

use std::fmt;

/// Which handler processes an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Switch,
    Battery,
    Mmc,
    Block,
    Bdi,
    PowerSupply,
}

impl fmt::Display for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Handler::Switch => "switch",
            Handler::Battery => "battery",
            Handler::Mmc => "mmc",
            Handler::Block => "block",
            Handler::Bdi => "bdi",
            Handler::PowerSupply => "power_supply",
        };
        f.write_str(name)
    }
}

/// Ordered (subsystem, handler) table, first exact match wins
#[derive(Debug, Clone)]
pub struct Router {
    routes: Vec<(String, Handler)>,
}

impl Default for Router {
    fn default() -> Self {
        let routes = [
            Handler::Switch,
            Handler::Battery,
            Handler::Mmc,
            Handler::Block,
            Handler::Bdi,
            Handler::PowerSupply,
        ]
        .into_iter()
        .map(|h| (h.to_string(), h))
        .collect();
        Self { routes }
    }
}

impl Router {
    /// Drop the routes for `ignored` subsystems
    pub fn without<I, S>(mut self, ignored: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ignored: Vec<S> = ignored.into_iter().collect();
        self.routes
            .retain(|(name, _)| !ignored.iter().any(|i| i.as_ref() == name));
        self
    }

    pub fn resolve(&self, subsystem: &str) -> Option<Handler> {
        self.routes
            .iter()
            .find(|(name, _)| name == subsystem)
            .map(|(_, handler)| *handler)
    }

    pub fn subsystems(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|(name, _)| name.as_str())
    }
}
