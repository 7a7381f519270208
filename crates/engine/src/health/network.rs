//! Network reachability tracking

/// Result of feeding an online/offline signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkTransition {
    Unchanged,
    WentOffline,
    /// Back online after an offline period
    Restored,
}

/// Host network state; starts online
#[derive(Debug, Clone)]
pub struct NetworkTracker {
    online: bool,
}

impl Default for NetworkTracker {
    fn default() -> Self {
        Self { online: true }
    }
}

impl NetworkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_online(&mut self, online: bool) -> NetworkTransition {
        let transition = match (self.online, online) {
            (true, false) => NetworkTransition::WentOffline,
            (false, true) => NetworkTransition::Restored,
            _ => NetworkTransition::Unchanged,
        };
        self.online = online;
        transition
    }

    pub fn is_online(&self) -> bool {
        self.online
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        let mut network = NetworkTracker::new();
        assert!(network.is_online());
        assert_eq!(network.set_online(true), NetworkTransition::Unchanged);
        assert_eq!(network.set_online(false), NetworkTransition::WentOffline);
        assert_eq!(network.set_online(false), NetworkTransition::Unchanged);
        assert!(!network.is_online());
        assert_eq!(network.set_online(true), NetworkTransition::Restored);
        assert!(network.is_online());
    }
}
