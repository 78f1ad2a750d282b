//! CSRF `state` parameter generation
//!
//! States are drawn from the ASCII alphanumeric alphabet, so they need no
//! escaping in a URI. When several applications share a machine, each local
//! redirect listener binds its own port; prefixing the state with that port
//! lets a user tell which application a stray redirect belongs to.

use multicloud_core::config::OAuthConfig;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Generates random `state` strings within a length range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateGenerator {
    min_length: usize,
    max_length: usize,
    port_prefix: bool,
}

impl StateGenerator {
    /// Creates a generator for states of `min_length..=max_length` characters
    ///
    /// A zero minimum is raised to one and a maximum below the minimum is
    /// raised to the minimum.
    pub fn new(min_length: usize, max_length: usize) -> Self {
        let min_length = min_length.max(1);
        Self {
            min_length,
            max_length: max_length.max(min_length),
            port_prefix: false,
        }
    }

    pub fn from_config(config: &OAuthConfig) -> Self {
        Self::new(config.state_min_length, config.state_max_length)
            .with_port_prefix(config.state_port_prefix)
    }

    pub fn with_port_prefix(mut self, enabled: bool) -> Self {
        self.port_prefix = enabled;
        self
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Generates a state string
    ///
    /// # Arguments
    ///
    /// * `port` - Port of the redirect listener, used as prefix when enabled
    ///
    /// The prefix counts towards the drawn length; a prefix longer than the
    /// drawn length is followed by a single random character.
    pub fn generate(&self, port: Option<u16>) -> String {
        let mut rng = rand::thread_rng();
        let length = rng.gen_range(self.min_length..=self.max_length);

        let mut state = match port {
            Some(port) if self.port_prefix => port.to_string(),
            _ => String::new(),
        };
        let random_len = length.saturating_sub(state.len()).max(1);
        state.extend(
            (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(random_len)
                .map(char::from),
        );
        state
    }
}

impl Default for StateGenerator {
    fn default() -> Self {
        Self::from_config(&OAuthConfig::default())
    }
}
