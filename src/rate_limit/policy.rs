use std::fmt;
use std::time::Duration;

const HOUR: Duration = Duration::from_secs(60 * 60);
const MINUTE: Duration = Duration::from_secs(60);

// Limit for one bucket: max requests per window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    pub const fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

/// Independent buckets. Exhausting one class never touches another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionClass {
    AnonCreatePage,
    AuthCreatePage,
    AuthCreateLink,
    GeneralApi,
}

impl ActionClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionClass::AnonCreatePage => "anon_create_page",
            ActionClass::AuthCreatePage => "auth_create_page",
            ActionClass::AuthCreateLink => "auth_create_link",
            ActionClass::GeneralApi => "general_api",
        }
    }

    pub fn default_config(&self) -> RateLimitConfig {
        match self {
            ActionClass::AnonCreatePage => RateLimitConfig::new(20, HOUR),
            ActionClass::AuthCreatePage => RateLimitConfig::new(20, HOUR),
            ActionClass::AuthCreateLink => RateLimitConfig::new(80, HOUR),
            ActionClass::GeneralApi => RateLimitConfig::new(100, MINUTE),
        }
    }
}

impl fmt::Display for ActionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Per-class limits, overridable from the command line for general traffic
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    anon_create_page: RateLimitConfig,
    auth_create_page: RateLimitConfig,
    auth_create_link: RateLimitConfig,
    general_api: RateLimitConfig,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            anon_create_page: ActionClass::AnonCreatePage.default_config(),
            auth_create_page: ActionClass::AuthCreatePage.default_config(),
            auth_create_link: ActionClass::AuthCreateLink.default_config(),
            general_api: ActionClass::GeneralApi.default_config(),
        }
    }
}

impl RateLimitPolicy {
    pub fn with(mut self, class: ActionClass, config: RateLimitConfig) -> Self {
        *self.slot(class) = config;
        self
    }

    pub fn config(&self, class: ActionClass) -> RateLimitConfig {
        match class {
            ActionClass::AnonCreatePage => self.anon_create_page,
            ActionClass::AuthCreatePage => self.auth_create_page,
            ActionClass::AuthCreateLink => self.auth_create_link,
            ActionClass::GeneralApi => self.general_api,
        }
    }

    fn slot(&mut self, class: ActionClass) -> &mut RateLimitConfig {
        match class {
            ActionClass::AnonCreatePage => &mut self.anon_create_page,
            ActionClass::AuthCreatePage => &mut self.auth_create_page,
            ActionClass::AuthCreateLink => &mut self.auth_create_link,
            ActionClass::GeneralApi => &mut self.general_api,
        }
    }
}
