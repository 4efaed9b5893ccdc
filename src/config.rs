use clap::Parser;
use std::time::Duration;

use crate::identity::DEFAULT_USER_HEADER;
use crate::rate_limit::{ActionClass, RateLimitConfig, RateLimitPolicy};

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "linkhub")]
#[command(about = "Link-in-bio pages with ordered links")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // General API rate limit: max requests per window
    #[arg(long, default_value_t = 100)]
    pub rate_limit: u32,

    // General API rate limit window in seconds
    #[arg(long, default_value_t = 60)]
    pub rate_window: u64,

    // How often expired rate limit buckets are swept, in seconds
    #[arg(long, default_value_t = 300)]
    pub sweep_interval: u64,

    // Header carrying the signed-in user id, set by the auth proxy
    #[arg(long, default_value = DEFAULT_USER_HEADER)]
    pub user_header: String,

    // Mark the edit-token cookie Secure (serve over https)
    #[arg(long, default_value_t = false)]
    pub secure_cookies: bool,
}

impl Args {
    pub fn rate_limit_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::default().with(
            ActionClass::GeneralApi,
            RateLimitConfig::new(self.rate_limit.max(1), Duration::from_secs(self.rate_window.max(1))),
        )
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_policy_table() {
        let args = Args::parse_from(["linkhub"]);
        assert_eq!(args.port, 8080);
        assert_eq!(
            args.rate_limit_policy().config(ActionClass::GeneralApi),
            ActionClass::GeneralApi.default_config()
        );
        assert_eq!(args.sweep_interval(), Duration::from_secs(300));
    }

    #[test]
    fn overrides_general_api_only() {
        let args = Args::parse_from(["linkhub", "--rate-limit", "5", "--rate-window", "1"]);
        let policy = args.rate_limit_policy();
        assert_eq!(
            policy.config(ActionClass::GeneralApi),
            RateLimitConfig::new(5, Duration::from_secs(1))
        );
        assert_eq!(policy.config(ActionClass::AuthCreateLink).max_requests, 80);
    }
}
