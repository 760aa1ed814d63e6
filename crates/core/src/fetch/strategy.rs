use std::time::Duration;

use crate::config::{FetchConfig, FetchStrategyKind};

/// When and how often results are requested after submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    Immediate,
    /// Wait, then fetch once.
    Delayed(Duration),
    /// Fetch, then re-fetch unfinished tasks every `interval` until `timeout`.
    Poll { interval: Duration, timeout: Duration },
}

impl FetchStrategy {
    pub fn from_config(config: &FetchConfig) -> Self {
        match config.strategy {
            FetchStrategyKind::Immediate => FetchStrategy::Immediate,
            FetchStrategyKind::Delayed => {
                FetchStrategy::Delayed(Duration::from_secs(config.delay_secs))
            }
            FetchStrategyKind::Poll => FetchStrategy::Poll {
                interval: Duration::from_secs(config.poll_interval_secs),
                timeout: Duration::from_secs(config.poll_timeout_secs),
            },
        }
    }

    /// Wait before the first fetch.
    pub fn initial_delay(&self) -> Duration {
        match self {
            FetchStrategy::Delayed(delay) => *delay,
            _ => Duration::ZERO,
        }
    }

    pub fn is_polling(&self) -> bool {
        matches!(self, FetchStrategy::Poll { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let mut config = FetchConfig::default();
        assert_eq!(
            FetchStrategy::from_config(&config),
            FetchStrategy::Delayed(Duration::from_secs(120))
        );

        config.strategy = FetchStrategyKind::Poll;
        let strategy = FetchStrategy::from_config(&config);
        assert!(strategy.is_polling());
        assert_eq!(strategy.initial_delay(), Duration::ZERO);
        assert_eq!(
            strategy,
            FetchStrategy::Poll {
                interval: Duration::from_secs(10),
                timeout: Duration::from_secs(1200),
            }
        );

        config.strategy = FetchStrategyKind::Immediate;
        assert_eq!(FetchStrategy::from_config(&config), FetchStrategy::Immediate);
    }
}
