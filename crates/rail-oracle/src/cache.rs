//! Last-known quote cache.
//!
//! A vault must keep distributing revenue while the fee oracle is down. The
//! cache remembers the most recent successful quote and serves it when a fresh
//! query fails. Callers learn whether the quote they got is fresh, because a
//! fresh quote may permanently lower the admin fee while a cached one may not.

use crate::fee::{FeeOracle, FeeQuote};

/// A quote together with where it came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedQuote {
    /// The quote to charge.
    pub quote: FeeQuote,
    /// `true` if the oracle answered, `false` if the cache served it.
    pub fresh: bool,
}

/// Cache of the last successful fee quote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeCache {
    last: FeeQuote,
    consecutive_failures: u32,
}

impl FeeCache {
    /// Create a cache seeded with an initial quote.
    pub fn new(initial: FeeQuote) -> Self {
        Self {
            last: initial,
            consecutive_failures: 0,
        }
    }

    /// Query the oracle, falling back to the cached quote on failure.
    pub fn refresh(&mut self, oracle: &dyn FeeOracle) -> ResolvedQuote {
        match oracle.quote() {
            Ok(quote) => {
                if self.consecutive_failures > 0 {
                    tracing::info!(
                        failures = self.consecutive_failures,
                        "fee cache: oracle recovered"
                    );
                }
                self.last = quote;
                self.consecutive_failures = 0;
                ResolvedQuote { quote, fresh: true }
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                tracing::warn!(
                    error = %e,
                    failures = self.consecutive_failures,
                    fee = %self.last.fee,
                    "fee cache: oracle unavailable, using last known quote"
                );
                ResolvedQuote {
                    quote: self.last,
                    fresh: false,
                }
            }
        }
    }

    /// The most recent successful quote.
    pub fn last(&self) -> FeeQuote {
        self.last
    }

    /// Number of failed queries since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee::DefaultFeeOracle;
    use rail_types::{Address, Fraction};

    fn pct(p: u64) -> Fraction {
        Fraction::from_percent(p).expect("pct")
    }

    #[test]
    fn test_fresh_quote_replaces_cache() {
        let oracle = DefaultFeeOracle::new(pct(1), Address::repeat_byte(1));
        let mut cache = FeeCache::new(oracle.quote().expect("quote"));

        oracle.set_fee(pct(5)).expect("set");
        let resolved = cache.refresh(&oracle);
        assert!(resolved.fresh);
        assert_eq!(resolved.quote.fee, pct(5));
        assert_eq!(cache.last().fee, pct(5));
    }

    #[test]
    fn test_fallback_on_outage() {
        let oracle = DefaultFeeOracle::new(pct(1), Address::repeat_byte(1));
        let mut cache = FeeCache::new(oracle.quote().expect("quote"));

        oracle.pause().expect("pause");
        let resolved = cache.refresh(&oracle);
        assert!(!resolved.fresh);
        assert_eq!(resolved.quote.fee, pct(1));
        cache.refresh(&oracle);
        assert_eq!(cache.consecutive_failures(), 2);

        oracle.resume().expect("resume");
        assert!(cache.refresh(&oracle).fresh);
        assert_eq!(cache.consecutive_failures(), 0);
    }
}
