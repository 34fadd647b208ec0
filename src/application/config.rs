use crate::domain::account::Currency;

/// Tunables for [`MoneyMovementService`](super::service::MoneyMovementService).
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// The only currency authorize accepts. Defaults to `USD`.
    pub settlement_currency: Currency,
}

impl ServiceConfig {
    pub fn with_currency(code: &str) -> Self {
        Self {
            settlement_currency: Currency::new(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_currency_is_usd() {
        assert_eq!(ServiceConfig::default().settlement_currency.as_str(), "USD");
        assert_eq!(ServiceConfig::with_currency("eur").settlement_currency.as_str(), "EUR");
    }
}
