//! Scripted price oracles with call counting.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::{Error, InputError, Result};
use crate::service::rate::PriceOracle;

/// An oracle that always answers with a fixed rate, or always fails.
pub struct ScriptedOracle {
    rate: Option<Decimal>,
    calls: AtomicU32,
}

impl ScriptedOracle {
    #[must_use]
    pub fn healthy(rate: Decimal) -> Self {
        Self {
            rate: Some(rate),
            calls: AtomicU32::new(0),
        }
    }

    #[must_use]
    pub fn down() -> Self {
        Self {
            rate: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Number of fetches the service issued against this oracle.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceOracle for ScriptedOracle {
    async fn fetch_rate(&self) -> Result<Decimal> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.rate.ok_or_else(|| {
            Error::Input(InputError::InvalidValue {
                field: "oracle",
                reason: "down".into(),
            })
        })
    }
}
