//! Broker reconciliation. Broker truth wins.

use tracing::warn;

use crate::domain::{PositionState, SHARE_EPSILON};
use crate::error::LadderError;
use crate::gateway::BrokerPosition;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reconciliation {
    InSync,
    /// Internal shares were overwritten with the broker's.
    Corrected { internal: f64, broker: f64 },
    /// Broker reports a short; internal state is flat and a cover is due.
    Short { shares: f64 },
}

/// Bring `position` in line with the broker. `None` means the broker holds
/// nothing for the symbol.
pub fn reconcile(
    symbol: &str,
    position: &mut PositionState,
    broker: Option<&BrokerPosition>,
    tolerance: f64,
) -> Reconciliation {
    let broker = broker.copied().unwrap_or_default();
    let internal = position.shares();

    if broker.shares < -SHARE_EPSILON {
        warn!(symbol, broker_shares = broker.shares, internal, "broker reports short position");
        position.flatten();
        return Reconciliation::Short {
            shares: -broker.shares,
        };
    }

    if (broker.shares - internal).abs() <= tolerance.max(SHARE_EPSILON) {
        return Reconciliation::InSync;
    }

    let err = LadderError::ReconciliationMismatch {
        symbol: symbol.to_string(),
        internal,
        broker: broker.shares,
    };
    warn!(symbol, error = %err, "syncing to broker position");
    position.sync_to_broker(broker.shares, broker.avg_cost);
    Reconciliation::Corrected {
        internal,
        broker: broker.shares,
    }
}
