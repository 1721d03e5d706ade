use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("unknown order status '{0}'")]
    Unknown(String),
    #[error("cannot move order from {from} to {to}")]
    Illegal { from: OrderStatus, to: OrderStatus },
    #[error("role {role} may not move order from {from} to {to}")]
    NotPermitted {
        role: Role,
        from: OrderStatus,
        to: OrderStatus,
    },
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    fn is_legal(self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Pending, Accepted)
                | (Pending, Cancelled)
                | (Accepted, Shipped)
                | (Accepted, Cancelled)
                | (Shipped, Delivered)
        )
    }

    /// Checks both the lifecycle edge and whether `role` may take it.
    ///
    /// Ownership (the customer's own order, the supplier's own products) is
    /// checked by the caller; this only covers the edge itself.
    pub fn transition(self, to: OrderStatus, role: Role) -> Result<OrderStatus, TransitionError> {
        if !self.is_legal(to) {
            return Err(TransitionError::Illegal { from: self, to });
        }

        let permitted = match role {
            Role::Admin => true,
            Role::Customer => self == OrderStatus::Pending && to == OrderStatus::Cancelled,
            Role::Supplier => matches!(
                to,
                OrderStatus::Accepted | OrderStatus::Shipped | OrderStatus::Cancelled
            ),
            Role::Delivery => to == OrderStatus::Delivered,
        };

        if permitted {
            Ok(to)
        } else {
            Err(TransitionError::NotPermitted {
                role,
                from: self,
                to,
            })
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "accepted" => Ok(OrderStatus::Accepted),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            other => Err(TransitionError::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_follows_shipping_only() {
        assert_eq!(
            OrderStatus::Shipped.transition(OrderStatus::Delivered, Role::Delivery),
            Ok(OrderStatus::Delivered)
        );
        assert_eq!(
            OrderStatus::Pending.transition(OrderStatus::Delivered, Role::Admin),
            Err(TransitionError::Illegal {
                from: OrderStatus::Pending,
                to: OrderStatus::Delivered
            })
        );
    }

    #[test]
    fn customer_can_only_cancel_pending() {
        assert!(
            OrderStatus::Pending
                .transition(OrderStatus::Cancelled, Role::Customer)
                .is_ok()
        );
        assert!(matches!(
            OrderStatus::Accepted.transition(OrderStatus::Cancelled, Role::Customer),
            Err(TransitionError::NotPermitted { .. })
        ));
        assert!(matches!(
            OrderStatus::Pending.transition(OrderStatus::Accepted, Role::Customer),
            Err(TransitionError::NotPermitted { .. })
        ));
    }

    #[test]
    fn supplier_cannot_mark_delivered() {
        assert!(matches!(
            OrderStatus::Shipped.transition(OrderStatus::Delivered, Role::Supplier),
            Err(TransitionError::NotPermitted { .. })
        ));
        assert!(
            OrderStatus::Accepted
                .transition(OrderStatus::Shipped, Role::Supplier)
                .is_ok()
        );
    }

    #[test]
    fn terminal_states_have_no_exit() {
        for to in [
            OrderStatus::Pending,
            OrderStatus::Accepted,
            OrderStatus::Shipped,
            OrderStatus::Cancelled,
        ] {
            assert!(OrderStatus::Delivered.transition(to, Role::Admin).is_err());
        }
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn parses_both_spellings_of_cancelled() {
        assert_eq!("canceled".parse::<OrderStatus>(), Ok(OrderStatus::Cancelled));
        assert_eq!(" Shipped ".parse::<OrderStatus>(), Ok(OrderStatus::Shipped));
        assert!("lost".parse::<OrderStatus>().is_err());
    }
}
