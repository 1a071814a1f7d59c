//! Per-platform status mapping tables
//!
//! Each platform's vocabulary maps to the canonical
//! (status, financial, fulfillment) triple. The forward direction is a
//! total function: unknown statuses fall back to
//! (pending, pending, unfulfilled) with a warning, never an error.
//! Reverse mappings cover only the statuses a platform accepts back.

use std::collections::HashMap;

use shared::models::order::{
    FinancialStatus as Fin, FulfillmentStatus as Ful, OrderStatus, OrderStatus as St, StatusTriple,
};

/// Forward + reverse table for one platform
pub struct StatusMapping {
    platform: &'static str,
    forward: HashMap<&'static str, StatusTriple>,
    reverse: HashMap<OrderStatus, &'static str>,
}

impl StatusMapping {
    fn new(platform: &'static str) -> Self {
        Self {
            platform,
            forward: HashMap::new(),
            reverse: HashMap::new(),
        }
    }

    fn map(mut self, platform_status: &'static str, status: St, fin: Fin, ful: Ful) -> Self {
        self.forward
            .insert(platform_status, StatusTriple::new(status, fin, ful));
        self
    }

    /// Forward mapping that is also the reverse image for its local status
    fn map_bidi(mut self, platform_status: &'static str, status: St, fin: Fin, ful: Ful) -> Self {
        self.reverse.insert(status, platform_status);
        self.map(platform_status, status, fin, ful)
    }

    /// Total forward transform; unknown statuses warn and fall back
    pub fn transform(&self, platform_status: &str) -> StatusTriple {
        match self.forward.get(platform_status) {
            Some(triple) => *triple,
            None => {
                tracing::warn!(
                    platform = self.platform,
                    status = platform_status,
                    "Unknown platform status, falling back to pending"
                );
                StatusTriple::default()
            }
        }
    }

    /// Reverse mapping; `None` when the platform has no token for `status`
    pub fn reverse(&self, status: OrderStatus) -> Option<&'static str> {
        self.reverse.get(&status).copied()
    }

    /// All registered platform statuses (test support)
    pub fn known_statuses(&self) -> impl Iterator<Item = &&'static str> {
        self.forward.keys()
    }

    // ========== Platform tables ==========

    pub fn shopee() -> Self {
        Self::new("shopee")
            .map("UNPAID", St::Pending, Fin::Pending, Ful::Unfulfilled)
            .map_bidi("READY_TO_SHIP", St::Paid, Fin::Paid, Ful::Unfulfilled)
            .map("PROCESSED", St::Paid, Fin::Paid, Ful::Partial)
            .map("RETRY_SHIP", St::Paid, Fin::Paid, Ful::Unfulfilled)
            .map_bidi("SHIPPED", St::Shipped, Fin::Paid, Ful::Fulfilled)
            .map("TO_CONFIRM_RECEIVE", St::Shipped, Fin::Paid, Ful::Fulfilled)
            .map_bidi("COMPLETED", St::Delivered, Fin::Paid, Ful::Fulfilled)
            .map("TO_RETURN", St::Delivered, Fin::Refunded, Ful::Fulfilled)
            .map("IN_CANCEL", St::Pending, Fin::Paid, Ful::Unfulfilled)
            .map_bidi("CANCELLED", St::Cancelled, Fin::Refunded, Ful::Unfulfilled)
    }

    pub fn tiktok() -> Self {
        Self::new("tiktok")
            .map("UNPAID", St::Pending, Fin::Pending, Ful::Unfulfilled)
            .map("ON_HOLD", St::Pending, Fin::Paid, Ful::Unfulfilled)
            .map_bidi("AWAITING_SHIPMENT", St::Paid, Fin::Paid, Ful::Unfulfilled)
            .map("AWAITING_COLLECTION", St::Paid, Fin::Paid, Ful::Partial)
            .map("PARTIALLY_SHIPPING", St::Paid, Fin::Paid, Ful::Partial)
            .map_bidi("IN_TRANSIT", St::Shipped, Fin::Paid, Ful::Fulfilled)
            .map_bidi("DELIVERED", St::Delivered, Fin::Paid, Ful::Fulfilled)
            .map("COMPLETED", St::Delivered, Fin::Paid, Ful::Fulfilled)
            .map_bidi("CANCELLED", St::Cancelled, Fin::Refunded, Ful::Unfulfilled)
    }

    /// The storefront speaks the canonical vocabulary already
    pub fn storefront() -> Self {
        Self::new("storefront")
            .map_bidi("pending", St::Pending, Fin::Pending, Ful::Unfulfilled)
            .map_bidi("paid", St::Paid, Fin::Paid, Ful::Unfulfilled)
            .map_bidi("shipped", St::Shipped, Fin::Paid, Ful::Fulfilled)
            .map_bidi("delivered", St::Delivered, Fin::Paid, Ful::Fulfilled)
            .map_bidi("cancelled", St::Cancelled, Fin::Refunded, Ful::Unfulfilled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_statuses_return_configured_triple() {
        let mapping = StatusMapping::shopee();
        let triple = mapping.transform("READY_TO_SHIP");
        assert_eq!(triple.status, St::Paid);
        assert_eq!(triple.financial_status, Fin::Paid);
        assert_eq!(triple.fulfillment_status, Ful::Unfulfilled);
    }

    #[test]
    fn test_unknown_status_falls_back_without_error() {
        let mapping = StatusMapping::tiktok();
        let triple = mapping.transform("SOME_FUTURE_STATUS");
        assert_eq!(triple, StatusTriple::default());
    }

    #[test]
    fn test_reverse_roundtrip_consistency() {
        // forward(reverse(local)) must land back on the same local status
        for mapping in [
            StatusMapping::shopee(),
            StatusMapping::tiktok(),
            StatusMapping::storefront(),
        ] {
            for local in [
                St::Pending,
                St::Paid,
                St::Shipped,
                St::Delivered,
                St::Cancelled,
            ] {
                if let Some(token) = mapping.reverse(local) {
                    assert_eq!(
                        mapping.transform(token).status,
                        local,
                        "platform {} token {token}",
                        mapping.platform
                    );
                }
            }
        }
    }

    #[test]
    fn test_unmapped_reverse_is_none() {
        // Shopee has no platform token for a bare pending order
        assert!(StatusMapping::shopee().reverse(St::Pending).is_none());
    }
}
