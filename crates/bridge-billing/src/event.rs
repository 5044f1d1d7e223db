//! Billing Event Dispatch
//!
//! Closed tagged-variant view of inbound provider events. Every event
//! kind the system acts on has a variant; everything else collapses
//! into [`BillingEvent::Other`], which callers log and drop.

use stripe::{EventObject, EventType};

use crate::gateway::session_from_stripe;
use crate::session::PaymentSession;

/// Parsed webhook event
#[derive(Clone, Debug)]
pub enum BillingEvent {
    /// Checkout paid, run the provisioning workflow
    CheckoutCompleted { session: PaymentSession },

    /// Deferred payment method ultimately failed
    PaymentFailed { session_id: String },

    /// Recognized-but-unhandled or unknown event kind
    Other { event_type: String },
}

impl BillingEvent {
    /// Classify a verified provider event.
    pub fn from_event(event: &stripe::Event) -> Self {
        match event.type_ {
            EventType::CheckoutSessionCompleted
            | EventType::CheckoutSessionAsyncPaymentSucceeded => {
                if let EventObject::CheckoutSession(session) = &event.data.object {
                    BillingEvent::CheckoutCompleted {
                        session: session_from_stripe(session),
                    }
                } else {
                    BillingEvent::Other {
                        event_type: format!("{:?} (unexpected object)", event.type_),
                    }
                }
            }

            EventType::CheckoutSessionAsyncPaymentFailed => {
                if let EventObject::CheckoutSession(session) = &event.data.object {
                    BillingEvent::PaymentFailed {
                        session_id: session.id.to_string(),
                    }
                } else {
                    BillingEvent::Other {
                        event_type: format!("{:?} (unexpected object)", event.type_),
                    }
                }
            }

            _ => BillingEvent::Other {
                event_type: format!("{:?}", event.type_),
            },
        }
    }
}
