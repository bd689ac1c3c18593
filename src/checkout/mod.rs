//! Checkout: converge the working tree onto a past save without touching
//! ignored files.

mod reconciler;

pub use reconciler::{CheckoutPlan, CheckoutReport, Reconciler};
