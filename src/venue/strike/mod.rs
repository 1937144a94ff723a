//! Strike venue adapter (Cardano perpetuals).
//!
//! Every mutating operation settles as an on-chain transaction built by the
//! venue, witnessed by the wallet-signing collaborator, and submitted back.
//! See [`StrikeVenue`] for the lifecycle collapse this implies.

mod types;
mod venue;

pub use venue::StrikeVenue;
