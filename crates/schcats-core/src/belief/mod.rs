//! Probabilistic belief over the opponent's hidden hand.
//!
//! This module is composed of:
//! - `hard`: the hypothesis space and consistency filtering against revealed evidence.
//! - `soft`: claim-driven likelihood adjustments layered on top of hard constraints.

mod hard;
pub mod soft;

pub use hard::{Belief, BeliefError, Composition, HonestyTally, support_of};
pub use soft::{SoftConfig, SoftLikelihoodModel};
