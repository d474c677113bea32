//! The checkout wizard: step sequence, entry guards, and step entry actions

mod controller;
mod steps;

pub use controller::{StepEntry, WizardController};
pub use steps::CheckoutStep;
