//! Integration flows across engine, result map, state machine and submitter.

pub mod fixtures;

#[cfg(test)]
mod determinism;
#[cfg(test)]
mod resumption;
#[cfg(test)]
mod round_lifecycle;
