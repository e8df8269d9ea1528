//! Device-injection descriptor core for the devinject workspace.
//!
//! A device plugin authors a [`descriptor::Descriptor`] naming injectable
//! devices and the container edits they require; the descriptor is
//! validated ([`validate`]), persisted atomically ([`producer`]), and
//! advertised through container annotations ([`annotations`]). At
//! container-creation time a runtime merges the edit sets of the selected
//! devices ([`edits::EditSet::append`]) and applies them in place onto a
//! low-level container spec ([`apply`]).

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod annotations;
pub mod apply;
pub mod descriptor;
pub mod edits;
pub mod name;
pub mod oci;
pub mod producer;
pub mod validate;
