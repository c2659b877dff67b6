#![deny(missing_debug_implementations)]
#![forbid(unsafe_code)]

//! OBEX codec and GOEP profile state machines.
//!
//! This crate implements the OBEX application layer of a Bluetooth Classic
//! stack: a resumable parser for OBEX objects ([`parser`]), the nested
//! application-parameter TLV parser ([`app_param_parser`]), wire-exact frame
//! builders ([`frame`]), the Single Response Mode flow-control automaton
//! ([`srm`]), and the profile state machines riding on top of a GOEP
//! transport: the Object Push Profile client and server ([`opp`]) and the
//! Phonebook Access Profile server ([`pbap`]).
//!
//! The crate does not talk to a radio. Lower layers (RFCOMM, L2CAP, the GOEP
//! framer) are reached through the [`goep::GoepSession`] trait; the owning
//! application receives structured events from the profile entry points and
//! answers through profile commands.

pub mod app_param_parser;
pub mod frame;
pub mod goep;
pub mod opp;
pub mod parser;
pub mod pbap;
pub mod sdp;
pub mod srm;

pub use obex_types;
