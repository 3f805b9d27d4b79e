//! The quiz-play state machine.
//!
//! [`resolver`] picks a result and [`sequencer`] walks the questions.
//! [`adapter`] turns transitions into card or chat frames, [`lead_gate`]
//! holds results back until an email is given, and [`player`] drives all of
//! it from user inputs and timer wakes.

pub mod adapter;
pub mod lead_gate;
pub mod player;
pub mod resolver;
pub mod sequencer;
pub mod share;
pub mod timer;
