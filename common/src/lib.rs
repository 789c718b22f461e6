//! Types shared between the gesture server and the programs on either side
//! of it: the landmark frames fed in by the hand detector and the gesture
//! record pushed out to every consumer.

pub mod gesture;
pub mod landmark;
