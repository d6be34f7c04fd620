//! Driver logic on top of register access: frame model, bring-up, the
//! transmit and receive paths, and the hand-off to the consumer.
pub mod consumer;
pub mod controller;
pub mod frame;
pub mod interrupt;
pub mod receive;
pub mod ring;
pub mod transmit;
