//! Low-level access to the chip: register map, SPI transactions and the
//! critical-section wrapper used when two contexts share the bus.
pub mod registers;
pub mod shared;
pub mod spi;
