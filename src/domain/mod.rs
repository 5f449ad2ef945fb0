// Domain layer: models and ports, no I/O.

pub mod model;
pub mod ports;
