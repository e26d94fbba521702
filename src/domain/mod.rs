// Domain layer: the DAE model and the ports the conversion pipeline is built on.

pub mod model;
pub mod ports;
