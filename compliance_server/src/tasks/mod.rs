pub mod generation;

pub use generation::spawn_instance_generator;
