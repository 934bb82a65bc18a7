pub mod config;
pub mod deploy;
pub mod inspect;
pub mod synth;
