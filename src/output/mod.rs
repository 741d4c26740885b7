// Output module for Flotilla

pub mod errors;
pub mod terminal;

pub use errors::FleetError;
pub use terminal::TerminalOutput;
