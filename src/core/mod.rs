pub mod delivery;
pub mod formatter;
pub mod renderer;
pub mod selection;
