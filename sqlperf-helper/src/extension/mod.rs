pub mod compare;
pub mod params;
