//! Source-specific converters

pub mod bazaar;
pub mod edx;
pub mod piazza;
pub mod prosolo;
pub mod tags;
pub mod wikipedia;

pub use bazaar::BazaarConverter;
pub use edx::EdxConverter;
pub use piazza::PiazzaConverter;
pub use prosolo::ProsoloConverter;
pub use tags::TagsConverter;
pub use wikipedia::WikipediaConverter;
