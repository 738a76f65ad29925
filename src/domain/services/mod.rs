pub mod record_shaper;
mod representative_point;

pub use representative_point::RepresentativePoint;
