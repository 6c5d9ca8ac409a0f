mod builder;
mod directory;
mod source;
mod synthetic;
#[cfg(test)]
mod tests;

pub use builder::CaptureSourceBuilder;
pub use directory::DirectoryCaptureSource;
pub use source::CaptureSource;
pub use synthetic::SyntheticCaptureSource;
