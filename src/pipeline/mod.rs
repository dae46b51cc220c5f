pub mod ingest;
pub mod scoring;
pub mod sweep;

#[cfg(test)]
mod fixtures;
