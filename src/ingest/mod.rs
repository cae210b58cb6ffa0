/// Live data ingestion.
///
/// Submodules:
/// - `openweather`: fetches the current air pollution observation and
///   appends it to the reading store.

pub mod openweather;
