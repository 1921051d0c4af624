//! Metrics emitted through the `metrics` facade
//!
//! Nothing is recorded unless the embedding application installs a recorder
//! (for example `metrics-exporter-prometheus`). Names are prefixed with
//! `linewire_`.

pub mod counters;
pub mod histograms;
pub mod labels;
