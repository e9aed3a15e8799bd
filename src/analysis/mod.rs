// =============================================================================
// Analysis Module
// =============================================================================
//
// - Pure pipeline over a bar series (indicators → signals → regime → score)
// - The serialisable report the dashboard renders
// - Async service: fetch, analyse, batch quotes, portfolio metrics

pub mod pipeline;
pub mod report;
pub mod service;
