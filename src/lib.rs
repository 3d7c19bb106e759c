//! `clusterscope` is the reactive view-computation engine behind an
//! interactive customer-segmentation dashboard: a declarative graph of
//! bindings recomputes exactly the derived views (a 2-D embedding, a
//! correlation heatmap, distribution charts) that depend on the controls a
//! user changed, and publishes them as structured chart descriptions.

pub mod bindings;
pub mod chart;
pub mod correlation;
pub mod dataset;
pub mod dispatch;
pub mod error;
pub mod projection;
pub mod service;
pub mod session;
pub mod streamer;
