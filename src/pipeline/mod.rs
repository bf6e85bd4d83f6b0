//! The editorial pipeline stages and their orchestration.
//!
//! Stage order for a scheduled run: research ([`search`]) feeds the
//! monitored-site scrape ([`scrape`]), both feed topic selection
//! ([`analyze`]), selected topics fan out to article drafting
//! ([`generate`]), and [`run`] sequences the whole thing and hands the
//! terminal result to rendering and delivery. [`manual`] is the
//! single-topic on-demand variant.

pub mod analyze;
pub mod generate;
pub mod manual;
pub mod run;
pub mod scrape;
pub mod search;

#[cfg(test)]
pub(crate) mod testing;
