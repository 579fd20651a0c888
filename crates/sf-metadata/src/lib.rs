//! sf-metadata: TV series metadata for registered media files.
//!
//! Files are matched to episodes by parsing their names and searching a
//! [`MetadataAgent`] (TMDB in production). Series, seasons and episodes are
//! kept in an in-memory [`MetadataStore`] and garbage collected when their
//! last file is removed.

pub mod agent;
pub mod levenshtein;
pub mod manager;
pub mod models;
pub mod parser;
pub mod store;
pub mod tmdb;

pub use agent::{MetadataAgent, NullAgent};
pub use manager::{GcReport, MatchedFile, MetadataManager};
pub use models::{Episode, EpisodeFile, Season, Series, SeriesTree};
pub use parser::{parse_series_name, ParsedSeriesInfo};
pub use store::MetadataStore;
pub use tmdb::TmdbAgent;
