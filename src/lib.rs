// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # degari
//!
//! Conceptual combination of emotion/genre concepts and re-classification of
//! artworks against the resulting novel concepts.
//!
//! ## Architecture
//!
//! - **Properties** (`property`): typical/rigid property values and profiles
//! - **Profile files** (`profile_file`, `library`): the flat-file format and
//!   the typical/rigid concept library
//! - **Combination** (`combine`): bounded, preference-ordered inheritance
//!   gated by a reasoning oracle
//! - **Oracles** (`oracle`): embedded disjointness checks or an external
//!   reasoner process
//! - **Recommendation** (`recommend`): overlap scoring, ranking and TSV reports
//! - **Batches** (`batch`): work-lists of independent units with structured
//!   failure reports
//!
//! ## Library usage
//!
//! ```no_run
//! use degari::combine::{engine::CombinationEngine, prepare};
//! use degari::oracle::DisjointnessOracle;
//! use degari::property::{Profile, Property};
//!
//! let joy = Profile::new("joy", vec![Property::typical("happy", 0.9)], vec![]).unwrap();
//! let blues = Profile::new("blues", vec![Property::typical("sad", 0.8)], vec![]).unwrap();
//! let oracle = DisjointnessOracle::new().with_disjoint("happy", "sad");
//!
//! let request = prepare(&joy, &blues, 2).unwrap();
//! let result = CombinationEngine::new(&oracle).combine(&request).unwrap();
//! assert_eq!(result.inherited_names(), vec!["happy"]);
//! ```

pub mod batch;
pub mod combine;
pub mod config;
pub mod error;
pub mod library;
pub mod oracle;
pub mod profile_file;
pub mod property;
pub mod recommend;
