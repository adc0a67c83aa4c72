//! Consent-banner detection and stable selector synthesis.
//!
//! Every function takes the page session explicitly; nothing here holds
//! browser state of its own.

pub mod cache;
pub mod collector;
pub mod config;
pub mod fingerprint;
pub mod lexicon;
pub mod locator;
pub mod ranker;
pub mod static_page;
pub mod synthesizer;

pub use cache::{SelectorCache, Validity};
pub use config::DetectionConfig;
pub use lexicon::Lexicon;
pub use locator::{BannerLocator, BannerOutcome, OutcomeSource};
pub use static_page::{StaticElement, StaticPage, StaticPageFactory};
pub use synthesizer::css_escape;
