pub mod error;
pub mod db {
    pub mod memory;
    pub mod models;
    pub mod repository;
}
pub mod rendering {
    pub mod headings;
    pub mod link_token;
    pub mod links;
    pub mod markdown;
    pub mod section_diff;
}
pub mod propagation;
pub mod api {
    pub mod documents;
    pub mod errors;
}

#[cfg(feature = "ssr")]
pub mod app;
#[cfg(feature = "ssr")]
pub mod config;

pub use rendering::headings::{extract_headings, Heading};
pub use rendering::link_token::{build_link_token, parse_link_token, LinkReference, LinkToken};
pub use rendering::links::resolve_display_links;
pub use rendering::section_diff::{diff_section_numbers, SectionMapping};
pub use propagation::propagate_section_renumbering;
