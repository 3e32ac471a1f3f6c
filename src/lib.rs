// ABOUTME: Public library API for mirroring a Notion page tree into git
// ABOUTME: Re-exports core modules for the CLI and integration tests

pub mod api;
pub mod assets;
pub mod block;
pub mod cancel;
pub mod cli;
pub mod commit;
pub mod config;
pub mod detect;
pub mod error;
pub mod fetch;
pub mod layout;
pub mod logging;
pub mod model;
pub mod ratelimit;
pub mod render;
pub mod sink;
pub mod state;
pub mod storage;
pub mod sync;
pub mod util;

pub use error::{Error, Result, SinkError};
pub use model::{Frontmatter, PageNode, PageTree};
