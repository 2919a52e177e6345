//! Integration layers for the two external systems the workflow drives:
//!
//! - [`git`]: git subprocess operations in the target checkout
//! - [`github_curl`]: thin curl-based HTTP transport for the GitHub API
//! - [`github`]: GitHub pull-request operations and remote URL parsing
//!
//! The git and github modules provide trait-based abstractions with real and
//! mock implementations to support both production use and testing.

pub mod git;
pub mod github;
pub mod github_curl;
