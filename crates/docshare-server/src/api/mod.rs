// ABOUTME: API module containing the HTTP handlers mounted under /api/doc/share.
// ABOUTME: Split into share management, module tree, export task, and definition lookups.

pub mod definitions;
pub mod export;
pub mod modules;
pub mod shares;
