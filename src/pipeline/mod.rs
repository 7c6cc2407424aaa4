//! Pipeline stages for turning a submission into PDF bytes.
//!
//! Each submodule implements exactly one step so each can be tested on its
//! own and the rendering backend can be swapped without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! classify ──▶ normalize ──▶ pool ──▶ render
//! (folder)     (document)    (admit)  (chromium)
//! ```
//!
//! 1. [`classify`] resolves `reportType` / `folder` to a folder in 1..=15.
//!    It is pure and fails before any rendering work starts.
//! 2. [`normalize`] wraps fragments in a printable shell and cleans the title.
//! 3. [`pool`] bounds concurrent renders and the wait queue.
//! 4. [`render`] drives a disposable headless Chromium to `printToPDF`.

pub mod classify;
pub mod normalize;
pub mod pool;
pub mod render;
