//! Pipeline stages for TeX-to-bitmap rendering.
//!
//! Each submodule implements exactly one step. [`crate::render`] chains them
//! and owns the failure bookkeeping.
//!
//! ## Data Flow
//!
//! ```text
//! markup ──▶ document ──▶ workspace ──▶ compile ──▶ rasterise ──▶ decode
//!            (source)     (temp file)   (engine)    (dvips/convert) (PNG)
//! ```
//!
//! 1. [`document`]: assemble the complete LaTeX source from markup + formatting
//! 2. [`workspace`]: pick the temp dir, own the uniquely named artifacts
//! 3. [`compile`]: run the engine; scrape `! ...` lines from the log on failure
//! 4. [`rasterise`]: `dvips` (DVI engines only) and the raster converter
//! 5. [`decode`]: load the PNG into memory

pub mod compile;
pub mod decode;
pub mod document;
pub mod rasterise;
pub mod workspace;
