//! Pipeline stages for deck analysis.
//!
//! Each submodule implements exactly one step. Keeping stages separate makes
//! each independently testable and lets the collaborators (pdfium, the LLM
//! provider) be swapped for fakes without touching the parsers.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ llm ──▶ normalize ──▶ overview / detailed
//! (path)    (pdfium)   (text)   (fences)      (records)
//! ```
//!
//! 1. [`input`]:     validate a local deck or stage fetched bytes in a temp dir
//! 2. [`extract`]:   PDF to text; runs in `spawn_blocking`
//! 3. [`llm`]:       one completion per step, no retry
//! 4. [`normalize`]: isolate the payload from fences and prose
//! 5. [`overview`]:  four overview scalars, JSON first then labeled text
//! 6. [`detailed`]:  scored rows into category buckets, JSON first then table

pub mod detailed;
pub mod extract;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod overview;
