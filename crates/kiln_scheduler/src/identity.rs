//! Output identities of standalone modules.

use kiln_cache::CacheEntry;
use kiln_graph::Module;

/// Names the emitted file of a standalone module (image, font, markup).
///
/// The scheduler calls this on its own thread as soon as a module's output
/// is known, before any module embedding that URL is dispatched. The
/// returned path is relative to the output root with `/` separators.
pub trait IdentityAssigner {
    /// Returns the emitted path for `module`, whose transformed output is
    /// `output`.
    fn assign(&self, module: &Module, output: &CacheEntry) -> String;
}
