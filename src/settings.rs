use ctor::ctor;
use tracing::Level;

#[ctor]
fn set_debug_level() {
    // If KNNMESH_DEBUG is unset or set to false/empty, logging stays disabled.
    if std::env::var("KNNMESH_DEBUG").map_or(true, |v| v == "0" || v == "false" || v.is_empty()) {
        // Disabled.
    } else {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .init();
    }
}
