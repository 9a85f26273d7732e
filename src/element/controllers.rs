// ============================================================================
// spark-element - Reactive Controllers
// External observers attached to an element's lifecycle
// ============================================================================

/// An observer attached to a host element.
///
/// Controllers are told about the host's presence in the hosting structure
/// and bracket every update cycle: `host_update` fires before the update
/// decision, `host_updated` after the cycle settles (even when the render
/// was skipped or failed). A controller typically captures its host handle
/// at construction.
pub trait ReactiveController {
    fn host_connected(&self) {}

    fn host_disconnected(&self) {}

    /// Called before the update decision of each cycle.
    fn host_update(&self) {}

    /// Called after each cycle settles.
    fn host_updated(&self) {}
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;
    impl ReactiveController for Silent {}

    #[test]
    fn default_hooks_are_no_ops() {
        let controller = Silent;
        controller.host_connected();
        controller.host_update();
        controller.host_updated();
        controller.host_disconnected();
    }
}
